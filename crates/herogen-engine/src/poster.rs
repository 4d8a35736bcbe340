use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use herogen_contracts::image::EncodedImage;

/// Stem used when nothing printable is left of the alias.
const FALLBACK_STEM: &str = "hero";

/// `Captain  Rust` -> `Captain_Rust_poster.png`
///
/// Whitespace runs and characters that are not portable in file names become
/// `_`, and leading dots are dropped, so the result is always a single path
/// component.
pub fn poster_file_name(hero_name: &str, image: &EncodedImage) -> String {
    let mut stem = String::with_capacity(hero_name.len());
    let mut in_space = false;
    for ch in hero_name.chars() {
        if ch.is_whitespace() {
            if !in_space {
                stem.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        stem.push(if is_portable(ch) { ch } else { '_' });
    }
    let stem = match stem.trim_start_matches('.') {
        "" => FALLBACK_STEM,
        trimmed => trimmed,
    };
    format!("{stem}_poster.{}", image.extension())
}

fn is_portable(ch: char) -> bool {
    !ch.is_control() && !matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

pub fn write_poster(dir: &Path, hero_name: &str, image: &EncodedImage) -> Result<PathBuf> {
    let path = dir.join(poster_file_name(hero_name, image));
    if path.parent() != Some(dir) {
        bail!("poster name for {hero_name:?} escapes {}", dir.display());
    }
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let bytes = image.decode().context("generated image is not valid base64")?;
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> EncodedImage {
        EncodedImage::from_bytes("image/png", b"poster-bytes").unwrap()
    }

    #[test]
    fn whitespace_runs_collapse_to_underscores() {
        assert_eq!(poster_file_name("Captain  Rust", &png()), "Captain_Rust_poster.png");
        assert_eq!(poster_file_name("Nightwatcher", &png()), "Nightwatcher_poster.png");
        assert_eq!(poster_file_name(" The Hero ", &png()), "_The_Hero__poster.png");
    }

    #[test]
    fn path_like_aliases_stay_inside_output_dir() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let out = temp.path().join("out");
        let absolute = temp.path().join("escaped").to_string_lossy().into_owned();

        for (alias, expected) in [
            ("AC/DC", "AC_DC_poster.png"),
            ("../up", "_up_poster.png"),
            ("/abs/x", "_abs_x_poster.png"),
            ("C:\\hero?", "C__hero__poster.png"),
            ("...", "hero_poster.png"),
            (absolute.as_str(), ""),
        ] {
            let path = write_poster(&out, alias, &png())?;
            assert_eq!(path.parent(), Some(out.as_path()), "alias {alias:?}");
            if !expected.is_empty() {
                assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(expected));
            }
        }
        assert!(!temp.path().join("escaped_poster.png").exists());
        assert!(!temp.path().join("up_poster.png").exists());
        Ok(())
    }

    #[test]
    fn extension_follows_mime_type() -> anyhow::Result<()> {
        let jpeg = EncodedImage::from_bytes("image/jpeg", b"x")?;
        assert_eq!(poster_file_name("Volt", &jpeg), "Volt_poster.jpg");
        Ok(())
    }

    #[test]
    fn write_poster_decodes_payload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = write_poster(&temp.path().join("posters"), "Nightwatcher", &png())?;
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("Nightwatcher_poster.png"));
        assert_eq!(fs::read(path)?, b"poster-bytes".to_vec());
        Ok(())
    }
}
