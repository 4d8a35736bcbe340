use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_THEME: &str = "Sci-Fi Action";

pub const THEME_PRESETS: &[&str] = &[
    "Sci-Fi Action",
    "Dark Noir",
    "Cyberpunk",
    "Cosmic Space",
    "Post-Apocalyptic",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
    #[serde(rename = "Non-binary")]
    NonBinary,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::NonBinary];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::NonBinary => "Non-binary",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "nonbinary" | "nb" => Ok(Gender::NonBinary),
            _ => Err(format!(
                "unknown gender '{}' (expected Male, Female, or Non-binary)",
                raw.trim()
            )),
        }
    }
}

/// Form inputs collected on the details screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroDetails {
    pub gender: Gender,
    pub hero_name: String,
    pub theme: String,
}

impl Default for HeroDetails {
    fn default() -> Self {
        Self {
            gender: Gender::default(),
            hero_name: String::new(),
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl HeroDetails {
    pub fn new(gender: Gender, hero_name: impl Into<String>, theme: impl Into<String>) -> Self {
        Self {
            gender,
            hero_name: hero_name.into(),
            theme: theme.into(),
        }
    }

    /// The alias is stored as typed; only its trimmed form must be non-empty.
    pub fn has_alias(&self) -> bool {
        !self.hero_name.trim().is_empty()
    }
}

/// Resolves a theme argument: a 1-based preset number or free text.
pub fn resolve_theme(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(index) = trimmed.parse::<usize>() {
        if let Some(preset) = index.checked_sub(1).and_then(|idx| THEME_PRESETS.get(idx)) {
            return Some((*preset).to_string());
        }
    }
    THEME_PRESETS
        .iter()
        .find(|preset| preset.eq_ignore_ascii_case(trimmed))
        .map(|preset| (*preset).to_string())
        .or_else(|| Some(trimmed.to_string()))
}
