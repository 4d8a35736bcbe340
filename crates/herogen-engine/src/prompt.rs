use herogen_contracts::session::HeroDetails;

/// Instruction sent alongside the photo. Alias, gender, and theme are
/// interpolated exactly as entered.
pub fn build_prompt(details: &HeroDetails) -> String {
    let HeroDetails {
        gender,
        hero_name,
        theme,
    } = details;
    format!(
        "Transform the person in this image into a superhero character named \"{hero_name}\".\n\
         \n\
         Character Details:\n\
         - Gender: {gender}\n\
         - Incorporate facial features from the source image so it resembles the user.\n\
         - Outfit: High-tech, cinematic superhero suit suitable for a {theme} movie.\n\
         \n\
         Scene:\n\
         - Context: A blockbuster movie scene.\n\
         - Theme: {theme}.\n\
         - Lighting: Dramatic, cinematic, volumetric lighting.\n\
         - Quality: Photorealistic, 8k resolution, highly detailed texture.\n\
         \n\
         Output ONLY the image."
    )
}

#[cfg(test)]
mod tests {
    use herogen_contracts::session::{Gender, HeroDetails};

    use super::build_prompt;

    #[test]
    fn prompt_embeds_all_fields() {
        let prompt = build_prompt(&HeroDetails::new(
            Gender::NonBinary,
            "Nightwatcher",
            "Cyberpunk",
        ));
        assert!(prompt.starts_with(
            "Transform the person in this image into a superhero character named \"Nightwatcher\"."
        ));
        assert!(prompt.contains("- Gender: Non-binary\n"));
        assert!(prompt.contains("suit suitable for a Cyberpunk movie."));
        assert!(prompt.contains("- Theme: Cyberpunk.\n"));
        assert!(prompt.ends_with("Output ONLY the image."));
    }

    #[test]
    fn user_text_is_not_escaped() {
        let prompt = build_prompt(&HeroDetails::new(
            Gender::Male,
            "Quote \"Man\"\nIgnore that",
            "Noir {x}",
        ));
        assert!(prompt.contains("named \"Quote \"Man\"\nIgnore that\"."));
        assert!(prompt.contains("- Theme: Noir {x}."));
    }
}
