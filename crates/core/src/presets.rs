//! Preset style prompts offered as quick-select buttons.

/// Fixed list of preset styles. Each entry is both the button label and the
/// prompt text that selecting it writes into the prompt field.
pub const STYLE_PRESETS: &[&str] = &[
    "Watercolor",
    "Anime style",
    "Oil painting",
    "Pencil sketch",
    "Pixel art",
    "Pop art",
    "Cyberpunk",
    "Van Gogh style",
];

/// Looks up a preset by name, ignoring case and surrounding whitespace.
pub fn find_preset(name: &str) -> Option<&'static str> {
    let name = name.trim();
    STYLE_PRESETS
        .iter()
        .copied()
        .find(|preset| preset.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_presets_case_insensitively() {
        assert_eq!(find_preset("watercolor"), Some("Watercolor"));
        assert_eq!(find_preset("  ANIME STYLE "), Some("Anime style"));
        assert_eq!(find_preset("Baroque"), None);
    }

    #[test]
    fn presets_are_unique_and_non_empty() {
        for (i, preset) in STYLE_PRESETS.iter().enumerate() {
            assert!(!preset.trim().is_empty());
            assert!(!STYLE_PRESETS[i + 1..].contains(preset));
        }
    }
}
