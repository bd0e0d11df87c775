//! Theme colors, optionally overridden from ~/.config/cinevault/theme.toml
//!
//! Every key is optional and takes a hex color:
//!
//! ```toml
//! accent = "#fab387"
//! danger = "#f38ba8"
//! ```

use ratatui::style::Color;
use serde::Deserialize;
use std::fs;

/// Theme colors for the UI
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub accent: Color,      // Active borders, highlights
    pub accent_bright: Color, // Favorites, section names
    pub danger: Color,      // Locked sections, errors
    pub success: Color,     // Unlocked sections
    pub warning: Color,     // Status line, countdown in warning window
    pub text: Color,
    pub text_dim: Color,
    pub bg_selected: Color,
    pub inactive: Color,    // Inactive borders
    pub header: Color,
}

impl Default for Theme {
    fn default() -> Self {
        // Catppuccin-inspired
        Self {
            accent: Color::Rgb(250, 179, 135),
            accent_bright: Color::Rgb(245, 194, 231),
            danger: Color::Rgb(243, 139, 168),
            success: Color::Rgb(166, 218, 149),
            warning: Color::Rgb(249, 226, 175),
            text: Color::Rgb(205, 214, 244),
            text_dim: Color::Rgb(147, 153, 178),
            bg_selected: Color::Rgb(69, 71, 90),
            inactive: Color::Rgb(88, 91, 112),
            header: Color::Rgb(137, 180, 250),
        }
    }
}

/// Raw theme file, hex strings keyed by role
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThemeFile {
    accent: Option<String>,
    accent_bright: Option<String>,
    danger: Option<String>,
    success: Option<String>,
    warning: Option<String>,
    text: Option<String>,
    text_dim: Option<String>,
    bg_selected: Option<String>,
    inactive: Option<String>,
    header: Option<String>,
}

impl Theme {
    /// Load the theme file if present, otherwise the defaults
    pub fn load() -> Self {
        let Some(path) = dirs::config_dir().map(|d| d.join("cinevault").join("theme.toml")) else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content),
            Err(_) => Self::default(),
        }
    }

    /// Apply overrides from a theme file; bad or missing colors keep the default
    fn from_toml(content: &str) -> Self {
        let file: ThemeFile = match toml::from_str(content) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Failed to parse theme: {}", e);
                return Self::default();
            }
        };

        let base = Self::default();
        let pick = |value: &Option<String>, fallback: Color| {
            value.as_deref().and_then(Self::parse_hex_color).unwrap_or(fallback)
        };

        Self {
            accent: pick(&file.accent, base.accent),
            accent_bright: pick(&file.accent_bright, base.accent_bright),
            danger: pick(&file.danger, base.danger),
            success: pick(&file.success, base.success),
            warning: pick(&file.warning, base.warning),
            text: pick(&file.text, base.text),
            text_dim: pick(&file.text_dim, base.text_dim),
            bg_selected: pick(&file.bg_selected, base.bg_selected),
            inactive: pick(&file.inactive, base.inactive),
            header: pick(&file.header, base.header),
        }
    }

    /// Parse a hex color string (#RRGGBB or #RGB)
    fn parse_hex_color(s: &str) -> Option<Color> {
        let s = s.trim().trim_start_matches('#');
        if !s.is_ascii() {
            return None;
        }

        if s.len() == 6 {
            let r = u8::from_str_radix(&s[0..2], 16).ok()?;
            let g = u8::from_str_radix(&s[2..4], 16).ok()?;
            let b = u8::from_str_radix(&s[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        } else if s.len() == 3 {
            let r = u8::from_str_radix(&s[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&s[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&s[2..3], 16).ok()? * 17;
            Some(Color::Rgb(r, g, b))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(Theme::parse_hex_color("#FFC107"), Some(Color::Rgb(255, 193, 7)));
        assert_eq!(Theme::parse_hex_color("fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(Theme::parse_hex_color("#12345"), None);
        assert_eq!(Theme::parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_partial_theme_keeps_defaults() {
        let theme = Theme::from_toml("accent = \"#000000\"\ndanger = \"nope\"\n");
        assert_eq!(theme.accent, Color::Rgb(0, 0, 0));
        assert_eq!(theme.danger, Theme::default().danger);
        assert_eq!(theme.text, Theme::default().text);
    }

    #[test]
    fn test_broken_theme_file_uses_defaults() {
        assert_eq!(Theme::from_toml("accent = ["), Theme::default());
    }
}
