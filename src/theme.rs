//! Theme and layout-mode flags, with the persisted allow-list.
//!
//! Theme names are persisted strings validated against a fixed allow-list
//! on restore; anything unrecognized silently falls back to the default.

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

/// Every theme name the snapshot may carry. The empty string is the
/// default theme.
pub const VALID_THEMES: &[&str] = &[
    "theme-teal",
    "theme-terracotta",
    "theme-forest",
    "theme-slate",
    "theme-rosewood",
    "theme-pistachio",
    "theme-purple",
    "theme-aurora",
    "theme-aurora-ocean",
    "theme-aurora-cyber",
    "theme-aurora-sunset",
    "",
];

/// Terminal width below which the two-panel scientific layout does not
/// fit. A snapshot saved in scientific mode is restored to standard mode
/// under this threshold: the panel would come back invisible with no
/// control to reopen it.
pub const SCI_MIN_WIDTH: u16 = 100;

/// Which left-panel surface is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    #[serde(rename = "standard")]
    Standard,
    #[serde(rename = "scientific")]
    Scientific,
}

/// The visual flags persisted with the session.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeState {
    pub theme: String,
    pub dark_mode: bool,
    pub mode: Mode,
}

impl Default for ThemeState {
    fn default() -> Self {
        Self {
            theme: String::new(),
            dark_mode: false,
            mode: Mode::Standard,
        }
    }
}

impl ThemeState {
    pub fn is_valid_theme(name: &str) -> bool {
        VALID_THEMES.contains(&name)
    }

    /// Apply a theme name if it passes the allow-list; returns whether it
    /// was applied. The aurora family only exists in dark mode.
    pub fn set_theme(&mut self, name: &str) -> bool {
        if !Self::is_valid_theme(name) {
            return false;
        }
        self.theme = name.to_string();
        if name.starts_with("theme-aurora") {
            self.dark_mode = true;
        }
        true
    }

    /// Cycle to the next theme in the allow-list.
    pub fn next_theme(&mut self) {
        let pos = VALID_THEMES
            .iter()
            .position(|t| *t == self.theme)
            .unwrap_or(VALID_THEMES.len() - 1);
        let next = VALID_THEMES[(pos + 1) % VALID_THEMES.len()].to_string();
        self.set_theme(&next);
    }

    pub fn toggle_dark_mode(&mut self) {
        // Leaving dark mode also leaves the dark-only aurora themes.
        if self.dark_mode && self.theme.starts_with("theme-aurora") {
            self.theme = String::new();
        }
        self.dark_mode = !self.dark_mode;
    }

    /// Accent color for borders and highlights.
    pub fn accent(&self) -> Color {
        match self.theme.as_str() {
            "theme-teal" => Color::Cyan,
            "theme-terracotta" => Color::LightRed,
            "theme-forest" => Color::Green,
            "theme-slate" => Color::DarkGray,
            "theme-rosewood" => Color::Red,
            "theme-pistachio" => Color::LightGreen,
            "theme-purple" => Color::Magenta,
            "theme-aurora" => Color::LightMagenta,
            "theme-aurora-ocean" => Color::LightBlue,
            "theme-aurora-cyber" => Color::LightCyan,
            "theme-aurora-sunset" => Color::LightYellow,
            _ => Color::Blue,
        }
    }

    pub fn fg(&self) -> Color {
        if self.dark_mode {
            Color::White
        } else {
            Color::Black
        }
    }

    pub fn bg(&self) -> Color {
        if self.dark_mode {
            Color::Black
        } else {
            Color::White
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_validation() {
        assert!(ThemeState::is_valid_theme("theme-teal"));
        assert!(ThemeState::is_valid_theme(""));
        assert!(!ThemeState::is_valid_theme("theme-neon"));
    }

    #[test]
    fn test_set_theme_rejects_unknown_names() {
        let mut state = ThemeState::default();
        assert!(!state.set_theme("theme-neon"));
        assert_eq!(state.theme, "");

        assert!(state.set_theme("theme-forest"));
        assert_eq!(state.theme, "theme-forest");
    }

    #[test]
    fn test_aurora_forces_dark_mode() {
        let mut state = ThemeState::default();
        state.set_theme("theme-aurora-ocean");
        assert!(state.dark_mode);

        // Toggling back to light drops the dark-only theme.
        state.toggle_dark_mode();
        assert!(!state.dark_mode);
        assert_eq!(state.theme, "");
    }

    #[test]
    fn test_next_theme_cycles_through_allow_list() {
        let mut state = ThemeState::default();
        for _ in 0..VALID_THEMES.len() {
            state.next_theme();
            assert!(ThemeState::is_valid_theme(&state.theme));
        }
        // A full cycle lands back on the default.
        assert_eq!(state.theme, "");
    }

    #[test]
    fn test_mode_serde_tags() {
        assert_eq!(
            serde_json::to_string(&Mode::Scientific).unwrap(),
            "\"scientific\""
        );
        let mode: Mode = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(mode, Mode::Standard);
    }
}
