//! Terminal styling for user-facing output.

use nu_ansi_term::Color::Green;
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

/// Color output mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Colors when stdout is a terminal (default)
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Should colors be used?
    /// `NO_COLOR` always disables them.
    pub fn use_colors(self) -> bool {
        if std::env::var_os("NO_COLOR").is_some() {
            return false;
        }

        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }
}

/// Render content as an addition: each line prefixed with `+`, green when
/// colors are enabled.
pub fn addition(content: &str, colors: bool) -> String {
    let mut rendered = String::with_capacity(content.len() + content.len() / 8);
    for line in content.lines() {
        let line = format!("+{}", line);
        if colors {
            rendered.push_str(&Green.paint(line).to_string());
        } else {
            rendered.push_str(&line);
        }
        rendered.push('\n');
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addition_prefixes_every_line() {
        let rendered = addition("fn main() {}\nmore", false);
        assert_eq!(rendered, "+fn main() {}\n+more\n");
    }

    #[test]
    fn test_addition_with_colors_wraps_in_escape_codes() {
        let rendered = addition("hello", true);
        assert!(rendered.contains("+hello"));
        assert!(rendered.contains("\u{1b}["));
    }

    #[test]
    fn test_never_disables_colors() {
        assert!(!ColorMode::Never.use_colors());
    }

    #[test]
    fn test_color_mode_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            color: ColorMode,
        }
        let parsed: Wrapper = toml::from_str("color = \"always\"").unwrap();
        assert_eq!(parsed.color, ColorMode::Always);
    }
}
