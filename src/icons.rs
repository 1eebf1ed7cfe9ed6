use clap::ValueEnum;

use crate::constants::constants;

/// Host color scheme, as far as iconography is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HostTheme {
  Light,
  Dark,
  HighContrastWhite,
  HighContrastBlack,
}

impl HostTheme {
  pub fn is_light(self) -> bool {
    matches!(self, HostTheme::Light | HostTheme::HighContrastWhite)
  }
}

/// Default icons for one theme. Built fresh whenever the theme changes and handed to the
/// resolver by value; nothing global is rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSet {
  /// Shown for informational results and for entries without a cached favicon.
  pub default_icon: String,
}

impl IconSet {
  pub fn for_theme(theme: HostTheme) -> Self {
    let c = constants();
    let default_icon = if theme.is_light() { c.light_icon.clone() } else { c.dark_icon.clone() };
    Self { default_icon }
  }
}
