use ratatui::style::Color;

use crate::icons::HostTheme;

/// Terminal color palette. `host` picks the matching default icon set.
pub struct Theme {
  pub name: &'static str,
  pub host: HostTheme,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 4] = [
  Theme {
    name: "Mocha",
    host: HostTheme::Dark,
    bg: Color::Rgb(30, 30, 46),
    fg: Color::Rgb(205, 214, 244),
    accent: Color::Rgb(137, 180, 250),
    muted: Color::Rgb(127, 132, 156),
    border: Color::Rgb(69, 71, 90),
    highlight_fg: Color::Rgb(30, 30, 46),
    highlight_bg: Color::Rgb(137, 180, 250),
    stripe_bg: Color::Rgb(36, 36, 54),
    status: Color::Rgb(166, 227, 161),
    error: Color::Rgb(243, 139, 168),
    key_fg: Color::Rgb(30, 30, 46),
    key_bg: Color::Rgb(127, 132, 156),
  },
  Theme {
    name: "Latte",
    host: HostTheme::Light,
    bg: Color::Rgb(239, 241, 245),
    fg: Color::Rgb(76, 79, 105),
    accent: Color::Rgb(30, 102, 245),
    muted: Color::Rgb(140, 143, 161),
    border: Color::Rgb(188, 192, 204),
    highlight_fg: Color::Rgb(239, 241, 245),
    highlight_bg: Color::Rgb(30, 102, 245),
    stripe_bg: Color::Rgb(230, 233, 239),
    status: Color::Rgb(64, 160, 43),
    error: Color::Rgb(210, 15, 57),
    key_fg: Color::Rgb(239, 241, 245),
    key_bg: Color::Rgb(140, 143, 161),
  },
  Theme {
    name: "Contrast",
    host: HostTheme::HighContrastBlack,
    bg: Color::Black,
    fg: Color::White,
    accent: Color::Yellow,
    muted: Color::Gray,
    border: Color::White,
    highlight_fg: Color::Black,
    highlight_bg: Color::Yellow,
    stripe_bg: Color::Black,
    status: Color::LightGreen,
    error: Color::LightRed,
    key_fg: Color::Black,
    key_bg: Color::White,
  },
  Theme {
    name: "Paper",
    host: HostTheme::HighContrastWhite,
    bg: Color::White,
    fg: Color::Black,
    accent: Color::Blue,
    muted: Color::DarkGray,
    border: Color::Black,
    highlight_fg: Color::White,
    highlight_bg: Color::Blue,
    stripe_bg: Color::White,
    status: Color::Green,
    error: Color::Red,
    key_fg: Color::White,
    key_bg: Color::Black,
  },
];

/// Index of the theme called `name` (case-insensitive), if any.
pub fn position(name: &str) -> Option<usize> {
  THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(name))
}

/// First palette whose icon set matches `host`, falling back to the default palette.
pub fn for_host(host: HostTheme) -> usize {
  THEMES.iter().position(|t| t.host == host).unwrap_or(0)
}
