//! Theme preferences and colour conversions for the colour picker.
//!
//! Conversions work on integer RGB channels; HSL uses degrees for hue and
//! percent for saturation and lightness.

use serde::{Deserialize, Serialize};

/// Accent used when none is stored or a stored one cannot be parsed.
pub const DEFAULT_ACCENT: &str = "#0ea5e9";
/// RGB of [`DEFAULT_ACCENT`], returned for unparseable hex input.
pub const FALLBACK_RGB: (u8, u8, u8) = (14, 165, 233);
/// Capacity of the recent-colour list.
pub const MAX_RECENT_COLORS: usize = 8;
/// Opacity of the accent glow.
const GLOW_ALPHA: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Persisted look of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemePrefs {
    pub theme: Theme,
    pub accent_color: String,
    /// Most recent first, no duplicates.
    pub recent_colors: Vec<String>,
}

impl Default for ThemePrefs {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            accent_color: DEFAULT_ACCENT.to_string(),
            recent_colors: Vec::new(),
        }
    }
}

impl ThemePrefs {
    /// Move `hex` to the front of the recent list, dropping the oldest
    /// colours beyond [`MAX_RECENT_COLORS`].
    pub fn remember_color(&mut self, hex: &str) {
        self.recent_colors.retain(|c| c != hex);
        self.recent_colors.insert(0, hex.to_string());
        self.recent_colors.truncate(MAX_RECENT_COLORS);
    }

    /// Values of the accent CSS custom properties.
    pub fn accent_vars(&self) -> AccentVars {
        let (r, g, b) = hex_to_rgb(&self.accent_color);
        AccentVars {
            primary: self.accent_color.clone(),
            glow: hex_to_rgba(&self.accent_color, GLOW_ALPHA),
            primary_rgb: format!("{r}, {g}, {b}"),
        }
    }
}

/// `--accent-primary`, `--accent-glow` and `--accent-primary-rgb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccentVars {
    pub primary: String,
    pub glow: String,
    pub primary_rgb: String,
}

pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let s = s / 100.0;
    let l = l / 100.0;
    let a = s * l.min(1.0 - l);
    let channel = |n: f64| {
        let k = (n + h / 30.0).rem_euclid(12.0);
        let f = l - a * (k - 3.0).min(9.0 - k).min(1.0).max(-1.0);
        (255.0 * f).round().clamp(0.0, 255.0) as u8
    };
    (channel(0.0), channel(8.0), channel(4.0))
}

/// Rounded `(hue°, saturation%, lightness%)`.
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (u16, u8, u8) {
    let (r, g, b) = (f64::from(r) / 255.0, f64::from(g) / 255.0, f64::from(b) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if max == min {
        return (0, 0, (l * 100.0).round() as u8);
    }
    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let sector = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    let h = sector / 6.0;
    (
        (h * 360.0).round() as u16,
        (s * 100.0).round() as u8,
        (l * 100.0).round() as u8,
    )
}

pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Parse `#rgb` / `#rrggbb` (the `#` is optional).
pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    let value = u32::from_str_radix(&expanded, 16).ok()?;
    Some(((value >> 16) as u8, (value >> 8) as u8, value as u8))
}

/// Like [`parse_hex`] but falls back to [`FALLBACK_RGB`].
pub fn hex_to_rgb(hex: &str) -> (u8, u8, u8) {
    parse_hex(hex).unwrap_or(FALLBACK_RGB)
}

pub fn hex_to_rgba(hex: &str, alpha: f64) -> String {
    let (r, g, b) = hex_to_rgb(hex);
    format!("rgba({r},{g},{b},{alpha})")
}

/// Canonical lowercase `#rrggbb` form, if `hex` parses.
pub fn normalize_hex(hex: &str) -> Option<String> {
    parse_hex(hex.trim()).map(|(r, g, b)| rgb_to_hex(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsl_to_rgb_primaries() {
        assert_eq!(hsl_to_rgb(0.0, 100.0, 50.0), (255, 0, 0));
        assert_eq!(hsl_to_rgb(120.0, 100.0, 50.0), (0, 255, 0));
        assert_eq!(hsl_to_rgb(240.0, 100.0, 50.0), (0, 0, 255));
        assert_eq!(hsl_to_rgb(180.0, 100.0, 50.0), (0, 255, 255));
        assert_eq!(hsl_to_rgb(42.0, 0.0, 100.0), (255, 255, 255));
    }

    #[test]
    fn hsl_rgb_hex_rgb_round_trip() {
        for h in (0..360).step_by(15) {
            for s in [0.0, 35.0, 70.0, 100.0] {
                for l in [10.0, 50.0, 85.0] {
                    let rgb = hsl_to_rgb(f64::from(h), s, l);
                    let back = hex_to_rgb(&rgb_to_hex(rgb.0, rgb.1, rgb.2));
                    for (a, b) in [(rgb.0, back.0), (rgb.1, back.1), (rgb.2, back.2)] {
                        assert!(a.abs_diff(b) <= 1, "h={h} s={s} l={l}: {rgb:?} vs {back:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn rgb_to_hsl_known_values() {
        assert_eq!(rgb_to_hsl(255, 0, 0), (0, 100, 50));
        assert_eq!(rgb_to_hsl(0, 0, 255), (240, 100, 50));
        assert_eq!(rgb_to_hsl(128, 128, 128), (0, 0, 50));
        let (h, s, l) = rgb_to_hsl(255, 0, 0);
        assert_eq!(hsl_to_rgb(f64::from(h), f64::from(s), f64::from(l)), (255, 0, 0));
    }

    #[test]
    fn hex_parsing_and_fallback() {
        assert_eq!(hex_to_rgb("#0ea5e9"), (14, 165, 233));
        assert_eq!(hex_to_rgb("FF8000"), (255, 128, 0));
        assert_eq!(hex_to_rgb("#f80"), (255, 136, 0));
        assert_eq!(hex_to_rgb("not-a-colour"), FALLBACK_RGB);
        assert_eq!(hex_to_rgba("#fff", 0.4), "rgba(255,255,255,0.4)");
        assert_eq!(hex_to_rgba("#12", 0.5), "rgba(14,165,233,0.5)");
        assert_eq!(normalize_hex(" #ABCDEF "), Some("#abcdef".to_string()));
    }

    #[test]
    fn recent_colors_are_deduplicated_and_bounded() {
        let mut prefs = ThemePrefs::default();
        for i in 0..10u8 {
            prefs.remember_color(&rgb_to_hex(i, i, i));
        }
        prefs.remember_color("#050505");
        assert_eq!(prefs.recent_colors.len(), MAX_RECENT_COLORS);
        assert_eq!(prefs.recent_colors[0], "#050505");
        assert_eq!(prefs.recent_colors[1], "#090909");
        assert_eq!(prefs.recent_colors.iter().filter(|c| *c == "#050505").count(), 1);
    }

    #[test]
    fn prefs_use_camel_case_keys() {
        let json = serde_json::to_value(ThemePrefs::default()).unwrap();
        assert_eq!(json["theme"], "dark");
        assert_eq!(json["accentColor"], DEFAULT_ACCENT);
        assert!(json["recentColors"].as_array().unwrap().is_empty());
        let vars = ThemePrefs::default().accent_vars();
        assert_eq!(vars.primary_rgb, "14, 165, 233");
    }
}
