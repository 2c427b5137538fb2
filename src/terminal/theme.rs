//! Fixed colour theme of the terminal surface.

use super::emulator::Color;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub background: Rgb,
    pub foreground: Rgb,
    pub cursor: Rgb,
    pub cursor_accent: Rgb,
    pub selection: Rgb,
    pub selection_alpha: f32,
    /// black, red, green, yellow, blue, magenta, cyan, white, then the bright set.
    pub ansi: [Rgb; 16],
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Rgb(0x0a, 0x0a, 0x0f),
            foreground: Rgb(0xf8, 0xfa, 0xfc),
            cursor: Rgb(0x8b, 0x5c, 0xf6),
            cursor_accent: Rgb(0x0a, 0x0a, 0x0f),
            selection: Rgb(0x8b, 0x5c, 0xf6),
            selection_alpha: 0.3,
            ansi: [
                Rgb(0x0a, 0x0a, 0x0f),
                Rgb(0xef, 0x44, 0x44),
                Rgb(0x22, 0xc5, 0x5e),
                Rgb(0xea, 0xb3, 0x08),
                Rgb(0x3b, 0x82, 0xf6),
                Rgb(0x8b, 0x5c, 0xf6),
                Rgb(0x06, 0xb6, 0xd4),
                Rgb(0xf8, 0xfa, 0xfc),
                Rgb(0x64, 0x74, 0x8b),
                Rgb(0xf8, 0x71, 0x71),
                Rgb(0x4a, 0xde, 0x80),
                Rgb(0xfa, 0xcc, 0x15),
                Rgb(0x60, 0xa5, 0xfa),
                Rgb(0xa7, 0x8b, 0xfa),
                Rgb(0x22, 0xd3, 0xee),
                Rgb(0xff, 0xff, 0xff),
            ],
        }
    }
}

impl Theme {
    pub fn foreground_of(&self, color: Color) -> Rgb {
        self.resolve(color).unwrap_or(self.foreground)
    }

    pub fn background_of(&self, color: Color) -> Rgb {
        self.resolve(color).unwrap_or(self.background)
    }

    fn resolve(&self, color: Color) -> Option<Rgb> {
        match color {
            Color::Default => None,
            Color::Indexed(i) if i < 16 => Some(self.ansi[i as usize]),
            Color::Indexed(i) => Some(xterm_256(i)),
            Color::Rgb(r, g, b) => Some(Rgb(r, g, b)),
        }
    }
}

/// Colours 16..=255 of the xterm palette: a 6x6x6 cube then a grey ramp.
fn xterm_256(index: u8) -> Rgb {
    if index >= 232 {
        let level = 8 + (index - 232) * 10;
        return Rgb(level, level, level);
    }
    let i = index - 16;
    let step = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
    Rgb(step(i / 36), step((i / 6) % 6), step(i % 6))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_palette() {
        let theme = Theme::default();
        assert_eq!(theme.foreground_of(Color::Default).hex(), "#f8fafc");
        assert_eq!(theme.background_of(Color::Default).hex(), "#0a0a0f");
        assert_eq!(theme.foreground_of(Color::Indexed(2)).hex(), "#22c55e");
        assert_eq!(theme.foreground_of(Color::Indexed(9)).hex(), "#f87171");
        assert_eq!(theme.foreground_of(Color::Rgb(1, 2, 3)), Rgb(1, 2, 3));
    }

    #[test]
    fn test_xterm_cube_and_greys() {
        assert_eq!(xterm_256(16), Rgb(0, 0, 0));
        assert_eq!(xterm_256(196), Rgb(255, 0, 0));
        assert_eq!(xterm_256(231), Rgb(255, 255, 255));
        assert_eq!(xterm_256(232), Rgb(8, 8, 8));
        assert_eq!(xterm_256(255), Rgb(238, 238, 238));
    }
}
