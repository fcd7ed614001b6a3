//! Stimulus descriptions shared by the session and the renderer.
//!
//! Positions and sizes are in pixel units: the origin is the centre
//! of the screen and y grows upwards.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const CENTER: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Converts to canvas coordinates (origin top-left, y down)
    pub fn to_canvas(self, center: (f32, f32)) -> (f32, f32) {
        (center.0 + self.x, center.1 - self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);
    /// Mid gray, signed rgb `[0, 0, 0]`
    pub const GRAY: Rgba = Rgba([128, 128, 128, 255]);

    /// Converts a signed rgb triple (each channel in `[-1, 1]`)
    pub fn from_signed_rgb(rgb: [f64; 3]) -> Option<Self> {
        let mut out = [0u8, 0, 0, 255];
        for (dst, v) in out.iter_mut().zip(rgb) {
            if !(-1.0..=1.0).contains(&v) {
                return None;
            }
            *dst = ((v + 1.0) / 2.0 * 255.0).round() as u8;
        }
        Some(Rgba(out))
    }

    /// Parses `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        let alpha = if digits.len() == 8 { channel(6)? } else { 255 };
        Some(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
    }

    pub fn r(&self) -> u8 {
        self.0[0]
    }
    pub fn g(&self) -> u8 {
        self.0[1]
    }
    pub fn b(&self) -> u8 {
        self.0[2]
    }
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

/// Fixation cross: two perpendicular segments of length `size` centred on
/// `pos`, optionally surrounded by a circular aperture outline of the same
/// diameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixationLines {
    pub size: f32,
    pub color: Rgba,
    pub line_width: f32,
    pub pos: Position,
    pub aperture: bool,
}

impl FixationLines {
    pub fn new(size: f32, color: Rgba, line_width: f32, pos: Position) -> Self {
        Self {
            size,
            color,
            line_width,
            pos,
            aperture: false,
        }
    }

    pub fn with_aperture(mut self, aperture: bool) -> Self {
        self.aperture = aperture;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStim {
    pub content: String,
    pub height: f32,
    pub wrap_width: f32,
    pub pos: Position,
    pub color: Rgba,
}

impl TextStim {
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// On-screen geometry of the movie
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovieStim {
    pub size: (f32, f32),
    pub pos: Position,
}

/// One item to draw in the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drawable<'a> {
    Fixation(&'a FixationLines),
    Text(&'a TextStim),
    Movie(&'a MovieStim),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_rgb_maps_to_bytes() {
        assert_eq!(Rgba::from_signed_rgb([1.0, 1.0, 1.0]), Some(Rgba::WHITE));
        assert_eq!(Rgba::from_signed_rgb([-1.0, -1.0, -1.0]), Some(Rgba::BLACK));
        assert_eq!(Rgba::from_signed_rgb([0.0, 0.0, 0.0]), Some(Rgba::GRAY));
        assert!(Rgba::from_signed_rgb([2.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(Rgba::from_hex("#ff0000"), Some(Rgba([255, 0, 0, 255])));
        assert_eq!(Rgba::from_hex("00ff0080"), Some(Rgba([0, 255, 0, 128])));
        assert!(Rgba::from_hex("#fff").is_none());
        assert!(Rgba::from_hex("#gg0000").is_none());
    }

    #[test]
    fn canvas_coordinates_flip_y() {
        let p = Position::new(10.0, -20.0);
        assert_eq!(p.to_canvas((100.0, 50.0)), (110.0, 70.0));
    }
}
