use hcpmovie_core::{MovieStim, Position};

/// Movie display geometry after shrinking; everything else on screen is
/// centred on `shifted_pos` so it stays aligned with the movie
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub original_size: (f32, f32),
    pub shrink_factor: f32,
    pub display_size: (f32, f32),
    pub shifted_pos: Position,
}

impl DisplayGeometry {
    pub fn new(movie_size_pix: [f64; 2], shrink_factor: f64) -> Self {
        let [w, h] = movie_size_pix;
        let display_size = ((w * shrink_factor) as f32, (h * shrink_factor) as f32);
        // bottom edge stays in place, the top moves down
        let shifted_pos = Position::new(0.0, (-h * (1.0 - shrink_factor) / 2.0) as f32);
        Self {
            original_size: (w as f32, h as f32),
            shrink_factor: shrink_factor as f32,
            display_size,
            shifted_pos,
        }
    }

    /// A size from settings scaled by the shrink factor
    pub fn scaled(&self, value: f64) -> f32 {
        (value * self.shrink_factor as f64) as f32
    }

    pub fn movie(&self) -> MovieStim {
        MovieStim {
            size: self.display_size,
            pos: self.shifted_pos,
        }
    }
}
