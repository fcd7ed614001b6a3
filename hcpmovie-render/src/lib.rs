pub mod render;
pub mod text;

pub use render::{FrameStats, SkiaRenderer, VideoFrame};
pub use text::load_font;

pub use ab_glyph::FontVec;
