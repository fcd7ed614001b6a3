use crate::text::render_text_pixmap;
use ab_glyph::FontVec;
use anyhow::{Context, Result};
use hcpmovie_core::{Drawable, FixationLines, MovieStim, Rgba, TextStim};
use hcpmovie_timing::Timer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use string_cache::DefaultAtom as Atom;
use tiny_skia::{
    Color, FilterQuality, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

/// A decoded movie frame, tightly packed opaque RGBA
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
}

#[derive(Hash, Eq, PartialEq, Clone)]
struct TextKey {
    atom: Atom,
    height_bits: u32,
    wrap_bits: u32,
    color: [u8; 4],
}

impl TextKey {
    fn new(text: &TextStim) -> Self {
        Self {
            atom: Atom::from(text.content.as_str()),
            height_bits: text.height.to_bits(),
            wrap_bits: text.wrap_width.to_bits(),
            color: text.color.0,
        }
    }
}

/// Software renderer for the session's stimuli
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),
    background: Color,

    canvas: Pixmap,
    font: Option<FontVec>,
    text_cache: HashMap<TextKey, Arc<Pixmap>>,
    movie_frame: Option<Pixmap>,
}

fn to_color(c: Rgba) -> Color {
    Color::from_rgba8(c.r(), c.g(), c.b(), c.a())
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, background: Rgba, font: Option<FontVec>) -> Result<Self> {
        let mut canvas = Pixmap::new(width, height)
            .with_context(|| format!("Invalid canvas size {}x{}", width, height))?;
        let background = to_color(background);
        canvas.fill(background);

        if font.is_none() {
            log::warn!("No font loaded, text stimuli will not be drawn");
        }

        Ok(Self {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            background,
            canvas,
            font,
            text_cache: HashMap::with_capacity(8),
            movie_frame: None,
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = Pixmap::new(new_width, new_height)
            .with_context(|| format!("Invalid canvas size {}x{}", new_width, new_height))?;
        self.canvas.fill(self.background);
        self.width = new_width;
        self.height = new_height;
        self.center = (new_width as f32 / 2.0, new_height as f32 / 2.0);
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Replaces the movie frame drawn by `Drawable::Movie`
    pub fn set_movie_frame(&mut self, frame: VideoFrame) -> Result<()> {
        let VideoFrame {
            width,
            height,
            mut data,
        } = frame;
        let size = IntSize::from_wh(width, height)
            .with_context(|| format!("Invalid movie frame size {}x{}", width, height))?;
        // Opaque pixels are already premultiplied.
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        let pixmap = Pixmap::from_vec(data, size)
            .context("Movie frame data does not match its dimensions")?;
        self.movie_frame = Some(pixmap);
        Ok(())
    }

    pub fn clear_movie_frame(&mut self) {
        self.movie_frame = None;
    }

    /// Clears the canvas and draws `scene` in order
    pub fn draw_scene(&mut self, scene: &[Drawable<'_>]) {
        self.canvas.fill(self.background);
        self.draw_items(scene);
    }

    fn draw_items(&mut self, scene: &[Drawable<'_>]) {
        for item in scene {
            match item {
                Drawable::Fixation(fix) => self.draw_fixation(fix),
                Drawable::Text(text) => self.draw_text(text),
                Drawable::Movie(movie) => self.draw_movie(movie),
            }
        }
    }

    /// Draws `scene` and copies the canvas into `frame_buffer` (RGBA8)
    pub fn render_frame<T: Timer>(
        &mut self,
        scene: &[Drawable<'_>],
        frame_buffer: &mut [u8],
        timer: &T,
    ) -> Result<FrameStats> {
        let t = timer.now();
        self.canvas.fill(self.background);
        let clear = timer.elapsed(t);

        let t = timer.now();
        self.draw_items(scene);
        let draw = timer.elapsed(t);

        let t = timer.now();
        let data = self.canvas.data();
        anyhow::ensure!(
            frame_buffer.len() == data.len(),
            "Frame buffer holds {} bytes, canvas {}",
            frame_buffer.len(),
            data.len()
        );
        frame_buffer.copy_from_slice(data);
        let copy = timer.elapsed(t);

        Ok(FrameStats {
            clear,
            draw,
            copy,
            total: clear + draw + copy,
        })
    }

    fn draw_fixation(&mut self, fix: &FixationLines) {
        let (cx, cy) = fix.pos.to_canvas(self.center);
        let half = fix.size / 2.0;

        let mut paint = Paint::default();
        paint.set_color(to_color(fix.color));
        paint.anti_alias = true;

        let stroke = Stroke {
            width: fix.line_width.max(1.0),
            ..Default::default()
        };

        let mut pb = PathBuilder::new();
        pb.move_to(cx - half, cy);
        pb.line_to(cx + half, cy);
        pb.move_to(cx, cy - half);
        pb.line_to(cx, cy + half);
        if fix.aperture {
            pb.push_circle(cx, cy, half);
        }

        if let Some(path) = pb.finish() {
            self.canvas
                .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    fn draw_text(&mut self, text: &TextStim) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let key = TextKey::new(text);
        let pixmap = match self.text_cache.get(&key) {
            Some(p) => Arc::clone(p),
            None => {
                let Some(p) =
                    render_text_pixmap(font, &text.content, text.height, text.wrap_width, text.color)
                else {
                    return;
                };
                let p = Arc::new(p);
                self.text_cache.insert(key, Arc::clone(&p));
                p
            }
        };

        let (cx, cy) = text.pos.to_canvas(self.center);
        let x = (cx - pixmap.width() as f32 / 2.0).round() as i32;
        let y = (cy - pixmap.height() as f32 / 2.0).round() as i32;
        let pixmap: &Pixmap = &pixmap;
        self.canvas.draw_pixmap(
            x,
            y,
            pixmap.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    fn draw_movie(&mut self, movie: &MovieStim) {
        let Some(frame) = self.movie_frame.as_ref() else {
            return;
        };
        let (w, h) = movie.size;
        let (cx, cy) = movie.pos.to_canvas(self.center);
        let sx = w / frame.width() as f32;
        let sy = h / frame.height() as f32;
        let transform = Transform::from_row(sx, 0.0, 0.0, sy, cx - w / 2.0, cy - h / 2.0);

        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..Default::default()
        };
        self.canvas
            .draw_pixmap(0, 0, frame.as_ref(), &paint, transform, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcpmovie_core::Position;
    use hcpmovie_timing::ManualTimer;

    fn pixel(r: &SkiaRenderer, x: u32, y: u32) -> [u8; 4] {
        let p = r.canvas().pixel(x, y).unwrap();
        [p.red(), p.green(), p.blue(), p.alpha()]
    }

    #[test]
    fn fixation_is_drawn_at_its_position() {
        let mut r = SkiaRenderer::new(200, 100, Rgba::BLACK, None).unwrap();
        let fix = FixationLines::new(40.0, Rgba([255, 0, 0, 255]), 4.0, Position::new(0.0, -20.0));

        r.draw_scene(&[Drawable::Fixation(&fix)]);

        // centre (100, 50) shifted 20 px down
        assert_eq!(pixel(&r, 100, 70), [255, 0, 0, 255]);
        assert_eq!(pixel(&r, 110, 70), [255, 0, 0, 255]);
        assert_eq!(pixel(&r, 100, 40), [0, 0, 0, 255]);
        assert_eq!(pixel(&r, 10, 10), [0, 0, 0, 255]);
    }

    #[test]
    fn movie_frame_is_scaled_into_place() {
        let mut r = SkiaRenderer::new(200, 100, Rgba::BLACK, None).unwrap();
        r.set_movie_frame(VideoFrame {
            width: 2,
            height: 2,
            data: [0u8, 0, 255, 255].repeat(4),
        })
        .unwrap();
        let movie = MovieStim {
            size: (100.0, 50.0),
            pos: Position::CENTER,
        };

        r.draw_scene(&[Drawable::Movie(&movie)]);

        assert_eq!(pixel(&r, 100, 50), [0, 0, 255, 255]);
        assert_eq!(pixel(&r, 60, 30), [0, 0, 255, 255]);
        assert_eq!(pixel(&r, 20, 50), [0, 0, 0, 255]);
    }

    #[test]
    fn movie_without_frame_draws_nothing() {
        let mut r = SkiaRenderer::new(20, 20, Rgba::GRAY, None).unwrap();
        let movie = MovieStim {
            size: (20.0, 20.0),
            pos: Position::CENTER,
        };
        r.draw_scene(&[Drawable::Movie(&movie)]);
        assert_eq!(pixel(&r, 10, 10), [128, 128, 128, 255]);
    }

    #[test]
    fn malformed_movie_frame_is_rejected() {
        let mut r = SkiaRenderer::new(20, 20, Rgba::BLACK, None).unwrap();
        let frame = VideoFrame {
            width: 4,
            height: 4,
            data: vec![0; 10],
        };
        assert!(r.set_movie_frame(frame).is_err());
    }

    #[test]
    fn text_without_font_is_skipped() {
        let mut r = SkiaRenderer::new(50, 50, Rgba::BLACK, None).unwrap();
        let text = TextStim {
            content: "ready to start".into(),
            height: 20.0,
            wrap_width: 40.0,
            pos: Position::CENTER,
            color: Rgba::WHITE,
        };
        r.draw_scene(&[Drawable::Text(&text)]);
        assert_eq!(pixel(&r, 25, 25), [0, 0, 0, 255]);
    }

    #[test]
    fn render_frame_copies_into_buffer() {
        let mut r = SkiaRenderer::new(4, 4, Rgba::WHITE, None).unwrap();
        let timer = ManualTimer::new();

        let mut buffer = vec![0u8; 4 * 4 * 4];
        r.render_frame(&[], &mut buffer, &timer).unwrap();
        assert!(buffer.iter().all(|b| *b == 255));

        let mut short = vec![0u8; 8];
        assert!(r.render_frame(&[], &mut short, &timer).is_err());
    }

    #[test]
    fn resize_recreates_canvas() {
        let mut r = SkiaRenderer::new(4, 4, Rgba::BLACK, None).unwrap();
        r.resize(8, 2).unwrap();
        assert_eq!(r.size(), (8, 2));
        assert_eq!(r.canvas().width(), 8);
        assert!(r.resize(0, 2).is_err());
    }
}
