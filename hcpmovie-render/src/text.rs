use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result};
use hcpmovie_core::Rgba;
use std::path::Path;
use tiny_skia::{Pixmap, PremultipliedColorU8};

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read font file: {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("Invalid font file: {}", path.display()))
}

/// Greedy word wrap; a line only exceeds `max_width` when a single word does.
/// A non-positive `max_width` disables wrapping.
pub fn wrap_words(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if current.is_empty() || max_width <= 0.0 || measure(&candidate) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        lines.push(current);
    }
    lines
}

fn line_width<F: Font>(font: &F, scale: PxScale, line: &str) -> f32 {
    let sf = font.as_scaled(scale);
    let mut width = 0.0;
    let mut prev = None;
    for ch in line.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = prev {
            width += sf.kern(prev, id);
        }
        width += sf.h_advance(id);
        prev = Some(id);
    }
    width
}

/// Rasterises `text` (wrapped at `wrap_width`, lines centred) into a
/// transparent premultiplied pixmap. Returns `None` for blank text.
pub fn render_text_pixmap<F: Font>(
    font: &F,
    text: &str,
    height: f32,
    wrap_width: f32,
    color: Rgba,
) -> Option<Pixmap> {
    if text.trim().is_empty() {
        return None;
    }
    let scale = PxScale::from(height);
    let sf = font.as_scaled(scale);
    let lines = wrap_words(text, wrap_width, |s| line_width(font, scale, s));
    let widths: Vec<f32> = lines.iter().map(|l| line_width(font, scale, l)).collect();
    let max_width = widths.iter().cloned().fold(0.0f32, f32::max);
    let line_height = sf.height() + sf.line_gap();

    let w = (max_width.ceil() as u32).max(1) + 2;
    let h = ((line_height * lines.len() as f32).ceil() as u32).max(1) + 2;
    let mut pixmap = Pixmap::new(w, h)?;
    let mut coverage = vec![0f32; (w * h) as usize];

    for (i, (line, lw)) in lines.iter().zip(&widths).enumerate() {
        let baseline = 1.0 + sf.ascent() + i as f32 * line_height;
        let mut pen_x = 1.0 + (max_width - lw) / 2.0;
        let mut prev = None;
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(prev) = prev {
                pen_x += sf.kern(prev, id);
            }
            let glyph = Glyph {
                id,
                scale,
                position: point(pen_x, baseline),
            };
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|x, y, c| {
                    let px = bounds.min.x as i32 + x as i32;
                    let py = bounds.min.y as i32 + y as i32;
                    if px >= 0 && py >= 0 && (px as u32) < w && (py as u32) < h {
                        let idx = py as usize * w as usize + px as usize;
                        coverage[idx] = coverage[idx].max(c);
                    }
                });
            }
            pen_x += sf.h_advance(id);
            prev = Some(id);
        }
    }

    for (dst, cov) in pixmap.pixels_mut().iter_mut().zip(&coverage) {
        if *cov <= f32::EPSILON {
            continue;
        }
        let alpha = cov.clamp(0.0, 1.0) * color.a() as f32 / 255.0;
        *dst = PremultipliedColorU8::from_rgba(
            (color.r() as f32 * alpha) as u8,
            (color.g() as f32 * alpha) as u8,
            (color.b() as f32 * alpha) as u8,
            (alpha * 255.0) as u8,
        )
        .unwrap_or(PremultipliedColorU8::TRANSPARENT);
    }

    Some(pixmap)
}
