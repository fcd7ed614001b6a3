use criterion::{Criterion, black_box, criterion_group, criterion_main};
use hcpmovie_core::{Drawable, FixationLines, MovieStim, Position, Rgba};
use hcpmovie_render::{SkiaRenderer, VideoFrame};
use hcpmovie_timing::HighPrecisionTimer;

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;

fn bench_render_frame(c: &mut Criterion) {
    let timer = HighPrecisionTimer::new();
    let mut renderer = SkiaRenderer::new(WIDTH, HEIGHT, Rgba::GRAY, None).unwrap();
    let mut frame_buffer = vec![0u8; (WIDTH * HEIGHT * 4) as usize];

    let shifted = Position::new(0.0, -135.0);
    let fixation = FixationLines::new(700.0, Rgba::BLACK, 2.0, shifted).with_aperture(true);
    let report = FixationLines::new(17.0, Rgba::BLACK, 2.0, shifted);
    let movie = MovieStim {
        size: (1380.0, 810.0),
        pos: shifted,
    };

    c.bench_function("render_fixation_frame", |b| {
        let scene = [Drawable::Fixation(&fixation), Drawable::Fixation(&report)];
        b.iter(|| {
            renderer
                .render_frame(black_box(&scene), &mut frame_buffer, &timer)
                .unwrap()
        })
    });

    renderer
        .set_movie_frame(VideoFrame {
            width: 1380,
            height: 810,
            data: vec![90u8; 1380 * 810 * 4],
        })
        .unwrap();

    c.bench_function("render_movie_frame", |b| {
        let scene = [Drawable::Movie(&movie)];
        b.iter(|| {
            renderer
                .render_frame(black_box(&scene), &mut frame_buffer, &timer)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_render_frame);
criterion_main!(benches);
