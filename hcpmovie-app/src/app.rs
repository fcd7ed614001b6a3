use crate::keys;
use crate::video::MoviePlayer;
use anyhow::{Context, Result};
use hcpmovie_core::{InputEvent, Key};
use hcpmovie_experiment::{Session, SessionStatus};
use hcpmovie_render::{FontVec, SkiaRenderer};
use hcpmovie_timing::{HighPrecisionTimer, Timer, ns_to_secs};
use pixels::{Pixels, SurfaceTexture};
use std::sync::Arc;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowId},
};

/// The window, the frame loop and everything that drives the session
pub struct App {
    session: Session,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    font: Option<FontVec>,
    movie: Option<MoviePlayer>,
    timer: HighPrecisionTimer,
    last_frame: Option<u64>,

    /// Key presses since the last redraw
    pending: Vec<InputEvent>,
    error: Option<anyhow::Error>,
    should_exit: bool,
}

impl App {
    pub fn new(session: Session, font: Option<FontVec>) -> Self {
        Self {
            session,
            window: None,
            pixels: None,
            renderer: None,
            font,
            movie: None,
            timer: HighPrecisionTimer::new(),
            last_frame: None,
            pending: Vec::new(),
            error: None,
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        log::info!(
            "Platform: {} ({})",
            std::env::consts::OS,
            std::env::consts::ARCH
        );

        let result = event_loop.run_app(&mut self);
        self.finish(result.map_err(Into::into))
    }

    fn now_secs(&self) -> f64 {
        ns_to_secs(self.timer.now())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_settings = self.session.context().config.window.clone();

        let mut window_attributes = Window::default_attributes()
            .with_title("hcpmovie")
            .with_resizable(false);

        if window_settings.fullscreen {
            let monitor = event_loop
                .primary_monitor()
                .or_else(|| event_loop.available_monitors().next())
                .context("No monitor available")?;
            if let Some(rate) = monitor.refresh_rate_millihertz() {
                log::info!("Refresh rate: {:.1} Hz", rate as f64 / 1000.0);
            }
            window_attributes =
                window_attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))));
        } else {
            let [w, h] = window_settings.size;
            window_attributes = window_attributes.with_inner_size(PhysicalSize::new(w, h));
        }

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();
        log::info!(
            "Display: {}x{} (scale factor {:.2})",
            size.width,
            size.height,
            window.scale_factor()
        );

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface_texture)?);
        self.renderer = Some(SkiaRenderer::new(
            size.width,
            size.height,
            window_settings.color,
            self.font.take(),
        )?);

        let movie = &self.session.context().movie;
        let (w, h) = movie.stim.size;
        self.movie = Some(MoviePlayer::load(
            &movie.path,
            w.round() as u32,
            h.round() as u32,
            movie.muted,
        )?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);

        let now = self.now_secs();
        self.session.start(now)?;
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let now = self.now_secs();
        let events = std::mem::take(&mut self.pending);
        match self.session.tick(now, &events) {
            SessionStatus::Finished | SessionStatus::Aborted => {
                self.exit(event_loop);
                return Ok(());
            }
            SessionStatus::NotStarted | SessionStatus::Running => {}
        }

        self.sync_movie()?;
        self.render()?;

        if let Some(window) = &self.window {
            window.request_redraw();
        }
        Ok(())
    }

    /// Plays the movie exactly while the scene contains it
    fn sync_movie(&mut self) -> Result<()> {
        let (Some(movie), Some(renderer)) = (self.movie.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        let wanted = self.session.shows_movie();
        if wanted && !movie.is_playing() {
            movie.play()?;
        } else if !wanted && movie.is_playing() {
            movie.stop()?;
            renderer.clear_movie_frame();
        }

        movie.poll_bus()?;
        if let Some(frame) = movie.take_frame() {
            renderer.set_movie_frame(frame)?;
        }
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let scene = self.session.scene();
        let stats = renderer.render_frame(&scene, pixels.frame_mut(), &self.timer)?;
        let t = self.timer.now();
        pixels.render()?;
        let present = self.timer.elapsed(t);

        let now = self.timer.now();
        if let Some(last) = self.last_frame.replace(now) {
            self.timer
                .record_frame(Duration::from_nanos(now.saturating_sub(last)));
        }

        log::trace!(
            "present {:.3}ms, clear {:.3}ms, draw {:.3}ms, copy {:.3}ms, total {:.3}ms",
            present.as_secs_f64() * 1e3,
            stats.clear.as_secs_f64() * 1e3,
            stats.draw.as_secs_f64() * 1e3,
            stats.copy.as_secs_f64() * 1e3,
            stats.total.as_secs_f64() * 1e3,
        );
        Ok(())
    }

    fn handle_key(&mut self, event: &KeyEvent, event_loop: &ActiveEventLoop) {
        let Some(key) = keys::from_logical(&event.logical_key) else {
            return;
        };
        if key == Key::Escape {
            log::warn!("Escape pressed, closing");
            self.session.abort();
            self.exit(event_loop);
            return;
        }
        let timestamp = self.now_secs();
        self.pending.push(InputEvent::new(key, timestamp));
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                log::warn!("Failed to resize surface: {}", e);
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                log::warn!("Failed to resize buffer: {}", e);
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                log::warn!("Failed to resize canvas: {}", e);
            }
        }
        log::info!("Display resized to {}x{}", new_size.width, new_size.height);
    }

    fn fail(&mut self, error: anyhow::Error, event_loop: &ActiveEventLoop) {
        log::error!("{:#}", error);
        self.error.get_or_insert(error);
        self.session.abort();
        self.exit(event_loop);
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        event_loop.exit();
    }

    /// Stops the movie, closes the session and reports frame timing
    fn finish(mut self, loop_result: Result<()>) -> Result<()> {
        if let Some(mut movie) = self.movie.take() {
            if movie.is_playing() {
                if let Err(e) = movie.stop() {
                    log::warn!("{:#}", e);
                }
            }
        }

        let close_result = self.session.close();

        let stats = self.timer.frame_stats();
        if stats.frames > 0 {
            log::info!(
                "Frames: {}, mean {:.3}ms, jitter {:.3}ms, min {:.3}ms, max {:.3}ms, {:.1} fps",
                stats.frames,
                stats.average_frame_time_ns / 1e6,
                stats.jitter_ns / 1e6,
                stats.min_frame_time_ns / 1e6,
                stats.max_frame_time_ns / 1e6,
                stats.effective_fps,
            );
        }

        match self.session.status() {
            SessionStatus::Finished => log::info!("Experiment completed"),
            status => log::warn!("Experiment ended early ({:?})", status),
        }

        if let Some(error) = self.error.take() {
            return Err(error);
        }
        loop_result?;
        close_result.context("Failed to close the session")
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.fail(e.context("Failed to create window and surface"), event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.session.abort();
                self.exit(event_loop);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw(event_loop) {
                    self.fail(e, event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.handle_key(&event, event_loop);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
