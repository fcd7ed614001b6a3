//! Movie playback.
//!
//! With the `video` feature, a GStreamer `playbin` decodes the movie and an
//! appsink hands over RGBA frames already scaled to the display size. The
//! event loop polls for the newest frame once per redraw.

#[cfg(feature = "video")]
mod pipeline;

#[cfg(feature = "video")]
pub use pipeline::MoviePlayer;

#[cfg(not(feature = "video"))]
pub use player_stub::MoviePlayer;

#[cfg(not(feature = "video"))]
mod player_stub {
    use anyhow::Result;
    use hcpmovie_render::VideoFrame;
    use std::path::Path;

    /// Stand-in when video support is not compiled in; shows no frames
    pub struct MoviePlayer {
        playing: bool,
    }

    impl MoviePlayer {
        pub fn load(path: &Path, _width: u32, _height: u32, _muted: bool) -> Result<Self> {
            log::warn!(
                "Video support not compiled in, {} will not be shown",
                path.display()
            );
            Ok(Self { playing: false })
        }

        pub fn play(&mut self) -> Result<()> {
            self.playing = true;
            Ok(())
        }

        pub fn stop(&mut self) -> Result<()> {
            self.playing = false;
            Ok(())
        }

        pub fn is_playing(&self) -> bool {
            self.playing
        }

        pub fn take_frame(&self) -> Option<VideoFrame> {
            None
        }

        pub fn poll_bus(&self) -> Result<()> {
            Ok(())
        }
    }
}
