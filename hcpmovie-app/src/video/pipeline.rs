use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use hcpmovie_render::VideoFrame;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type FrameSlot = Arc<Mutex<Option<VideoFrame>>>;

pub struct MoviePlayer {
    playbin: gst::Element,
    latest: FrameSlot,
    frames_dropped: Arc<AtomicU64>,
    playing: bool,
}

impl MoviePlayer {
    /// Prepares playback of `path` with frames scaled to `width` x `height`
    pub fn load(path: &Path, width: u32, height: u32, muted: bool) -> Result<Self> {
        gst::init().context("Failed to initialize GStreamer")?;
        log::info!("Loading movie: {}", path.display());

        let uri = gst::glib::filename_to_uri(path, None)
            .with_context(|| format!("Invalid movie path: {}", path.display()))?;

        let sink_description = format!(
            "videoconvert ! videoscale ! video/x-raw,format=RGBA,width={},height={} ! appsink name=sink",
            width, height
        );
        log::debug!("Movie sink: {}", sink_description);
        let sink_bin = gst::parse::bin_from_description(&sink_description, true)
            .context("Failed to build the movie sink")?;
        let app_sink = sink_bin
            .by_name("sink")
            .context("Movie sink has no appsink")?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| anyhow::anyhow!("sink is not an AppSink"))?;

        // pace frames by their timestamps, keep only the newest
        app_sink.set_property("sync", true);
        app_sink.set_property("max-buffers", 1u32);
        app_sink.set_property("drop", true);

        let playbin = gst::ElementFactory::make("playbin")
            .name("movie")
            .property("uri", uri.as_str())
            .property("video-sink", &sink_bin)
            .property("mute", muted)
            .build()
            .context("Failed to create playbin")?;

        let latest = FrameSlot::default();
        let frames_dropped = Arc::new(AtomicU64::new(0));
        install_frame_callback(&app_sink, Arc::clone(&latest), Arc::clone(&frames_dropped));

        playbin
            .set_state(gst::State::Paused)
            .context("Failed to preroll the movie")?;

        Ok(Self {
            playbin,
            latest,
            frames_dropped,
            playing: false,
        })
    }

    pub fn play(&mut self) -> Result<()> {
        log::info!("Starting movie playback");
        self.playbin
            .set_state(gst::State::Playing)
            .context("Failed to set the movie to Playing")?;
        self.playing = true;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        log::info!(
            "Stopping movie playback ({} frames dropped)",
            self.frames_dropped.load(Ordering::Relaxed)
        );
        self.playbin
            .set_state(gst::State::Null)
            .context("Failed to stop the movie")?;
        self.playing = false;
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// The newest decoded frame, if one arrived since the last call
    pub fn take_frame(&self) -> Option<VideoFrame> {
        self.latest.lock().ok()?.take()
    }

    /// Surfaces pipeline errors; end of stream is only logged
    pub fn poll_bus(&self) -> Result<()> {
        let Some(bus) = self.playbin.bus() else {
            return Ok(());
        };
        while let Some(message) = bus.pop() {
            match message.view() {
                gst::MessageView::Error(err) => {
                    anyhow::bail!(
                        "Movie playback failed: {} ({:?})",
                        err.error(),
                        err.debug()
                    );
                }
                gst::MessageView::Eos(..) => log::info!("Movie reached end of stream"),
                _ => {}
            }
        }
        Ok(())
    }
}

impl Drop for MoviePlayer {
    fn drop(&mut self) {
        if let Err(e) = self.playbin.set_state(gst::State::Null) {
            log::warn!("Failed to release the movie pipeline: {}", e);
        }
    }
}

fn install_frame_callback(app_sink: &gst_app::AppSink, latest: FrameSlot, dropped: Arc<AtomicU64>) {
    app_sink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                let caps = sample.caps().ok_or(gst::FlowError::Error)?;
                let info =
                    gst_video::VideoInfo::from_caps(caps).map_err(|_| gst::FlowError::Error)?;
                let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                let frame = pack_rgba(
                    map.as_slice(),
                    info.width(),
                    info.height(),
                    info.stride()[0] as usize,
                );

                if let Ok(mut slot) = latest.lock() {
                    if slot.is_some() {
                        dropped.fetch_add(1, Ordering::Relaxed);
                        log::trace!("Movie frame dropped (previous frame not shown in time)");
                    }
                    *slot = Some(frame);
                }
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );
}

/// Copies rows into a tightly packed RGBA frame. Short input is kept as is
/// and rejected later by the renderer.
fn pack_rgba(data: &[u8], width: u32, height: u32, stride: usize) -> VideoFrame {
    let row = width as usize * 4;
    let data = if stride == row || stride == 0 {
        data.get(..row * height as usize).unwrap_or(data).to_vec()
    } else {
        data.chunks(stride)
            .take(height as usize)
            .flat_map(|line| line.get(..row).unwrap_or(line))
            .copied()
            .collect()
    };
    VideoFrame {
        width,
        height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_rows_are_packed() {
        let mut data = Vec::new();
        for y in 0..2u8 {
            data.extend_from_slice(&[y, y, y, 255, y, y, y, 255, 9, 9]);
        }
        let frame = pack_rgba(&data, 2, 2, 10);
        assert_eq!(frame.data.len(), 16);
        assert_eq!(&frame.data[8..12], &[1, 1, 1, 255]);
    }

    #[test]
    fn tight_rows_are_copied() {
        let data = vec![7u8; 2 * 2 * 4];
        let frame = pack_rgba(&data, 2, 2, 8);
        assert_eq!(frame.data, data);
    }
}
