// SPDX-License-Identifier: MPL-2.0

//! GStreamer-based video player.
//!
//! Frames are decoded by `decodebin`, converted to RGBA, scaled down to the
//! size the output needs and handed over by an `appsink` callback into a
//! single latest-frame slot:
//!
//! ```text
//! filesrc ! decodebin ! videoconvert ! videoscale ! capsfilter ! appsink ──▶ latest frame ──▶ engine tick
//! ```
//!
//! The callback never blocks on the renderer and the renderer never waits for
//! the decoder; a frame that is not picked up in time is replaced by the next.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use gstreamer::prelude::*;
use image::RgbaImage;
use tracing::{debug, error, info, warn};

use super::player::VideoPlayback;

/// Looping video player for a single output.
pub struct VideoPlayer {
    pipeline: gstreamer::Pipeline,
    /// Sets the size frames are scaled to before they reach the appsink.
    size_filter: gstreamer::Element,
    latest: Arc<Mutex<Option<RgbaImage>>>,
    source_path: PathBuf,
    /// Decoded size of the video, known once the pipeline prerolled.
    native: Option<(u32, u32)>,
    target: (u32, u32),
    loops: u32,
}

/// Size the decoder should deliver frames at for a `surface`.
///
/// Frames are scaled to the cover size of the surface when the video is
/// larger than that, and left at their decoded size otherwise.
fn output_size(native: (u32, u32), surface: (u32, u32)) -> (u32, u32) {
    let placement = crate::scaler::cover(native, surface);
    if placement.scale >= 1.0 {
        native
    } else {
        (
            (placement.width.round() as u32).max(1),
            (placement.height.round() as u32).max(1),
        )
    }
}

impl VideoPlayer {
    /// Create a paused player for the video at `path`.
    ///
    /// The pipeline is prerolled so that files GStreamer cannot decode are
    /// rejected here rather than on first play.
    pub fn new(path: &Path, target_width: u32, target_height: u32) -> eyre::Result<Self> {
        gstreamer::init()?;

        let path_str = path
            .to_str()
            .ok_or_else(|| eyre::eyre!("Invalid path: {}", path.display()))?;
        let escaped_path = path_str.replace('\\', "\\\\").replace('"', "\\\"");

        let pipeline_str = format!(
            concat!(
                "filesrc location=\"{path}\" ! ",
                "decodebin ! ",
                "videoconvert ! ",
                "videoscale name=scale ! ",
                "capsfilter name=size caps=\"video/x-raw,format=RGBA\" ! ",
                "appsink name=sink sync=true max-buffers=2 drop=true"
            ),
            path = escaped_path,
        );

        debug!(pipeline = %pipeline_str, "creating GStreamer pipeline");

        let pipeline = gstreamer::parse::launch(&pipeline_str)?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| eyre::eyre!("Failed to create pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| eyre::eyre!("Failed to get appsink from pipeline"))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| eyre::eyre!("Element 'sink' is not an AppSink"))?;

        let latest = Arc::new(Mutex::new(None));
        Self::setup_appsink_callback(&appsink, Arc::clone(&latest));

        pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|why| eyre::eyre!("Failed to preroll {}: {why:?}", path.display()))?;

        let (result, _, _) = pipeline.state(gstreamer::ClockTime::from_mseconds(2000));
        if let Err(why) = result {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(eyre::eyre!(
                "Failed to decode {}: {why:?}",
                path.display()
            ));
        }

        let size_filter = pipeline
            .by_name("size")
            .ok_or_else(|| eyre::eyre!("Failed to get size filter from pipeline"))?;

        let native = pipeline
            .by_name("scale")
            .and_then(|scale| scale.static_pad("sink"))
            .and_then(|pad| pad.current_caps())
            .and_then(|caps| gstreamer_video::VideoInfo::from_caps(&caps).ok())
            .map(|info| (info.width(), info.height()));

        info!(
            path = %path.display(),
            native = ?native,
            width = target_width,
            height = target_height,
            "video loaded"
        );

        let mut player = Self {
            pipeline,
            size_filter,
            latest,
            source_path: path.to_path_buf(),
            native,
            target: (0, 0),
            loops: 0,
        };
        player.resize(target_width, target_height);

        Ok(player)
    }

    fn setup_appsink_callback(
        appsink: &gstreamer_app::AppSink,
        latest: Arc<Mutex<Option<RgbaImage>>>,
    ) {
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| Self::handle_sample(appsink, &latest))
                .build(),
        );
    }

    fn handle_sample(
        appsink: &gstreamer_app::AppSink,
        latest: &Mutex<Option<RgbaImage>>,
    ) -> Result<gstreamer::FlowSuccess, gstreamer::FlowError> {
        let sample = match appsink.pull_sample() {
            Ok(s) => s,
            Err(why) => {
                warn!(?why, "pull_sample failed");
                return Ok(gstreamer::FlowSuccess::Ok);
            }
        };

        let Some(frame) = sample_to_image(&sample) else {
            return Ok(gstreamer::FlowSuccess::Ok);
        };

        *latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);

        Ok(gstreamer::FlowSuccess::Ok)
    }

    /// Seek to the beginning for looping.
    fn seek_to_start(&self) -> eyre::Result<()> {
        let seek_flags = gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT;

        self.pipeline
            .seek_simple(seek_flags, gstreamer::ClockTime::ZERO)?;

        Ok(())
    }

    /// Drains the bus, looping on EOS.
    fn process_messages(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };

        while let Some(msg) = bus.pop() {
            use gstreamer::MessageView;

            match msg.view() {
                MessageView::Eos(_) => {
                    self.loops += 1;
                    debug!(loops = self.loops, path = %self.source_path.display(), "video EOS, seeking to start");

                    if let Err(why) = self.seek_to_start() {
                        error!(?why, "failed to seek to start for loop");
                    }
                }
                MessageView::Error(err) => {
                    error!(
                        src = ?err.src().map(|s| s.path_string()),
                        error = %err.error(),
                        "GStreamer pipeline error"
                    );
                }
                MessageView::Warning(warn) => {
                    warn!(
                        src = ?warn.src().map(|s| s.path_string()),
                        error = %warn.error(),
                        "GStreamer pipeline warning"
                    );
                }
                _ => {}
            }
        }
    }
}

/// Copies a mapped RGBA sample into an image, dropping row padding.
fn sample_to_image(sample: &gstreamer::Sample) -> Option<RgbaImage> {
    let buffer = sample.buffer()?;
    let caps = sample.caps()?;
    let video_info = gstreamer_video::VideoInfo::from_caps(caps).ok()?;

    let width = video_info.width();
    let height = video_info.height();
    let row = width as usize * 4;
    let stride = usize::try_from(*video_info.stride().first()?).ok()?;

    let map = buffer.map_readable().ok()?;
    let data = map.as_slice();

    let mut pixels = Vec::with_capacity(row * height as usize);
    for line in data.chunks(stride.max(row)).take(height as usize) {
        pixels.extend_from_slice(line.get(..row)?);
    }

    RgbaImage::from_raw(width, height, pixels)
}

impl VideoPlayback for VideoPlayer {
    fn play(&mut self) -> eyre::Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|why| eyre::eyre!("Failed to start pipeline: {why:?}"))?;
        Ok(())
    }

    fn pause(&mut self) -> eyre::Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|why| eyre::eyre!("Failed to pause pipeline: {why:?}"))?;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.target == (width, height) || width == 0 || height == 0 {
            return;
        }
        self.target = (width, height);

        let Some(native) = self.native else {
            return;
        };

        let (out_width, out_height) = output_size(native, (width, height));
        debug!(
            path = %self.source_path.display(),
            surface = ?(width, height),
            output = ?(out_width, out_height),
            "rebinding video output"
        );

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGBA")
            .field("width", i32::try_from(out_width).unwrap_or(i32::MAX))
            .field("height", i32::try_from(out_height).unwrap_or(i32::MAX))
            .build();
        self.size_filter.set_property("caps", &caps);
    }

    fn poll_frame(&mut self) -> Option<RgbaImage> {
        self.process_messages();
        self.latest.try_lock().ok()?.take()
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        if let Err(why) = self.pipeline.set_state(gstreamer::State::Null) {
            error!(?why, "failed to stop video pipeline on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::output_size;

    #[test]
    fn large_videos_are_scaled_to_the_cover_size() {
        assert_eq!(output_size((3840, 2160), (1920, 1080)), (1920, 1080));
        // portrait 4K on a landscape 1080p output keeps the full width
        assert_eq!(output_size((2160, 3840), (1920, 1080)), (1920, 3413));
    }

    #[test]
    fn small_videos_are_never_upscaled_by_the_decoder() {
        assert_eq!(output_size((1080, 1920), (3840, 2160)), (1080, 1920));
        assert_eq!(output_size((640, 360), (1920, 1080)), (640, 360));
    }
}
