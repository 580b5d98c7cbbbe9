// SPDX-License-Identifier: MPL-2.0

//! Playback backends as seen by the render engine.

use std::path::Path;

use image::RgbaImage;

use super::gif::GifAnimation;

/// A looping video decoder bound to an output.
///
/// Dropping the player releases the decoder.
pub trait VideoPlayback {
    /// Start or resume playback from the current position.
    fn play(&mut self) -> eyre::Result<()>;

    /// Pause playback, keeping the position and the decoder.
    fn pause(&mut self) -> eyre::Result<()>;

    /// Rebind the output to a surface of a new size, keeping the position.
    fn resize(&mut self, width: u32, height: u32);

    /// The most recent frame decoded since the previous call, if any.
    ///
    /// Also restarts playback from the beginning when the end of the media
    /// was reached.
    fn poll_frame(&mut self) -> Option<RgbaImage>;
}

/// Opens the media a selection points to.
pub trait MediaLoader {
    fn open_video(
        &self,
        path: &Path,
        width: u32,
        height: u32,
    ) -> eyre::Result<Box<dyn VideoPlayback>>;

    fn open_gif(&self, path: &Path) -> eyre::Result<GifAnimation>;
}

/// Loads media from the filesystem with the decoders compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoader;

impl MediaLoader for SystemLoader {
    #[cfg(feature = "video")]
    fn open_video(
        &self,
        path: &Path,
        width: u32,
        height: u32,
    ) -> eyre::Result<Box<dyn VideoPlayback>> {
        super::video_player::VideoPlayer::new(path, width, height)
            .map(|player| Box::new(player) as Box<dyn VideoPlayback>)
    }

    #[cfg(not(feature = "video"))]
    fn open_video(
        &self,
        path: &Path,
        _width: u32,
        _height: u32,
    ) -> eyre::Result<Box<dyn VideoPlayback>> {
        Err(eyre::eyre!(
            "built without video support, cannot play {}",
            path.display()
        ))
    }

    fn open_gif(&self, path: &Path) -> eyre::Result<GifAnimation> {
        GifAnimation::open(path)
    }
}
