// SPDX-License-Identifier: MPL-2.0

//! GIF animations decoded into memory and sampled by elapsed time.

use std::{
    fs::File,
    io::{BufRead, BufReader, Seek},
    path::Path,
    time::Duration,
};

use eyre::{WrapErr, eyre};
use image::{AnimationDecoder, DynamicImage, RgbaImage, codecs::gif::GifDecoder};

/// Duration used when a GIF declares a total playtime of zero.
pub const FALLBACK_DURATION: Duration = Duration::from_millis(1000);

/// The duration playback loops over, never zero.
#[must_use]
pub fn effective_duration(declared: Duration) -> Duration {
    if declared.is_zero() {
        FALLBACK_DURATION
    } else {
        declared
    }
}

/// Position inside the animation after `elapsed` time of looped playback.
///
/// Always in `0..effective_duration(duration)`.
#[must_use]
pub fn frame_time(elapsed: Duration, duration: Duration) -> Duration {
    let period = effective_duration(duration).as_nanos();
    // the remainder is below `period`, which came from a `Duration`
    Duration::from_nanos((elapsed.as_nanos() % period) as u64)
}

#[derive(Debug)]
struct GifFrame {
    image: DynamicImage,
    /// Offset at which the next frame starts.
    end: Duration,
}

/// A fully composited GIF held in memory.
#[derive(Debug)]
pub struct GifAnimation {
    frames: Vec<GifFrame>,
    width: u32,
    height: u32,
    duration: Duration,
}

impl GifAnimation {
    /// Decodes the GIF at `path`.
    pub fn open(path: &Path) -> eyre::Result<Self> {
        let file = File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
        Self::decode(BufReader::new(file))
            .wrap_err_with(|| format!("failed to decode {}", path.display()))
    }

    /// Decodes a GIF from any seekable reader.
    pub fn decode<R: BufRead + Seek>(reader: R) -> eyre::Result<Self> {
        let decoder = GifDecoder::new(reader)?;
        let frames = decoder
            .into_frames()
            .collect_frames()?
            .into_iter()
            .map(|frame| {
                let (numer, denom) = frame.delay().numer_denom_ms();
                let delay = Duration::from_micros(
                    u64::from(numer) * 1000 / u64::from(denom.max(1)),
                );
                (frame.into_buffer(), delay)
            })
            .collect();

        Self::from_frames(frames)
    }

    /// Builds an animation from already composited frames and their delays.
    pub fn from_frames(frames: Vec<(RgbaImage, Duration)>) -> eyre::Result<Self> {
        let (width, height) = frames
            .first()
            .map(|(image, _)| image.dimensions())
            .ok_or_else(|| eyre!("animation has no frames"))?;

        if width == 0 || height == 0 {
            return Err(eyre!("animation has an empty canvas"));
        }

        let mut end = Duration::ZERO;
        let frames = frames
            .into_iter()
            .map(|(image, delay)| {
                end += delay;
                GifFrame {
                    image: DynamicImage::ImageRgba8(image),
                    end,
                }
            })
            .collect();

        Ok(Self {
            frames,
            width,
            height,
            duration: end,
        })
    }

    /// Total declared playtime, which may be zero.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Index of the frame shown at `time`, measured from the animation start.
    ///
    /// An animation without declared timing always shows its first frame.
    #[must_use]
    pub fn frame_index_at(&self, time: Duration) -> usize {
        if self.duration.is_zero() {
            return 0;
        }

        self.frames
            .iter()
            .position(|frame| time < frame.end)
            .unwrap_or(self.frames.len() - 1)
    }

    #[must_use]
    pub fn frame(&self, index: usize) -> Option<&DynamicImage> {
        self.frames.get(index).map(|frame| &frame.image)
    }
}
