// SPDX-License-Identifier: MPL-2.0

//! Animated wallpaper sources.
//!
//! - [`gif`]: GIFs decoded into memory and played back by wall-clock time
//! - [`video_player`]: GStreamer playback for video containers, looped on EOS
//! - [`player`]: the seams the render engine depends on, and the loader that
//!   opens files for it
//! - [`detection`]: file type classification

mod detection;
mod gif;
mod player;
#[cfg(feature = "video")]
mod video_player;

pub use detection::{classify, is_gif_file, is_video_file};
#[cfg(feature = "video")]
pub use detection::can_play_video;
pub use gif::{FALLBACK_DURATION, GifAnimation, effective_duration, frame_time};
pub use player::{MediaLoader, SystemLoader, VideoPlayback};
