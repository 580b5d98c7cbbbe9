// SPDX-License-Identifier: MPL-2.0

//! File type detection for live wallpapers.

use std::path::Path;

use cosmic_livewall_config::MediaKind;

/// Video container extensions that may contain playable video.
/// These are checked case-insensitively.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4",  // MPEG-4 container (typically H.264/H.265 codec)
    "webm", // WebM container (VP8/VP9/AV1)
    "mkv",  // Matroska container (any codec)
    "avi",  // AVI container (legacy format)
    "mov",  // QuickTime container (typically H.264)
    "m4v",  // MPEG-4 Video (Apple variant of MP4)
    "ogv",  // Ogg Video container (Theora codec)
    "3gp",  // 3GPP container, common on phones
];

/// Classifies a file by extension, or `None` if it cannot be a live wallpaper.
#[must_use]
pub fn classify(path: &Path) -> Option<MediaKind> {
    if is_gif_file(path) {
        Some(MediaKind::Gif)
    } else if is_video_file(path) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Check if a path points to a GIF file.
#[must_use]
pub fn is_gif_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"))
}

/// Check if a path points to a video file.
#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };

    let ext_lower = ext.to_lowercase();
    VIDEO_EXTENSIONS.contains(&ext_lower.as_str())
}

/// Test if a specific video file can be played on this system.
///
/// This attempts to preroll a minimal GStreamer pipeline to verify the
/// file's codec is decodable. It is more expensive than [`is_video_file`].
#[cfg(feature = "video")]
#[must_use]
pub fn can_play_video(path: &Path) -> bool {
    use gstreamer::prelude::*;
    use tracing::debug;

    if gstreamer::init().is_err() {
        return false;
    }

    let Some(path_str) = path.to_str() else {
        return false;
    };
    let escaped_path = path_str.replace('\\', "\\\\").replace('"', "\\\"");

    let pipeline_str = format!("filesrc location=\"{escaped_path}\" ! decodebin ! fakesink");

    match gstreamer::parse::launch(&pipeline_str) {
        Ok(element) => {
            if element.set_state(gstreamer::State::Paused).is_err() {
                let _ = element.set_state(gstreamer::State::Null);
                debug!(path = %path.display(), "video file cannot be decoded (set_state failed)");
                return false;
            }

            let (res, state, _) = element.state(gstreamer::ClockTime::from_mseconds(2000));
            let _ = element.set_state(gstreamer::State::Null);

            let can_play = res.is_ok() && state == gstreamer::State::Paused;
            if !can_play {
                debug!(path = %path.display(), "video file cannot be decoded (state check failed)");
            }
            can_play
        }
        Err(why) => {
            debug!(path = %path.display(), %why, "failed to create test pipeline");
            false
        }
    }
}
