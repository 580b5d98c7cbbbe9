// SPDX-License-Identifier: MPL-2.0

//! Choosing the wallpaper file.
//!
//! The picker never talks to the daemon. It validates a file and publishes
//! it to the settings store, which the daemon watches.

use std::{fs::File, path::Path};

use cosmic_livewall_config::{MediaKind, SettingsStore, WallpaperSelection};
use eyre::{WrapErr, bail, eyre};

use crate::animated::{GifAnimation, classify, effective_duration};

/// Resolves `path` to an absolute, readable, supported file.
pub fn validate(path: &Path) -> eyre::Result<WallpaperSelection> {
    let absolute = path
        .canonicalize()
        .wrap_err_with(|| format!("unable to access {}", path.display()))?;

    if !absolute.is_file() {
        bail!("{} is not a file", absolute.display());
    }

    File::open(&absolute).wrap_err_with(|| format!("unable to read {}", absolute.display()))?;

    let kind = classify(&absolute)
        .ok_or_else(|| eyre!("unsupported file type: {}", absolute.display()))?;

    Ok(WallpaperSelection::new(absolute, kind))
}

/// Validates `path` and publishes it as the new wallpaper.
pub fn set<S: SettingsStore>(store: &S, path: &Path) -> eyre::Result<WallpaperSelection> {
    let selection = validate(path)?;

    store
        .publish(&selection)
        .map_err(|why| eyre!("failed to set wallpaper: {why}"))?;

    tracing::info!(
        path = %selection.path().display(),
        kind = selection.media_kind.tag(),
        "wallpaper selected"
    );

    Ok(selection)
}

/// Unsets the wallpaper; the daemon falls back to the background color.
pub fn clear<S: SettingsStore>(store: &S) -> eyre::Result<()> {
    store
        .clear()
        .map_err(|why| eyre!("failed to clear wallpaper: {why}"))?;

    tracing::info!("wallpaper cleared");
    Ok(())
}

/// One line describing the stored selection.
#[must_use]
pub fn describe(selection: Option<&WallpaperSelection>) -> String {
    match selection {
        Some(selection) => format!(
            "{} ({})",
            selection.path().display(),
            selection.media_kind.tag()
        ),
        None => "none".to_owned(),
    }
}

/// Decodes `path` as the daemon would and describes the result.
pub fn preview(path: &Path) -> eyre::Result<String> {
    let selection = validate(path)?;

    match selection.media_kind {
        MediaKind::Gif => {
            let animation = GifAnimation::open(selection.path())?;
            let (width, height) = animation.dimensions();
            let looped = effective_duration(animation.duration());
            let mut line = format!(
                "GIF {width}x{height}, {} frames, {} ms loop",
                animation.frame_count(),
                looped.as_millis()
            );
            if animation.duration().is_zero() {
                line.push_str(" (no timing declared)");
            }
            Ok(line)
        }

        #[cfg(feature = "video")]
        MediaKind::Video => {
            if crate::animated::can_play_video(selection.path()) {
                Ok("video, decodable".to_owned())
            } else {
                Err(eyre!(
                    "GStreamer cannot decode {}",
                    selection.path().display()
                ))
            }
        }

        #[cfg(not(feature = "video"))]
        MediaKind::Video => Ok("video, not checked (built without video support)".to_owned()),
    }
}
