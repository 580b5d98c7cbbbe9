// SPDX-License-Identifier: MPL-2.0

//! Persisted settings of the live wallpaper.
//!
//! The picker publishes a [`WallpaperSelection`] and the daemon reads it back
//! through the [`SettingsStore`] trait. Two implementations are provided:
//! [`CosmicSettings`], backed by `cosmic-config`, and [`MemoryStore`].

mod memory;

pub use memory::MemoryStore;

use cosmic_config::{Config as CosmicConfig, ConfigGet, ConfigSet};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const NAME: &str = "com.system76.CosmicLiveWallpaper";
pub const VERSION: u64 = 1;

pub const FILE_PATH_KEY: &str = "file_path";
pub const FILE_TYPE_KEY: &str = "file_type";
pub const SCALING_MODE_KEY: &str = "scaling_mode";
pub const FILTER_METHOD_KEY: &str = "filter_method";
pub const BACKGROUND_KEY: &str = "background_color";

/// Keys whose change requires the media to be reloaded.
pub const SELECTION_KEYS: [&str; 2] = [FILE_PATH_KEY, FILE_TYPE_KEY];

/// Keys whose change only affects how the current media is drawn.
pub const APPEARANCE_KEYS: [&str; 3] = [SCALING_MODE_KEY, FILTER_METHOD_KEY, BACKGROUND_KEY];

/// The kind of media that was selected.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Gif,
}

impl MediaKind {
    /// Parses the stored type tag. Anything but `gif` is played as a video.
    pub fn from_tag(tag: &str) -> Self {
        if tag == "gif" {
            MediaKind::Gif
        } else {
            MediaKind::Video
        }
    }

    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Gif => "gif",
        }
    }
}

/// The file chosen by the user together with how it should be played.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct WallpaperSelection {
    pub file_path: PathBuf,
    pub media_kind: MediaKind,
}

impl WallpaperSelection {
    pub fn new(file_path: impl Into<PathBuf>, media_kind: MediaKind) -> Self {
        Self {
            file_path: file_path.into(),
            media_kind,
        }
    }

    /// Builds a selection from the two stored values.
    ///
    /// Returns `None` unless both are present, so a half-written pair is never
    /// handed to the renderer.
    pub fn from_parts(file_path: Option<String>, file_type: Option<String>) -> Option<Self> {
        match (file_path, file_type) {
            (Some(path), Some(tag)) if !path.is_empty() && !tag.is_empty() => {
                Some(Self::new(path, MediaKind::from_tag(&tag)))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Image filtering method
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMethod {
    // nearest neighbor filtering
    Nearest,
    // linear filtering
    Linear,
    // lanczos filtering with window 3
    #[default]
    Lanczos,
}

impl From<FilterMethod> for image::imageops::FilterType {
    fn from(method: FilterMethod) -> Self {
        match method {
            FilterMethod::Nearest => image::imageops::FilterType::Nearest,
            FilterMethod::Linear => image::imageops::FilterType::Triangle,
            FilterMethod::Lanczos => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Image scaling mode
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq)]
pub enum ScalingMode {
    // Fit the media and fill the rest of the area with the background color
    Fit,
    /// Stretch the media ignoring any aspect ratio to fit the area
    Stretch,
    /// Zoom the media so that it fills the whole area, cropping the overflow
    #[default]
    Zoom,
}

/// How the selected media is drawn onto the surface.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Setters)]
#[must_use]
pub struct Appearance {
    pub scaling_mode: ScalingMode,
    pub filter_method: FilterMethod,
    /// RGB color, each channel in `0.0..=1.0`, painted behind the media.
    pub background: [f32; 3],
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            scaling_mode: ScalingMode::default(),
            filter_method: FilterMethod::default(),
            background: [0.0, 0.0, 0.0],
        }
    }
}

/// A key/value store holding the wallpaper settings.
///
/// Change notification is left to the host: the daemon subscribes to the
/// `cosmic-config` watcher, and [`MemoryStore`] offers listeners directly.
pub trait SettingsStore {
    type Error: std::fmt::Debug + std::fmt::Display;

    /// The current selection, or `None` if it is missing or incomplete.
    fn selection(&self) -> Option<WallpaperSelection>;

    /// Writes both halves of the selection as a single change.
    ///
    /// # Errors
    ///
    /// Fails if the backing store could not be written.
    fn publish(&self, selection: &WallpaperSelection) -> Result<(), Self::Error>;

    /// Unsets both halves of the selection as a single change.
    ///
    /// # Errors
    ///
    /// Fails if the backing store could not be written.
    fn clear(&self) -> Result<(), Self::Error>;

    /// The drawing options; missing values fall back to their defaults.
    fn appearance(&self) -> Appearance;
}

/// Settings persisted through `cosmic-config`.
#[derive(Debug, Clone)]
pub struct CosmicSettings {
    config: CosmicConfig,
}

impl CosmicSettings {
    /// Opens the settings of the current user.
    ///
    /// # Errors
    ///
    /// Fails if cosmic-config paths are missing or cannot be created.
    pub fn new() -> Result<Self, cosmic_config::Error> {
        CosmicConfig::new(NAME, VERSION).map(|config| Self { config })
    }

    /// The underlying handle, used to watch for changes.
    #[must_use]
    pub fn config(&self) -> &CosmicConfig {
        &self.config
    }

    fn get_or_default<T>(&self, key: &str) -> T
    where
        T: Default + serde::de::DeserializeOwned,
    {
        match self.config.get::<T>(key) {
            Ok(value) => value,
            Err(why) => {
                tracing::debug!(key, ?why, "using default setting");
                T::default()
            }
        }
    }
}

impl SettingsStore for CosmicSettings {
    type Error = cosmic_config::Error;

    fn selection(&self) -> Option<WallpaperSelection> {
        let file_path = self.config.get::<String>(FILE_PATH_KEY).ok();
        let file_type = self.config.get::<String>(FILE_TYPE_KEY).ok();
        WallpaperSelection::from_parts(file_path, file_type)
    }

    fn publish(&self, selection: &WallpaperSelection) -> Result<(), Self::Error> {
        let tx = self.config.transaction();
        tx.set(
            FILE_PATH_KEY,
            selection.file_path.to_string_lossy().into_owned(),
        )?;
        tx.set(FILE_TYPE_KEY, selection.media_kind.tag().to_owned())?;
        tx.commit()
    }

    // An empty pair reads back as no selection.
    fn clear(&self) -> Result<(), Self::Error> {
        let tx = self.config.transaction();
        tx.set(FILE_PATH_KEY, String::new())?;
        tx.set(FILE_TYPE_KEY, String::new())?;
        tx.commit()
    }

    fn appearance(&self) -> Appearance {
        let defaults = Appearance::default();
        Appearance {
            scaling_mode: self.get_or_default(SCALING_MODE_KEY),
            filter_method: self.get_or_default(FILTER_METHOD_KEY),
            background: self
                .config
                .get::<[f32; 3]>(BACKGROUND_KEY)
                .unwrap_or(defaults.background),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gif_tag_is_the_only_gif() {
        assert_eq!(MediaKind::from_tag("gif"), MediaKind::Gif);
        assert_eq!(MediaKind::from_tag("video"), MediaKind::Video);
        assert_eq!(MediaKind::from_tag("mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_tag(""), MediaKind::Video);
        assert_eq!(MediaKind::from_tag("GIF"), MediaKind::Video);
    }

    #[test]
    fn tags_survive_a_round_trip() {
        for kind in [MediaKind::Gif, MediaKind::Video] {
            assert_eq!(MediaKind::from_tag(kind.tag()), kind);
        }
    }

    #[test]
    fn selection_requires_both_parts() {
        assert_eq!(WallpaperSelection::from_parts(None, None), None);
        assert_eq!(
            WallpaperSelection::from_parts(Some("/tmp/a.gif".into()), None),
            None
        );
        assert_eq!(
            WallpaperSelection::from_parts(None, Some("gif".into())),
            None
        );
        assert_eq!(
            WallpaperSelection::from_parts(Some(String::new()), Some("gif".into())),
            None
        );
        assert_eq!(
            WallpaperSelection::from_parts(Some("/tmp/a.gif".into()), Some(String::new())),
            None
        );
        assert_eq!(
            WallpaperSelection::from_parts(Some("/tmp/a.gif".into()), Some("gif".into())),
            Some(WallpaperSelection::new("/tmp/a.gif", MediaKind::Gif))
        );
    }

    #[test]
    fn appearance_defaults_to_black_zoom() {
        let appearance = Appearance::default();
        assert_eq!(appearance.scaling_mode, ScalingMode::Zoom);
        assert_eq!(appearance.filter_method, FilterMethod::Lanczos);
        assert_eq!(appearance.background, [0.0; 3]);

        let fit = Appearance::default().scaling_mode(ScalingMode::Fit);
        assert_eq!(fit.scaling_mode, ScalingMode::Fit);
    }
}
