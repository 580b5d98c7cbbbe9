// SPDX-License-Identifier: MPL-2.0

//! The per-output rendering session.
//!
//! An [`Engine`] owns the playback state of one wallpaper surface and turns
//! host events (settings loaded, surface created/changed/destroyed,
//! visibility) into playback operations. It knows nothing about Wayland: the
//! host presents whatever [`Engine::tick`] returns and arms a redraw timer
//! whenever [`Engine::arm_redraw`] says so.
//!
//! ```text
//! Idle ──load──▶ Loaded(Video | Gif) ──load──▶ Loaded(..)
//!                  │  visible ⇄ hidden
//!                  ▼
//!              Destroyed
//! ```

use std::time::{Duration, Instant};

use cosmic_livewall_config::{Appearance, MediaKind, WallpaperSelection};
use image::{DynamicImage, RgbaImage};
use tracing::{debug, info, warn};

use crate::animated::{GifAnimation, MediaLoader, VideoPlayback, frame_time};

/// Delay between two redraws while the surface is visible.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Why a selection did not result in playback.
#[derive(Debug)]
pub enum LoadError {
    /// One or both settings are missing.
    ConfigurationIncomplete,
    /// The selected file could not be read or decoded.
    DecodeFailure(eyre::Report),
    /// The engine was torn down and accepts no more media.
    Destroyed,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::ConfigurationIncomplete => f.write_str("no wallpaper has been selected"),
            LoadError::DecodeFailure(why) => write!(f, "media could not be decoded: {why:#}"),
            LoadError::Destroyed => f.write_str("the wallpaper surface was destroyed"),
        }
    }
}

impl std::error::Error for LoadError {}

/// What the host should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    /// Run the next tick after the given delay.
    After(Duration),
    /// Stop ticking until [`Engine::arm_redraw`] asks again.
    Stop,
}

/// Result of one redraw tick.
#[derive(Debug)]
pub struct Tick {
    /// A canvas-sized frame to present, or `None` if nothing changed.
    pub frame: Option<RgbaImage>,
    pub next: Redraw,
}

/// Coarse lifecycle state, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Loaded(MediaKind),
    Destroyed,
}

struct GifPlayback {
    animation: GifAnimation,
    /// Unset until the first draw after a (re)load.
    start: Option<Instant>,
    last_index: Option<usize>,
}

struct VideoPlaybackState {
    player: Box<dyn VideoPlayback>,
    /// Last decoded source frame, kept to redraw after a resize.
    last_frame: Option<DynamicImage>,
}

enum Playback {
    Idle,
    Video(VideoPlaybackState),
    Gif(GifPlayback),
}

pub struct Engine {
    name: String,
    playback: Playback,
    appearance: Appearance,
    surface: Option<(u32, u32)>,
    visible: bool,
    redraw_scheduled: bool,
    needs_redraw: bool,
    destroyed: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("surface", &self.surface)
            .field("visible", &self.visible)
            .field("redraw_scheduled", &self.redraw_scheduled)
            .finish()
    }
}

impl Engine {
    pub fn new(name: impl Into<String>, appearance: Appearance) -> Self {
        Self {
            name: name.into(),
            playback: Playback::Idle,
            appearance,
            surface: None,
            visible: false,
            redraw_scheduled: false,
            needs_redraw: true,
            destroyed: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> State {
        if self.destroyed {
            return State::Destroyed;
        }

        match self.playback {
            Playback::Idle => State::Idle,
            Playback::Video(_) => State::Loaded(MediaKind::Video),
            Playback::Gif(_) => State::Loaded(MediaKind::Gif),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_visible(&self) -> bool {
        self.visible
    }

    #[cfg(test)]
    pub(crate) fn redraw_scheduled(&self) -> bool {
        self.redraw_scheduled
    }

    /// Replaces the current media with `selection`, releasing the old one
    /// first.
    ///
    /// # Errors
    ///
    /// The engine is left idle if the selection is incomplete or the media
    /// fails to decode.
    pub fn load(
        &mut self,
        selection: Option<&WallpaperSelection>,
        loader: &dyn MediaLoader,
    ) -> Result<(), LoadError> {
        if self.destroyed {
            return Err(LoadError::Destroyed);
        }

        self.release();
        self.needs_redraw = true;

        let Some(selection) = selection else {
            debug!(output = self.name, "no wallpaper selected, staying idle");
            return Err(LoadError::ConfigurationIncomplete);
        };

        let path = selection.path();
        match selection.media_kind {
            MediaKind::Gif => {
                let animation = loader.open_gif(path).map_err(LoadError::DecodeFailure)?;
                info!(
                    output = self.name,
                    path = %path.display(),
                    frames = animation.frame_count(),
                    duration = ?animation.duration(),
                    "GIF loaded"
                );
                self.playback = Playback::Gif(GifPlayback {
                    animation,
                    start: None,
                    last_index: None,
                });
            }

            MediaKind::Video => {
                let (width, height) = self.surface.unwrap_or((0, 0));
                let mut player = loader
                    .open_video(path, width, height)
                    .map_err(LoadError::DecodeFailure)?;

                if self.visible && self.surface.is_some() {
                    if let Err(why) = player.play() {
                        warn!(output = self.name, ?why, "video playback could not start");
                    }
                }

                self.playback = Playback::Video(VideoPlaybackState {
                    player,
                    last_frame: None,
                });
            }
        }

        Ok(())
    }

    /// Loads `selection` and logs why nothing will be played, if so.
    pub fn load_or_idle(&mut self, selection: Option<&WallpaperSelection>, loader: &dyn MediaLoader) {
        match self.load(selection, loader) {
            Ok(()) => (),
            Err(LoadError::ConfigurationIncomplete) => (),
            Err(LoadError::Destroyed) => debug!(output = self.name, "ignoring load after teardown"),
            Err(why) => warn!(output = self.name, "{why}"),
        }
    }

    pub fn set_appearance(&mut self, appearance: Appearance) {
        if self.appearance != appearance {
            self.appearance = appearance;
            self.needs_redraw = true;
        }
    }

    pub fn surface_created(&mut self, width: u32, height: u32) {
        self.surface = Some((width, height));
        self.needs_redraw = true;

        if let Playback::Video(ref mut video) = self.playback {
            video.player.resize(width, height);
            if self.visible {
                if let Err(why) = video.player.play() {
                    warn!(output = self.name, ?why, "video playback could not resume");
                }
            }
        }
    }

    pub fn surface_changed(&mut self, width: u32, height: u32) {
        if self.surface == Some((width, height)) {
            return;
        }

        debug!(output = self.name, width, height, "surface resized");
        self.surface = Some((width, height));
        self.needs_redraw = true;

        if let Playback::Video(ref mut video) = self.playback {
            video.player.resize(width, height);
        }
    }

    pub fn surface_destroyed(&mut self) {
        self.surface = None;

        if let Playback::Video(ref mut video) = self.playback {
            if let Err(why) = video.player.pause() {
                warn!(output = self.name, ?why, "video playback could not pause");
            }
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible || self.destroyed {
            return;
        }

        debug!(output = self.name, visible, "visibility changed");
        self.visible = visible;

        if let Playback::Video(ref mut video) = self.playback {
            let result = if visible && self.surface.is_some() {
                video.player.play()
            } else {
                video.player.pause()
            };

            if let Err(why) = result {
                warn!(output = self.name, ?why, "video playback state change failed");
            }
        }

        if visible {
            self.needs_redraw = true;
        }
    }

    /// Whether a redraw loop should be started now.
    ///
    /// Returns `true` at most once until a tick returns [`Redraw::Stop`], so a
    /// host that arms a timer on every `true` never runs two loops.
    pub fn arm_redraw(&mut self) -> bool {
        if self.redraw_scheduled || !self.can_draw() {
            return false;
        }

        self.redraw_scheduled = true;
        true
    }

    /// Clears the scheduled flag when the host could not start the loop.
    pub fn cancel_redraw(&mut self) {
        self.redraw_scheduled = false;
    }

    fn can_draw(&self) -> bool {
        !self.destroyed
            && self.visible
            && self.surface.is_some()
            && !matches!(self.playback, Playback::Idle)
    }

    /// A background-only canvas for a surface that has nothing to play.
    ///
    /// The redraw loop never runs while idle, so the host presents this once
    /// to replace whatever the surface showed before.
    #[must_use]
    pub fn idle_frame(&self) -> Option<RgbaImage> {
        if self.destroyed || !matches!(self.playback, Playback::Idle) {
            return None;
        }

        let (width, height) = self.surface?;
        Some(crate::colored::single(self.appearance.background, width, height))
    }

    /// Advances playback to `now` and renders if anything changed.
    pub fn tick(&mut self, now: Instant) -> Tick {
        let Some((width, height)) = self.surface.filter(|_| self.can_draw()) else {
            self.redraw_scheduled = false;
            return Tick {
                frame: None,
                next: Redraw::Stop,
            };
        };

        let appearance = self.appearance;
        let frame = match self.playback {
            Playback::Gif(ref mut gif) => {
                let start = *gif.start.get_or_insert(now);
                let time = frame_time(
                    now.saturating_duration_since(start),
                    gif.animation.duration(),
                );
                let index = gif.animation.frame_index_at(time);

                if self.needs_redraw || gif.last_index != Some(index) {
                    gif.last_index = Some(index);
                    gif.animation
                        .frame(index)
                        .map(|img| crate::scaler::render(img, width, height, &appearance))
                } else {
                    None
                }
            }

            Playback::Video(ref mut video) => {
                if let Some(img) = video.player.poll_frame() {
                    video.last_frame = Some(DynamicImage::ImageRgba8(img));
                    self.needs_redraw = true;
                }

                if self.needs_redraw {
                    video
                        .last_frame
                        .as_ref()
                        .map(|img| crate::scaler::render(img, width, height, &appearance))
                } else {
                    None
                }
            }

            Playback::Idle => None,
        };

        if frame.is_some() {
            self.needs_redraw = false;
        }

        Tick {
            frame,
            next: Redraw::After(FRAME_INTERVAL),
        }
    }

    /// Start time of the current GIF playback, if it has been drawn.
    #[cfg(test)]
    pub(crate) fn gif_start(&self) -> Option<Instant> {
        match self.playback {
            Playback::Gif(ref gif) => gif.start,
            _ => None,
        }
    }

    fn release(&mut self) {
        let previous = std::mem::replace(&mut self.playback, Playback::Idle);
        if !matches!(previous, Playback::Idle) {
            debug!(output = self.name, "releasing previous media");
        }
    }

    /// Releases all media. Safe to call in any state and more than once.
    pub fn destroy(&mut self) {
        self.release();
        self.surface = None;
        self.visible = false;
        self.redraw_scheduled = false;
        self.destroyed = true;
    }
}
