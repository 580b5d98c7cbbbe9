// SPDX-License-Identifier: MPL-2.0

use crate::LiveWall;
use crate::animated::MediaLoader;
use crate::engine::{Engine, Redraw};

use std::time::Instant;

use cosmic_livewall_config::{Appearance, WallpaperSelection};
use image::RgbaImage;
use sctk::{
    reexports::{
        calloop::{
            self, RegistrationToken,
            timer::{TimeoutAction, Timer},
        },
        client::protocol::wl_output::WlOutput,
    },
    shell::wlr_layer::LayerSurface,
    shm::{Shm, slot::SlotPool},
};

/// The background layer surface of one output.
#[derive(Debug)]
pub struct WallpaperLayer {
    pub layer: LayerSurface,
    pub wl_output: WlOutput,
    pub pool: Option<SlotPool>,
    pub size: Option<(u32, u32)>,
}

/// A live wallpaper shown on one output.
///
/// Owns the output's render engine and the timer that drives its redraws.
#[derive(Debug)]
pub struct LiveWallpaper {
    pub id: u32,
    pub layer: WallpaperLayer,
    pub engine: Engine,
    loop_handle: calloop::LoopHandle<'static, LiveWall>,
    timer_token: Option<RegistrationToken>,
}

impl Drop for LiveWallpaper {
    fn drop(&mut self) {
        if let Some(token) = self.timer_token.take() {
            self.loop_handle.remove(token);
        }
        self.engine.destroy();
    }
}

impl LiveWallpaper {
    pub fn new(
        id: u32,
        layer: WallpaperLayer,
        engine: Engine,
        loop_handle: calloop::LoopHandle<'static, LiveWall>,
    ) -> Self {
        Self {
            id,
            layer,
            engine,
            loop_handle,
            timer_token: None,
        }
    }

    /// Applies a compositor configure event to the surface.
    ///
    /// The first configure creates the surface and shows it unless the host
    /// has hidden the wallpapers.
    pub fn configure(&mut self, width: u32, height: u32, shm: &Shm, visible: bool) {
        let len = width as usize * height as usize * 4;

        if let Some(pool) = self.layer.pool.as_mut() {
            if let Err(why) = pool.resize(len) {
                tracing::error!(?why, "failed to resize the pool");
                return;
            }
        } else {
            match SlotPool::new(len, shm) {
                Ok(pool) => self.layer.pool = Some(pool),
                Err(why) => {
                    tracing::error!(?why, "failed to create pool");
                    return;
                }
            }
        }

        match self.layer.size.replace((width, height)) {
            None => {
                self.engine.surface_created(width, height);
                self.engine.set_visible(visible);
            }
            Some(_) => self.engine.surface_changed(width, height),
        }

        self.present_idle();
        self.schedule();
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.engine.set_visible(visible);
        self.schedule();
    }

    pub fn reload(&mut self, selection: Option<&WallpaperSelection>, loader: &dyn MediaLoader) {
        self.engine.load_or_idle(selection, loader);
        self.present_idle();
        self.schedule();
    }

    pub fn set_appearance(&mut self, appearance: Appearance) {
        self.engine.set_appearance(appearance);
        self.present_idle();
        self.schedule();
    }

    /// Tears the surface down, leaving the engine destroyed.
    pub fn surface_destroyed(&mut self) {
        self.engine.surface_destroyed();
        self.engine.destroy();
        self.layer.size = None;
    }

    /// Starts the redraw loop if the engine asks for one.
    fn schedule(&mut self) {
        if !self.engine.arm_redraw() {
            return;
        }

        let id = self.id;
        self.timer_token = self
            .loop_handle
            .insert_source(Timer::immediate(), move |_, _, state: &mut LiveWall| {
                let span = tracing::trace_span!("LiveWallpaper::timer", id);
                let _handle = span.enter();

                let Some(wallpaper) = state.wallpapers.iter_mut().find(|w| w.id == id) else {
                    return TimeoutAction::Drop; // Drop if the output is gone
                };

                wallpaper.on_timer()
            })
            .map_err(|why| tracing::error!(?why, "failed to register redraw timer"))
            .ok();

        if self.timer_token.is_none() {
            self.engine.cancel_redraw();
        }
    }

    fn on_timer(&mut self) -> TimeoutAction {
        let tick = self.engine.tick(Instant::now());

        if let Some(frame) = tick.frame {
            self.present(&frame);
        }

        match tick.next {
            Redraw::After(delay) => TimeoutAction::ToDuration(delay),
            Redraw::Stop => {
                self.timer_token = None;
                TimeoutAction::Drop
            }
        }
    }

    /// Paints the background over a surface left without media.
    fn present_idle(&mut self) {
        if let Some(frame) = self.engine.idle_frame() {
            self.present(&frame);
        }
    }

    fn present(&mut self, frame: &RgbaImage) {
        let start = Instant::now();

        let Some(pool) = self.layer.pool.as_mut() else {
            return;
        };

        match crate::draw::canvas(pool, frame) {
            Ok(buffer) => {
                let (width, height) = frame.dimensions();
                crate::draw::layer_surface(&self.layer, &buffer, (width as i32, height as i32));

                tracing::trace!(
                    elapsed = ?start.elapsed(),
                    output = self.engine.name(),
                    "wallpaper draw"
                );
            }

            Err(why) => {
                tracing::error!(?why, "wallpaper could not be drawn");
            }
        }
    }
}
