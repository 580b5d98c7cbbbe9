// SPDX-License-Identifier: MPL-2.0

mod animated;
mod cli;
mod colored;
mod draw;
mod engine;
mod picker;
mod scaler;
mod settings;
mod source_watch;
mod wallpaper;

use std::time::Duration;

use calloop::{
    RegistrationToken,
    signals::{Signal, Signals},
    timer::{TimeoutAction, Timer},
};
use clap::Parser;
use cosmic_livewall_config::{CosmicSettings, SettingsStore, WallpaperSelection};
use eyre::{WrapErr, eyre};
use sctk::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    output::{OutputHandler, OutputState},
    reexports::{
        calloop_wayland_source::WaylandSource,
        client::{
            Connection, QueueHandle,
            globals::registry_queue_init,
            protocol::{
                wl_output::{self, WlOutput},
                wl_surface,
            },
        },
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::{
        WaylandSurface,
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
    },
    shm::{Shm, ShmHandler},
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::animated::SystemLoader;
use crate::cli::{Cli, Command};
use crate::engine::Engine;
use crate::settings::SettingsWatch;
use crate::source_watch::SourceWatch;
use crate::wallpaper::{LiveWallpaper, WallpaperLayer};

/// Log filter used when `RUST_LOG` is unset. GStreamer pipeline warnings
/// forwarded by the video player are kept out of the default output.
const DEFAULT_LOG_FILTER: &str = "warn,cosmic_livewall::animated::video_player=error";

/// Coalesces the burst of events produced when the selected file is rewritten.
const SOURCE_RELOAD_DELAY: Duration = Duration::from_millis(500);

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    init_logger();

    match Cli::parse().cmd.unwrap_or(Command::Daemon) {
        Command::Daemon => run_daemon(),

        Command::Set { path } => {
            let settings = open_settings()?;
            let selection = picker::set(&settings, &path)?;
            println!("{}", picker::describe(Some(&selection)));
            Ok(())
        }

        Command::Clear => {
            let settings = open_settings()?;
            picker::clear(&settings)?;
            println!("none");
            Ok(())
        }

        Command::Show => {
            let settings = open_settings()?;
            println!("{}", picker::describe(settings.selection().as_ref()));
            Ok(())
        }

        Command::Preview { path } => {
            println!("{}", picker::preview(&path)?);
            Ok(())
        }
    }
}

fn init_logger() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::WARN.into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn open_settings() -> eyre::Result<CosmicSettings> {
    CosmicSettings::new().map_err(|why| eyre!("failed to open wallpaper settings: {why}"))
}

fn run_daemon() -> eyre::Result<()> {
    let conn = Connection::connect_to_env().wrap_err("failed to connect to wayland")?;
    let (globals, event_queue) =
        registry_queue_init::<LiveWall>(&conn).wrap_err("failed to list wayland globals")?;
    let qh = event_queue.handle();

    let mut event_loop: calloop::EventLoop<'static, LiveWall> =
        calloop::EventLoop::try_new().wrap_err("failed to create event loop")?;
    let loop_handle = event_loop.handle();

    WaylandSource::new(conn.clone(), event_queue)
        .insert(loop_handle.clone())
        .map_err(|why| eyre!("failed to watch the wayland connection: {why}"))?;

    let settings = SettingsWatch::new(open_settings()?);

    match cosmic_config::calloop::ConfigWatchSource::new(settings.store().config()) {
        Ok(source) => {
            let _res = loop_handle
                .insert_source(source, |(_config, keys), (), state| {
                    state.settings_changed(&keys);
                })
                .map_err(|err| tracing::error!(?err, "failed to insert settings watcher"));
        }
        Err(why) => tracing::error!(?why, "settings changes will not be watched"),
    }

    // Signals are blocked for the calling thread before decoder threads spawn.
    let signals = Signals::new(&[
        Signal::SIGUSR1,
        Signal::SIGUSR2,
        Signal::SIGINT,
        Signal::SIGTERM,
    ])
    .wrap_err("failed to install signal handlers")?;

    loop_handle
        .insert_source(signals, |event, (), state: &mut LiveWall| {
            match event.signal() {
                Signal::SIGUSR1 => state.set_visible(false),
                Signal::SIGUSR2 => state.set_visible(true),
                signal => {
                    tracing::info!(?signal, "shutting down");
                    state.exit = true;
                }
            }
        })
        .map_err(|why| eyre!("failed to watch signals: {why}"))?;

    let source_tx = source_watch::source_channel(&loop_handle);

    let selection = settings.selection().cloned();

    let mut state = LiveWall {
        registry_state: RegistryState::new(&globals),
        output_state: OutputState::new(&globals, &qh),
        compositor_state: CompositorState::bind(&globals, &qh)
            .wrap_err("wl_compositor is not available")?,
        shm: Shm::bind(&globals, &qh).wrap_err("wl_shm is not available")?,
        layer_state: LayerShell::bind(&globals, &qh).wrap_err("layer shell is not available")?,
        loop_handle,
        settings,
        wallpapers: Vec::new(),
        next_id: 0,
        visible: true,
        source_tx,
        source_watch: None,
        source_reload: None,
        exit: false,
    };

    state.apply_selection(selection);

    while !state.exit {
        event_loop
            .dispatch(None, &mut state)
            .wrap_err("event loop failed")?;
    }

    state.teardown();

    Ok(())
}

pub struct LiveWall {
    registry_state: RegistryState,
    output_state: OutputState,
    compositor_state: CompositorState,
    shm: Shm,
    layer_state: LayerShell,
    loop_handle: calloop::LoopHandle<'static, LiveWall>,
    settings: SettingsWatch<CosmicSettings>,
    pub wallpapers: Vec<LiveWallpaper>,
    next_id: u32,
    /// Host visibility, toggled by `SIGUSR1` / `SIGUSR2`.
    visible: bool,
    source_tx: calloop::channel::SyncSender<notify::Event>,
    pub source_watch: Option<SourceWatch>,
    source_reload: Option<RegistrationToken>,
    exit: bool,
}

impl std::fmt::Debug for LiveWall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveWall")
            .field("settings", &self.settings)
            .field("wallpapers", &self.wallpapers)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

impl LiveWall {
    fn settings_changed(&mut self, keys: &[String]) {
        let update = self.settings.changed(keys);

        if let Some(selection) = update.selection {
            self.apply_selection(selection);
        }

        if let Some(appearance) = update.appearance {
            for wallpaper in &mut self.wallpapers {
                wallpaper.set_appearance(appearance);
            }
        }
    }

    /// Switches every output to `selection`; `None` leaves them idle.
    fn apply_selection(&mut self, selection: Option<WallpaperSelection>) {
        match selection.as_ref() {
            Some(selection) => tracing::info!(
                path = %selection.path().display(),
                kind = selection.media_kind.tag(),
                "wallpaper selection changed"
            ),
            None => tracing::info!("no wallpaper selected"),
        }

        self.source_watch = selection.as_ref().and_then(|selection| {
            SourceWatch::new(selection.path(), self.source_tx.clone())
                .map_err(|why| tracing::warn!(?why, "selected file will not be watched"))
                .ok()
        });

        self.reload_media();
    }

    fn reload_media(&mut self) {
        let selection = self.settings.selection();
        for wallpaper in &mut self.wallpapers {
            wallpaper.reload(selection, &SystemLoader);
        }
    }

    /// Reloads the media once the selected file has settled.
    pub fn schedule_source_reload(&mut self) {
        if self.source_reload.is_some() {
            return;
        }

        self.source_reload = self
            .loop_handle
            .insert_source(
                Timer::from_duration(SOURCE_RELOAD_DELAY),
                |_, _, state: &mut LiveWall| {
                    state.source_reload = None;
                    state.reload_media();
                    TimeoutAction::Drop
                },
            )
            .map_err(|why| tracing::error!(?why, "failed to schedule reload"))
            .ok();
    }

    fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }

        tracing::debug!(visible, "host visibility changed");
        self.visible = visible;
        for wallpaper in &mut self.wallpapers {
            wallpaper.set_visible(visible);
        }
    }

    /// Destroys every engine before the process exits.
    fn teardown(&mut self) {
        if let Some(token) = self.source_reload.take() {
            self.loop_handle.remove(token);
        }

        self.source_watch = None;

        for mut wallpaper in self.wallpapers.drain(..) {
            wallpaper.surface_destroyed();
        }
    }
}

impl CompositorHandler for LiveWall {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
        // Redraws are driven by the engine's timer.
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &WlOutput,
    ) {
    }
}

impl OutputHandler for LiveWall {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(&mut self, _conn: &Connection, qh: &QueueHandle<Self>, wl_output: WlOutput) {
        let Some(output_info) = self.output_state.info(&wl_output) else {
            return;
        };

        if self
            .wallpapers
            .iter()
            .any(|w| w.layer.wl_output == wl_output)
        {
            return;
        }

        let id = self.next_id;
        self.next_id += 1;

        let name = output_info
            .name
            .clone()
            .unwrap_or_else(|| format!("output-{id}"));

        let surface = self.compositor_state.create_surface(qh);
        let layer = self.layer_state.create_layer_surface(
            qh,
            surface,
            Layer::Background,
            Some("wallpaper"),
            Some(&wl_output),
        );
        layer.set_anchor(Anchor::all());
        layer.set_exclusive_zone(-1);
        layer.set_keyboard_interactivity(KeyboardInteractivity::None);
        layer.set_size(0, 0);
        layer.commit();

        tracing::debug!(output = name, "creating wallpaper");

        let mut engine = Engine::new(name, self.settings.appearance());
        engine.load_or_idle(self.settings.selection(), &SystemLoader);

        self.wallpapers.push(LiveWallpaper::new(
            id,
            WallpaperLayer {
                layer,
                wl_output,
                pool: None,
                size: None,
            },
            engine,
            self.loop_handle.clone(),
        ));
    }

    fn update_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _output: WlOutput) {
        // Size changes arrive as layer surface configures.
    }

    fn output_destroyed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, output: WlOutput) {
        if let Some(position) = self
            .wallpapers
            .iter()
            .position(|w| w.layer.wl_output == output)
        {
            let mut wallpaper = self.wallpapers.remove(position);
            wallpaper.surface_destroyed();
        }
    }
}

impl LayerShellHandler for LiveWall {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, layer: &LayerSurface) {
        if let Some(position) = self.wallpapers.iter().position(|w| &w.layer.layer == layer) {
            let mut wallpaper = self.wallpapers.remove(position);
            tracing::debug!(output = wallpaper.engine.name(), "layer surface closed");
            wallpaper.surface_destroyed();
        }
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        let (width, height) = configure.new_size;
        if width == 0 || height == 0 {
            return;
        }

        if let Some(wallpaper) = self.wallpapers.iter_mut().find(|w| &w.layer.layer == layer) {
            wallpaper.configure(width, height, &self.shm, self.visible);
        }
    }
}

impl ShmHandler for LiveWall {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

delegate_compositor!(LiveWall);
delegate_output!(LiveWall);
delegate_shm!(LiveWall);
delegate_layer!(LiveWall);
delegate_registry!(LiveWall);

impl ProvidesRegistryState for LiveWall {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }
}
