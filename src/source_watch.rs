// SPDX-License-Identifier: MPL-2.0

//! Reloads the wallpaper when the selected file is replaced on disk.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sctk::reexports::calloop::{LoopHandle, channel};

use crate::LiveWall;

/// Forwards filesystem events into the event loop.
pub fn source_channel(handle: &LoopHandle<'static, LiveWall>) -> channel::SyncSender<notify::Event> {
    let (notify_tx, notify_rx) = channel::sync_channel(20);
    let _res = handle
        .insert_source(notify_rx, |e: channel::Event<notify::Event>, _, state| match e {
            channel::Event::Msg(event) => {
                let Some(watch) = state.source_watch.as_ref() else {
                    return;
                };

                if replaces(&event, watch.path()) {
                    tracing::debug!(path = %watch.path().display(), "selected file changed");
                    state.schedule_source_reload();
                }
            }
            channel::Event::Closed => {
                tracing::debug!("source watch channel closed");
            }
        })
        .map_err(|err| tracing::error!(%err, "failed to watch wallpaper sources"));

    notify_tx
}

/// Whether `event` means the contents of `path` may have changed.
pub fn replaces(event: &notify::Event, path: &Path) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
    );

    relevant && event.paths.iter().any(|p| p == path)
}

/// A watch on the directory holding the selected file.
///
/// The directory is watched so that a file replaced by a rename is noticed.
#[derive(Debug)]
pub struct SourceWatch {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl SourceWatch {
    pub fn new(path: &Path, tx: channel::SyncSender<notify::Event>) -> notify::Result<Self> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if let Ok(e) = res {
                    let _ = tx.send(e);
                }
            },
            notify::Config::default(),
        )?;

        let dir = path.parent().unwrap_or(path);
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %path.display(), "watching selected file");

        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
