// SPDX-License-Identifier: MPL-2.0

//! Turns settings notifications into wallpaper updates.

use cosmic_livewall_config::{
    APPEARANCE_KEYS, Appearance, SELECTION_KEYS, SettingsStore, WallpaperSelection,
};

/// What the daemon has to apply after a notification.
#[derive(Debug, Default, PartialEq)]
pub struct Update {
    /// The new selection; `Some(None)` when it was cleared.
    pub selection: Option<Option<WallpaperSelection>>,
    pub appearance: Option<Appearance>,
}

/// The settings currently shown, read through any [`SettingsStore`].
///
/// Notifications that do not change what is shown produce an empty
/// [`Update`], so a store reporting the two selection keys separately does
/// not reload the media twice.
#[derive(Debug)]
pub struct SettingsWatch<S> {
    store: S,
    selection: Option<WallpaperSelection>,
    appearance: Appearance,
}

impl<S: SettingsStore> SettingsWatch<S> {
    pub fn new(store: S) -> Self {
        Self {
            selection: store.selection(),
            appearance: store.appearance(),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn selection(&self) -> Option<&WallpaperSelection> {
        self.selection.as_ref()
    }

    pub fn appearance(&self) -> Appearance {
        self.appearance
    }

    /// Re-reads the groups `keys` belong to.
    pub fn changed<K: AsRef<str>>(&mut self, keys: &[K]) -> Update {
        let touches = |group: &[&str]| {
            keys.iter()
                .any(|key| group.contains(&AsRef::<str>::as_ref(key)))
        };
        let mut update = Update::default();

        if touches(&SELECTION_KEYS) {
            let selection = self.store.selection();
            if selection == self.selection {
                tracing::debug!("selection unchanged");
            } else {
                self.selection.clone_from(&selection);
                update.selection = Some(selection);
            }
        }

        if touches(&APPEARANCE_KEYS) {
            let appearance = self.store.appearance();
            if appearance != self.appearance {
                self.appearance = appearance;
                update.appearance = Some(appearance);
            }
        }

        update
    }
}
