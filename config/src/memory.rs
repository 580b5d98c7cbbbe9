// SPDX-License-Identifier: MPL-2.0

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{
    Appearance, FILE_PATH_KEY, FILE_TYPE_KEY, SettingsStore, WallpaperSelection,
    APPEARANCE_KEYS,
};

type Listener = Arc<dyn Fn(&[&str]) + Send + Sync>;

#[derive(Default)]
struct Inner {
    values: BTreeMap<String, String>,
    appearance: Appearance,
}

/// A process-local settings store.
///
/// Listeners registered with [`MemoryStore::on_change`] are called with the
/// changed keys after each write, once per write. Listeners run without any
/// lock held and may read the store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for changed keys.
    pub fn on_change(&self, listener: impl Fn(&[&str]) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Writes a single raw value, as a concurrent writer might.
    pub fn set_raw(&self, key: &str, value: &str) {
        self.lock().values.insert(key.to_owned(), value.to_owned());
        self.notify(&[key]);
    }

    /// Removes a single value.
    pub fn remove(&self, key: &str) {
        let removed = self.lock().values.remove(key).is_some();
        if removed {
            self.notify(&[key]);
        }
    }

    pub fn set_appearance(&self, appearance: Appearance) {
        self.lock().appearance = appearance;
        self.notify(&APPEARANCE_KEYS);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, keys: &[&str]) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(keys);
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryStore")
            .field("values", &inner.values)
            .field("appearance", &inner.appearance)
            .finish_non_exhaustive()
    }
}

impl SettingsStore for MemoryStore {
    type Error = Infallible;

    fn selection(&self) -> Option<WallpaperSelection> {
        let inner = self.lock();
        WallpaperSelection::from_parts(
            inner.values.get(FILE_PATH_KEY).cloned(),
            inner.values.get(FILE_TYPE_KEY).cloned(),
        )
    }

    fn publish(&self, selection: &WallpaperSelection) -> Result<(), Self::Error> {
        {
            let mut inner = self.lock();
            inner.values.insert(
                FILE_PATH_KEY.to_owned(),
                selection.file_path.to_string_lossy().into_owned(),
            );
            inner.values.insert(
                FILE_TYPE_KEY.to_owned(),
                selection.media_kind.tag().to_owned(),
            );
        }
        self.notify(&[FILE_PATH_KEY, FILE_TYPE_KEY]);
        Ok(())
    }

    fn clear(&self) -> Result<(), Self::Error> {
        {
            let mut inner = self.lock();
            inner.values.remove(FILE_PATH_KEY);
            inner.values.remove(FILE_TYPE_KEY);
        }
        self.notify(&[FILE_PATH_KEY, FILE_TYPE_KEY]);
        Ok(())
    }

    fn appearance(&self) -> Appearance {
        self.lock().appearance
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{MediaKind, ScalingMode};

    #[test]
    fn empty_store_has_no_selection() {
        let store = MemoryStore::new();
        assert_eq!(store.selection(), None);
    }

    #[test]
    fn publish_writes_both_keys_in_one_notification() {
        let store = MemoryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));

        {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            store.on_change(move |keys| {
                calls.fetch_add(1, Ordering::SeqCst);
                seen.lock()
                    .unwrap()
                    .extend(keys.iter().map(|k| (*k).to_owned()));
            });
        }

        let selection = WallpaperSelection::new("/home/user/loop.gif", MediaKind::Gif);
        store.publish(&selection).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![FILE_PATH_KEY.to_owned(), FILE_TYPE_KEY.to_owned()]
        );
        assert_eq!(store.selection(), Some(selection));
    }

    #[test]
    fn publish_overwrites_wholesale() {
        let store = MemoryStore::new();
        store
            .publish(&WallpaperSelection::new("/a.gif", MediaKind::Gif))
            .unwrap();
        store
            .publish(&WallpaperSelection::new("/b.mp4", MediaKind::Video))
            .unwrap();
        assert_eq!(
            store.selection(),
            Some(WallpaperSelection::new("/b.mp4", MediaKind::Video))
        );
    }

    #[test]
    fn listeners_can_read_the_store() {
        let store = MemoryStore::new();
        let observed = Arc::new(Mutex::new(None));
        {
            let reader = store.clone();
            let observed = Arc::clone(&observed);
            store.on_change(move |_| {
                *observed.lock().unwrap() = reader.selection();
            });
        }

        let selection = WallpaperSelection::new("/c.mkv", MediaKind::Video);
        store.publish(&selection).unwrap();
        assert_eq!(*observed.lock().unwrap(), Some(selection));
    }

    #[test]
    fn partial_writes_are_not_visible() {
        let store = MemoryStore::new();
        store.set_raw(FILE_PATH_KEY, "/a.webm");
        assert_eq!(store.selection(), None);

        store.set_raw(FILE_TYPE_KEY, "video");
        assert_eq!(
            store.selection(),
            Some(WallpaperSelection::new("/a.webm", MediaKind::Video))
        );

        store.remove(FILE_TYPE_KEY);
        assert_eq!(store.selection(), None);
    }

    #[test]
    fn clear_unsets_both_keys_in_one_notification() {
        let store = MemoryStore::new();
        store
            .publish(&WallpaperSelection::new("/a.gif", MediaKind::Gif))
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::<(Vec<String>, Option<WallpaperSelection>)>::new()));
        {
            let seen = Arc::clone(&seen);
            let reader = store.clone();
            store.on_change(move |keys| {
                let keys: Vec<String> = keys.iter().map(|k| (*k).to_owned()).collect();
                seen.lock().unwrap().push((keys, reader.selection()));
            });
        }

        store.clear().unwrap();

        assert_eq!(store.selection(), None);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(
                vec![FILE_PATH_KEY.to_owned(), FILE_TYPE_KEY.to_owned()],
                None
            )]
        );
    }

    #[test]
    fn appearance_changes_notify_appearance_keys() {
        let store = MemoryStore::new();
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        {
            let seen = Arc::clone(&seen);
            store.on_change(move |keys| {
                seen.lock()
                    .unwrap()
                    .extend(keys.iter().map(|k| (*k).to_owned()));
            });
        }

        store.set_appearance(Appearance::default().scaling_mode(ScalingMode::Stretch));
        assert_eq!(store.appearance().scaling_mode, ScalingMode::Stretch);
        assert_eq!(seen.lock().unwrap().len(), APPEARANCE_KEYS.len());
    }
}
