use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

pub const KEY_BEST_SCORE: &str = "bestScore";
pub const KEY_BACKGROUND_STYLE: &str = "backgroundStyle";
pub const KEY_SPEED_UNLOCKED: &str = "speedUnlocked";
pub const KEY_SHOW_FPS: &str = "showFps";

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Serialize(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "storage I/O error: {e}"),
            Self::Serialize(e) => write!(f, "storage serialize error: {e}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// String key/value persistence, shaped like browser localStorage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Volatile store for tests and for running without a writable disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// All keys in one JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open `path`. A missing or corrupt file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable preferences file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(&self.values)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// Selected background theme, stored as a `[style, variant]` JSON tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundStyle {
    pub style: String,
    pub variant: u32,
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        Self {
            style: "sky".to_string(),
            variant: 0,
        }
    }
}

/// Local player preferences. Read once at startup, written on change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preferences {
    pub best_score: u32,
    pub background_style: BackgroundStyle,
    pub speed_unlocked: bool,
    pub show_fps: bool,
}

fn read_value<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, error = %e, "Unreadable preference, using default");
            None
        },
    }
}

fn write_value<T: Serialize + ?Sized>(
    store: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let text = serde_json::to_string(value).map_err(|e| StorageError::Serialize(e.to_string()))?;
    store.set(key, &text)
}

impl Preferences {
    /// Read every key, falling back to the default for anything missing or unreadable.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        let background_style = read_value::<(String, u32)>(store, KEY_BACKGROUND_STYLE)
            .map(|(style, variant)| BackgroundStyle { style, variant })
            .unwrap_or(defaults.background_style);
        Self {
            best_score: read_value(store, KEY_BEST_SCORE).unwrap_or(defaults.best_score),
            background_style,
            speed_unlocked: read_value(store, KEY_SPEED_UNLOCKED)
                .unwrap_or(defaults.speed_unlocked),
            show_fps: read_value(store, KEY_SHOW_FPS).unwrap_or(defaults.show_fps),
        }
    }

    pub fn set_best_score(
        &mut self,
        store: &mut dyn KeyValueStore,
        score: u32,
    ) -> Result<(), StorageError> {
        self.best_score = score;
        write_value(store, KEY_BEST_SCORE, &score)
    }

    pub fn set_background_style(
        &mut self,
        store: &mut dyn KeyValueStore,
        style: BackgroundStyle,
    ) -> Result<(), StorageError> {
        write_value(
            store,
            KEY_BACKGROUND_STYLE,
            &(style.style.as_str(), style.variant),
        )?;
        self.background_style = style;
        Ok(())
    }

    pub fn set_speed_unlocked(
        &mut self,
        store: &mut dyn KeyValueStore,
        unlocked: bool,
    ) -> Result<(), StorageError> {
        self.speed_unlocked = unlocked;
        write_value(store, KEY_SPEED_UNLOCKED, &unlocked)
    }

    pub fn set_show_fps(
        &mut self,
        store: &mut dyn KeyValueStore,
        show: bool,
    ) -> Result<(), StorageError> {
        self.show_fps = show;
        write_value(store, KEY_SHOW_FPS, &show)
    }
}
