// src/storage.rs
//! Durable key-value slots
//!
//! Each piece of persisted state (chat, auth, theme) lives in its own named slot.
//! `FileStorage` keeps one JSON file per slot under the user's data directory;
//! `MemoryStorage` keeps everything in-process for tests.

use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ChatError, Result};

pub const CHAT_SLOT: &str = "chat-storage";
pub const AUTH_SLOT: &str = "auth-storage";
pub const THEME_SLOT: &str = "theme-storage";

/// A persistence medium addressed by slot name
pub trait Storage: Send + Sync {
    /// Read a slot; `None` if nothing has been stored yet
    fn load(&self, slot: &str) -> Result<Option<String>>;

    fn save(&self, slot: &str, value: &str) -> Result<()>;

    /// Remove a slot. Removing a missing slot is not an error.
    fn remove(&self, slot: &str) -> Result<()>;
}

/// Get the default data directory, creating it if needed
pub fn default_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ChatError::Storage("Could not determine data directory".to_string()))?
        .join("palaver");

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

/// One `<slot>.json` file per slot inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        info!("Using storage directory {}", dir.display());
        Ok(FileStorage { dir })
    }

    /// Storage rooted at the default data directory
    pub fn new_default() -> Result<Self> {
        Self::new(default_data_dir()?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }
}

impl Storage for FileStorage {
    fn load(&self, slot: &str) -> Result<Option<String>> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        debug!("Loaded {} bytes from {}", contents.len(), path.display());
        Ok(Some(contents))
    }

    fn save(&self, slot: &str, value: &str) -> Result<()> {
        let path = self.slot_path(slot);
        // Write next to the target and rename so a crash never leaves half a file
        let tmp = self.dir.join(format!("{}.json.tmp", slot));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!("Saved {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<()> {
        let path = self.slot_path(slot);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Removed {}", path.display());
        }
        Ok(())
    }
}

/// In-process storage, mostly for tests
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn load(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.slots().get(slot).cloned())
    }

    fn save(&self, slot: &str, value: &str) -> Result<()> {
        self.slots().insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<()> {
        self.slots().remove(slot);
        Ok(())
    }
}
