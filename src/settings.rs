//! Persisted key/value settings.

use crate::error::SettingsError;

use log::debug;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Well-known setting keys.
pub mod keys {
    pub const HTTPS_PROXY: &str = "https_proxy";
    pub const VENDOR_SECRET_ID: &str = "kuaidaili_secret_id";
    pub const VENDOR_SIGNATURE: &str = "kuaidaili_signature";
    pub const VENDOR_USERNAME: &str = "kuaidaili_username";
    pub const VENDOR_PASSWORD: &str = "kuaidaili_password";
    pub const VENDOR_NUM: &str = "kuaidaili_num";
    pub const VENDOR_MAX_TIMEOUT: &str = "kuaidaili_max_timeout";
    pub const PUSHPLUS_TOKEN: &str = "pushplusToken";
    pub const SERVERCHAN_KEY: &str = "serverchanKey";
    pub const NTFY_URL: &str = "ntfyUrl";
    pub const NTFY_USERNAME: &str = "ntfyUsername";
    pub const NTFY_PASSWORD: &str = "ntfyPassword";
}

/// Synchronous key/value store.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, SettingsError>;

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError>;

    /// Read a string setting; a non-string value is an error.
    fn get_string(&self, key: &str) -> Result<Option<String>, SettingsError> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(SettingsError::InvalidType {
                key: key.to_string(),
            }),
        }
    }
}

/// In-memory settings, lost on exit.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, Value>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// Settings kept in a JSON object on disk. Every `set` rewrites the file.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
}

impl JsonFileSettings {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Map::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Loaded {} settings from {}", values.len(), path.display());
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut values = self.values.write();
        values.insert(key.to_string(), value);
        let content = serde_json::to_string_pretty(&*values)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySettings::new();
        assert_eq!(store.get_string(keys::HTTPS_PROXY).unwrap(), None);
        store.set(keys::HTTPS_PROXY, json!("a,b")).unwrap();
        assert_eq!(store.get_string(keys::HTTPS_PROXY).unwrap().as_deref(), Some("a,b"));
    }

    #[test]
    fn non_string_value_is_rejected_by_get_string() {
        let store = MemorySettings::new();
        store.set(keys::VENDOR_NUM, json!(5)).unwrap();
        assert!(matches!(
            store.get_string(keys::VENDOR_NUM),
            Err(SettingsError::InvalidType { .. })
        ));
    }

    #[test]
    fn file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = JsonFileSettings::open(&path).unwrap();
        store.set(keys::NTFY_URL, json!("https://ntfy.sh/topic")).unwrap();
        drop(store);

        let reopened = JsonFileSettings::open(&path).unwrap();
        assert_eq!(
            reopened.get_string(keys::NTFY_URL).unwrap().as_deref(),
            Some("https://ntfy.sh/topic")
        );
    }
}
