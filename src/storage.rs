//! Key/value storage carrying state between pages.
//!
//! Session storage holds the search criteria and the selected flight, durable
//! storage keeps partially filled passenger forms. Values are JSON strings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::domain::FTError;

pub const FLIGHT_SEARCH: &str = "flightSearch";
pub const SELECTED_FLIGHT: &str = "selectedFlight";
pub const PASSENGER_FORM_DATA: &str = "passengerFormData";

pub trait Storage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: String) -> Result<(), FTError>;

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, FTError>
    where
        Self: Sized,
    {
        match self.get_item(key) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), FTError>
    where
        Self: Sized,
    {
        self.set_item(key, serde_json::to_string(value)?)
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

#[cfg(test)]
impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), FTError> {
        self.items.insert(key.to_string(), value);
        Ok(())
    }
}

/// Storage backed by a JSON object on disk, written through on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStorage {
    pub fn open(path: &Path) -> Result<Self, FTError> {
        let items = match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => match serde_json::from_str(&content) {
                Ok(items) => items,
                Err(e) => {
                    warn!("Ignoring unreadable storage {}: {e}", path.display());
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened storage {} with {} keys", path.display(), items.len());
        Ok(Self {
            path: path.to_path_buf(),
            items,
        })
    }

    /// Session scoped storage lives in the temp dir and is gone after a reboot.
    pub fn session() -> Result<Self, FTError> {
        Self::open(&std::env::temp_dir().join("ft-session.json"))
    }

    pub fn durable(storage_dir: &Path) -> Result<Self, FTError> {
        Self::open(&storage_dir.join("local_storage.json"))
    }

    fn flush(&self) -> Result<(), FTError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.items)?)?;
        trace!("Flushed {} keys to {}", self.items.len(), self.path.display());
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), FTError> {
        self.items.insert(key.to_string(), value);
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Criteria {
        origin: String,
        passengers: u32,
    }

    #[test]
    fn json_values_round_trip_through_memory() {
        let mut storage = MemoryStorage::default();
        let criteria = Criteria {
            origin: "JFK".into(),
            passengers: 2,
        };
        storage.set_json(FLIGHT_SEARCH, &criteria).unwrap();
        assert_eq!(storage.get_json::<Criteria>(FLIGHT_SEARCH).unwrap(), Some(criteria));
        assert_eq!(storage.get_json::<Criteria>(SELECTED_FLIGHT).unwrap(), None);
    }

    #[test]
    fn file_storage_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::durable(dir.path()).unwrap();
        storage
            .set_item(PASSENGER_FORM_DATA, r#"{"firstName":"Ada"}"#.into())
            .unwrap();

        let reopened = FileStorage::durable(dir.path()).unwrap();
        assert_eq!(
            reopened.get_item(PASSENGER_FORM_DATA).as_deref(),
            Some(r#"{"firstName":"Ada"}"#)
        );
    }

    #[test]
    fn overwritten_keys_keep_the_last_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut storage = FileStorage::open(&path).unwrap();
        storage.set_item(SELECTED_FLIGHT, r#"{"id":"AA1"}"#.into()).unwrap();
        storage.set_item(SELECTED_FLIGHT, r#"{"id":"AA2"}"#.into()).unwrap();
        assert_eq!(
            FileStorage::open(&path).unwrap().get_item(SELECTED_FLIGHT).as_deref(),
            Some(r#"{"id":"AA2"}"#)
        );
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "not json").unwrap();
        let storage = FileStorage::open(&path).unwrap();
        assert!(storage.get_item(FLIGHT_SEARCH).is_none());
    }

    #[test]
    fn malformed_value_is_an_error() {
        let mut storage = MemoryStorage::default();
        storage.set_item(FLIGHT_SEARCH, "{".into()).unwrap();
        assert!(storage.get_json::<Criteria>(FLIGHT_SEARCH).is_err());
    }
}
