//! One-shot keyed handoff from the origin pass to the target pass.
//!
//! Values are stored as JSON so the whole slot can be serialized into the
//! origin response and restored on the other side.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

use crate::error::ConfigError;

/// Prefix applied to every key derived by [`transfer_key`]
pub const TRANSFER_KEY_PREFIX: &str = "ct-state-";

/// Typed key into a [`TransferSlot`]
pub struct StateKey<T> {
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    /// Use `key` verbatim. The empty key is rejected.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyTransferKey);
        }
        Ok(Self::from_raw(key))
    }

    fn from_raw(key: String) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        Self::from_raw(self.key.clone())
    }
}

impl<T> PartialEq for StateKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> fmt::Debug for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateKey").field(&self.key).finish()
    }
}

impl<T> fmt::Display for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Derive the slot key for a state transfer name (`"ct-state-" + name`).
pub fn transfer_key<T>(name: &str) -> Result<StateKey<T>, ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyTransferKey);
    }
    Ok(StateKey::from_raw(format!("{}{}", TRANSFER_KEY_PREFIX, name)))
}

type Entries = Arc<RwLock<HashMap<String, serde_json::Value>>>;

/// Request-scoped handoff map shared by everything in one rendering pass.
///
/// Clones share the same entries. One writer (origin) and one reader
/// (target) per key is the expected usage; concurrent writes to the same
/// key are last-write-wins.
#[derive(Clone, Default)]
pub struct TransferSlot {
    entries: Entries,
}

impl TransferSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the value under `key`, or `default` when absent or undecodable
    pub fn get<T: DeserializeOwned>(&self, key: &StateKey<T>, default: T) -> T {
        let raw = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries.get(key.as_str()).cloned()
        };

        match raw {
            Some(value) => match serde_json::from_value(value) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!(key = %key, error = %e, "Undecodable transfer entry");
                    default
                }
            },
            None => default,
        }
    }

    /// Store `value` under `key`, replacing any previous entry
    pub fn set<T: Serialize>(&self, key: &StateKey<T>, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => {
                let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
                entries.insert(key.as_str().to_string(), json);
            }
            Err(e) => warn!(key = %key, error = %e, "Value not transferable, skipping"),
        }
    }

    pub fn remove<T>(&self, key: &StateKey<T>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key.as_str());
    }

    pub fn has_key<T>(&self, key: &StateKey<T>) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(key.as_str())
    }

    /// Read then clear. A second `take` of the same key is a miss.
    ///
    /// An entry that does not decode as `T` is dropped and reported as a miss.
    pub fn take<T: DeserializeOwned>(&self, key: &StateKey<T>) -> Option<T> {
        let raw = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries.remove(key.as_str())
        }?;

        match serde_json::from_value(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Undecodable transfer entry dropped");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize every entry for embedding in the origin response
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_value())
    }

    /// Entries as a JSON object
    pub fn to_value(&self) -> serde_json::Value {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Restore a slot serialized by [`TransferSlot::to_json`]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: HashMap<String, serde_json::Value> = serde_json::from_str(json)?;
        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
        })
    }
}

impl fmt::Debug for TransferSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();
        f.debug_struct("TransferSlot").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_key_prefix() {
        let key: StateKey<String> = transfer_key("cat").unwrap();
        assert_eq!(key.as_str(), "ct-state-cat");
    }

    #[test]
    fn test_empty_transfer_key_rejected() {
        let result = transfer_key::<String>("");
        assert_eq!(result.unwrap_err(), ConfigError::EmptyTransferKey);
    }

    #[test]
    fn test_slot_never_sees_an_empty_key() {
        assert_eq!(StateKey::<u8>::new("").unwrap_err(), ConfigError::EmptyTransferKey);

        let slot = TransferSlot::new();
        if let Ok(key) = StateKey::<u8>::new("") {
            slot.set(&key, &1);
        }
        assert!(slot.is_empty());
    }

    #[test]
    fn test_get_returns_default_when_missing() {
        let slot = TransferSlot::new();
        let key: StateKey<Option<u32>> = StateKey::new("missing").unwrap();
        assert_eq!(slot.get(&key, None), None);

        slot.set(&key, &Some(4));
        assert_eq!(slot.get(&key, None), Some(4));
        // get does not consume
        assert!(slot.has_key(&key));
    }

    #[test]
    fn test_take_is_single_use() {
        let slot = TransferSlot::new();
        let key: StateKey<String> = transfer_key("k").unwrap();

        slot.set(&key, &"whiskers".to_string());
        assert_eq!(slot.take(&key), Some("whiskers".to_string()));
        assert_eq!(slot.take(&key), None);
        assert!(slot.is_empty());
    }

    #[test]
    fn test_undecodable_entry_is_a_miss() {
        let slot = TransferSlot::new();
        slot.set(&StateKey::<String>::new("n").unwrap(), &"not a number".to_string());

        let key: StateKey<u64> = StateKey::new("n").unwrap();
        assert_eq!(slot.get(&key, 9), 9);
        assert_eq!(slot.take(&key), None);
        assert!(!slot.has_key(&key));
    }

    #[test]
    fn test_clones_share_entries() {
        let slot = TransferSlot::new();
        let other = slot.clone();
        let key: StateKey<u8> = StateKey::new("shared").unwrap();

        other.set(&key, &1);
        assert_eq!(slot.len(), 1);
        slot.remove(&key);
        assert!(other.is_empty());
    }

    #[test]
    fn test_json_handoff() {
        let origin = TransferSlot::new();
        let key: StateKey<Vec<String>> = transfer_key("list").unwrap();
        origin.set(&key, &vec!["a".to_string(), "b".to_string()]);

        let json = origin.to_json().unwrap();
        let target = TransferSlot::from_json(&json).unwrap();

        assert_eq!(
            target.take(&key),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        // The origin slot is untouched by the target consuming its copy
        assert!(origin.has_key(&key));
    }
}
