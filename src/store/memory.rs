//! In-process model store

use super::ModelStore;
use crate::error::{IdsError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Map-backed store; cloning the bytes on `get` keeps readers off the lock
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}

impl ModelStore for MemoryModelStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.artifacts.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.artifacts
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| IdsError::ArtifactNotFound { key: key.to_string() })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.artifacts.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.artifacts.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
