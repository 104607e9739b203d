//! Model artifact storage
//!
//! Each device owns exactly two artifacts, `novelty_<id>` and
//! `classifier_<id>`, where `<id>` is the sanitized device id (see
//! [`artifact_key`]). Re-training overwrites both; there is no history.

mod file;
mod key;
mod memory;

pub use file::FileModelStore;
pub use key::{artifact_key, parse_artifact_key, sanitize_device_id, ModelKind};
pub use memory::MemoryModelStore;

use crate::error::{IdsError, Result};
use crate::labeling::NoveltyModel;
use crate::training::DeviceClassifier;
use chrono::{NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Bumped whenever the serialized model layout changes
pub const FORMAT_VERSION: u32 = 1;

/// Envelope persisted around every model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<M> {
    pub format_version: u32,
    pub kind: ModelKind,
    pub device_id: String,
    pub trained_at: NaiveDateTime,
    pub model: M,
}

fn encode<M: Serialize>(kind: ModelKind, device_id: &str, model: &M) -> Result<Vec<u8>> {
    let artifact = Artifact {
        format_version: FORMAT_VERSION,
        kind,
        device_id: device_id.to_string(),
        trained_at: Utc::now().naive_utc(),
        model,
    };
    Ok(bincode::serialize(&artifact)?)
}

fn decode<M: DeserializeOwned>(kind: ModelKind, key: &str, bytes: &[u8]) -> Result<Artifact<M>> {
    let artifact: Artifact<M> = bincode::deserialize(bytes)?;
    if artifact.format_version != FORMAT_VERSION {
        return Err(IdsError::SerializationError(format!(
            "{} has format version {}, expected {}",
            key, artifact.format_version, FORMAT_VERSION
        )));
    }
    if artifact.kind != kind {
        return Err(IdsError::SerializationError(format!(
            "{} holds a {} model, expected {}",
            key, artifact.kind, kind
        )));
    }
    if artifact_key(kind, &artifact.device_id) != key {
        return Err(IdsError::SerializationError(format!(
            "{} holds the model of device {}",
            key, artifact.device_id
        )));
    }
    Ok(artifact)
}

/// Key-value blob storage for per-device model pairs
///
/// `put` must be atomic with respect to a concurrent `get` of the same key.
pub trait ModelStore: Send + Sync {
    /// Store bytes under `key`, replacing any previous value
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Bytes under `key`, or [`IdsError::ArtifactNotFound`]
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Every stored key
    fn keys(&self) -> Result<Vec<String>>;

    /// Delete `key`; deleting an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    fn save_novelty(&self, model: &NoveltyModel) -> Result<String> {
        let key = artifact_key(ModelKind::Novelty, &model.device_id);
        self.put(&key, &encode(ModelKind::Novelty, &model.device_id, model)?)?;
        Ok(key)
    }

    fn save_classifier(&self, model: &DeviceClassifier) -> Result<String> {
        let key = artifact_key(ModelKind::Classifier, &model.device_id);
        self.put(&key, &encode(ModelKind::Classifier, &model.device_id, model)?)?;
        Ok(key)
    }

    /// Persist a device's detector and classifier together
    ///
    /// Both models are encoded before anything is written, and the
    /// classifier is written last. If a write fails, both keys are removed
    /// so the store never holds a detector next to a classifier from
    /// another run.
    fn save_pair(
        &self,
        novelty: &NoveltyModel,
        classifier: &DeviceClassifier,
    ) -> Result<(String, String)> {
        let novelty_key = artifact_key(ModelKind::Novelty, &novelty.device_id);
        let classifier_key = artifact_key(ModelKind::Classifier, &classifier.device_id);
        if sanitize_device_id(&novelty.device_id) != sanitize_device_id(&classifier.device_id) {
            return Err(IdsError::ValidationError(format!(
                "Detector for {} paired with classifier for {}",
                novelty.device_id, classifier.device_id
            )));
        }

        let novelty_bytes = encode(ModelKind::Novelty, &novelty.device_id, novelty)?;
        let classifier_bytes = encode(ModelKind::Classifier, &classifier.device_id, classifier)?;

        let written = self
            .put(&novelty_key, &novelty_bytes)
            .and_then(|_| self.put(&classifier_key, &classifier_bytes));

        if let Err(e) = written {
            for key in [&novelty_key, &classifier_key] {
                if let Err(cleanup) = self.remove(key) {
                    tracing::warn!(key = %key, error = %cleanup, "Failed to remove partial artifact");
                }
            }
            return Err(e);
        }
        Ok((novelty_key, classifier_key))
    }

    fn load_novelty(&self, device_id: &str) -> Result<Artifact<NoveltyModel>> {
        let key = artifact_key(ModelKind::Novelty, device_id);
        decode(ModelKind::Novelty, &key, &self.get(&key)?)
    }

    fn load_classifier(&self, device_id: &str) -> Result<Artifact<DeviceClassifier>> {
        let key = artifact_key(ModelKind::Classifier, device_id);
        decode(ModelKind::Classifier, &key, &self.get(&key)?)
    }

    /// Sanitized ids of devices that have a classifier, sorted
    fn list_devices(&self) -> Result<Vec<String>> {
        let mut devices: Vec<String> = self
            .keys()?
            .iter()
            .filter_map(|k| match parse_artifact_key(k) {
                Some((ModelKind::Classifier, device)) => Some(device.to_string()),
                _ => None,
            })
            .collect();
        devices.sort();
        devices.dedup();
        Ok(devices)
    }
}
