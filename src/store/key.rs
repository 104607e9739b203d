//! Artifact key derivation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half of a device's model pair an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Isolation Forest used to manufacture labels
    Novelty,
    /// Random Forest used at inference time
    Classifier,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Novelty, ModelKind::Classifier];

    /// Key prefix
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Novelty => "novelty",
            ModelKind::Classifier => "classifier",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Make a device id safe as a file or blob name
///
/// ASCII letters are uppercased, `:` becomes `-`, and anything outside
/// `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_device_id(device_id: &str) -> String {
    device_id
        .trim()
        .chars()
        .map(|c| match c {
            ':' => '-',
            c if c.is_ascii_alphanumeric() => c.to_ascii_uppercase(),
            '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

/// Storage key for one artifact: `{kind}_{sanitized device id}`
pub fn artifact_key(kind: ModelKind, device_id: &str) -> String {
    format!("{}_{}", kind.as_str(), sanitize_device_id(device_id))
}

/// Split a key back into its kind and sanitized device part
pub fn parse_artifact_key(key: &str) -> Option<(ModelKind, &str)> {
    ModelKind::ALL.iter().find_map(|&kind| {
        key.strip_prefix(kind.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|rest| !rest.is_empty())
            .map(|rest| (kind, rest))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_address_key() {
        assert_eq!(
            artifact_key(ModelKind::Classifier, "AA:BB:CC:DD:EE:FF"),
            "classifier_AA-BB-CC-DD-EE-FF"
        );
        assert_eq!(
            artifact_key(ModelKind::Novelty, "AA:BB:CC:DD:EE:FF"),
            "novelty_AA-BB-CC-DD-EE-FF"
        );
    }

    #[test]
    fn test_key_is_case_insensitive() {
        assert_eq!(
            artifact_key(ModelKind::Classifier, "aa:bb:cc:dd:ee:ff"),
            artifact_key(ModelKind::Classifier, "AA:BB:CC:DD:EE:FF")
        );
    }

    #[test]
    fn test_unsafe_characters_are_escaped() {
        assert_eq!(sanitize_device_id("../etc/passwd"), ".._ETC_PASSWD");
        assert_eq!(sanitize_device_id(" dev 1:a "), "DEV_1-A");
        assert_eq!(sanitize_device_id("x\\y"), "X_Y");
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(
            parse_artifact_key("classifier_AA-BB"),
            Some((ModelKind::Classifier, "AA-BB"))
        );
        assert_eq!(parse_artifact_key("novelty_AA-BB"), Some((ModelKind::Novelty, "AA-BB")));
        assert_eq!(parse_artifact_key("classifier_"), None);
        assert_eq!(parse_artifact_key("other_AA"), None);
    }
}
