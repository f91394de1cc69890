//! Applied configuration versions as reported by the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One persisted snapshot of the document. Read-only on this side.
pub struct ConfigurationVersion {
    pub id: String,
    #[serde(default)]
    pub content_hash_prefix: String,
    pub applied_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A version together with its full text (`getVersion`).
pub struct VersionDocument {
    #[serde(flatten)]
    pub version: ConfigurationVersion,
    #[serde(alias = "content")]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_document_flattens_metadata() {
        let raw = r#"{
            "id": "v7",
            "contentHashPrefix": "a1b2c3",
            "appliedTimestamp": "2024-03-05T10:20:30Z",
            "actor": "ops",
            "content": "targets: []\n"
        }"#;
        let doc: VersionDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.version.id, "v7");
        assert_eq!(doc.version.note, None);
        assert_eq!(doc.text, "targets: []\n");
        assert_eq!(
            doc.version.applied_timestamp.format("%Y-%m-%d").to_string(),
            "2024-03-05"
        );
    }
}
