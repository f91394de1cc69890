//! Read-only view over previously applied versions.
//!
//! The server returns versions in no particular order. Callers always get
//! them newest first; the first entry is the current one.

use crate::backend::{Backend, BackendError};
use crate::models::ConfigurationVersion;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Stable sort, newest `applied_timestamp` first.
pub fn sort_versions(mut versions: Vec<ConfigurationVersion>) -> Vec<ConfigurationVersion> {
    versions.sort_by(|a, b| b.applied_timestamp.cmp(&a.applied_timestamp));
    versions
}

/// Whether the entry at `index` of a sorted list is the current version.
pub fn is_current(index: usize) -> bool {
    index == 0
}

/// File name used when saving a version locally.
///
/// A non-blank override is used verbatim; otherwise
/// `targets-<YYYY-MM-DD>-<id>.yml` from the apply date.
pub fn download_file_name(
    id: &str,
    applied_timestamp: &DateTime<Utc>,
    override_name: Option<&str>,
) -> String {
    match override_name.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => name.to_string(),
        None => format!(
            "targets-{}-{}.yml",
            applied_timestamp.format("%Y-%m-%d"),
            id
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub file_name: String,
    pub text: String,
}

pub struct VersionHistory<'a, B> {
    backend: &'a B,
}

impl<'a, B: Backend> VersionHistory<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    pub async fn list(&self) -> Result<Vec<ConfigurationVersion>, BackendError> {
        let versions = self.backend.list_versions().await?;
        debug!(count = versions.len(), "fetched versions");
        Ok(sort_versions(versions))
    }

    pub async fn download(
        &self,
        id: &str,
        override_name: Option<&str>,
    ) -> Result<Download, BackendError> {
        let doc = self.backend.get_version(id).await?;
        Ok(Download {
            file_name: download_file_name(
                &doc.version.id,
                &doc.version.applied_timestamp,
                override_name,
            ),
            text: doc.text,
        })
    }
}
