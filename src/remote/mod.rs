//! Remote photo catalog: the trait the mirror talks to and its Google Drive
//! implementation.

pub mod drive;
mod types;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use drive::{DriveClient, TokenSource};

/// Errors returned by a remote catalog. All of them are recoverable from the
/// slideshow's point of view.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("remote API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse remote response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::Parse(err.to_string())
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

/// A photo as reported by the remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteListing {
    pub id: String,
    pub name: String,
    /// Slash-joined folder names plus file name, relative to the listed folder.
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
}

impl RemoteListing {
    /// Case-insensitive substring match against name, path and description.
    /// `query` must already be lower-cased.
    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.path.to_lowercase().contains(query)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(query))
    }
}

/// A listed photo with its sanitized mirror path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub relative_path: String,
    pub created_at: DateTime<Utc>,
}

/// A folder on the remote side; settings are encoded in folder names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteContainer {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// List photos under `folder_id`, skipping sub-folders whose name matches
    /// one of `exclude_names` case-insensitively.
    async fn list_items(
        &self,
        folder_id: &str,
        recursive: bool,
        exclude_names: &[&str],
    ) -> Result<Vec<RemoteListing>, RemoteError>;

    /// Download the full content of a photo.
    async fn fetch(&self, id: &str) -> Result<Bytes, RemoteError>;

    /// Direct child folders of `parent_id`.
    async fn list_containers(&self, parent_id: &str) -> Result<Vec<RemoteContainer>, RemoteError>;

    async fn create_container(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<RemoteContainer, RemoteError>;
}

/// Normalize a remote path into a safe relative mirror path.
///
/// Backslashes count as separators; empty, `.` and `..` segments are dropped.
/// Returns `None` when nothing usable remains.
pub fn sanitize_relative_path(path: &str) -> Option<String> {
    let segments: Vec<&str> = path
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_traversal_and_normalizes_separators() {
        assert_eq!(
            sanitize_relative_path("../birds\\./herons//grey.jpg").as_deref(),
            Some("birds/herons/grey.jpg")
        );
        assert_eq!(sanitize_relative_path("/../.."), None);
        assert_eq!(sanitize_relative_path("a.jpg").as_deref(), Some("a.jpg"));
    }

    #[test]
    fn listing_matches_description() {
        let listing = RemoteListing {
            id: "1".into(),
            name: "IMG_0001.jpg".into(),
            path: "2023/IMG_0001.jpg".into(),
            created_at: Utc::now(),
            description: Some("Avocet at the estuary".into()),
        };
        assert!(listing.matches("avocet"));
        assert!(listing.matches("2023/"));
        assert!(!listing.matches("heron"));
    }
}
