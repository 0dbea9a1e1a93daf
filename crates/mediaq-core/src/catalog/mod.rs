//! Upstream recording catalog: listing, deletion, merge into the local cache,
//! and the autodownload rule table.

mod autodownload;
mod http;
mod merge;

pub use autodownload::AutodownloadLevel;
pub use http::HttpCatalog;
pub use merge::{merge_listing, MergeStats};

use serde::{Deserialize, Serialize};

use crate::queue::{Quality, RecordingId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// One downloadable file of a listed recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Quality label as sent by the server (`HD`, `hq`, ...).
    pub quality: String,
    pub url: String,
}

impl FileDescriptor {
    pub fn quality(&self) -> Quality {
        Quality::parse_lenient(&self.quality)
    }
}

/// A recording as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingDescriptor {
    pub id: RecordingId,
    pub title: String,
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Credentials were rejected; not retried until they change.
    #[error("catalog rejected the credentials")]
    BadCredentials,
    /// Network or server failure; retried on the next refresh.
    #[error("catalog request failed: {0}")]
    Transient(String),
}

/// Remote catalog API. Calls block; the scheduler runs them off the tick thread.
pub trait CatalogApi: Send + Sync {
    fn list_recordings(&self, creds: &Credentials) -> Result<Vec<RecordingDescriptor>, CatalogError>;
    fn delete_recording(&self, creds: &Credentials, id: RecordingId) -> Result<(), CatalogError>;
}
