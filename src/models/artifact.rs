use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where an uploaded artifact ended up. `local_staging_path` is only ever
/// reported for diagnostics; the staging copy itself is gone by the time a
/// caller sees this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactLocation {
    pub local_staging_path: Option<PathBuf>,
    pub remote_path: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub size_bytes: u64,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub permission: Option<String>,
    pub replication: Option<u32>,
    /// Milliseconds since the Unix epoch, as the store reports it.
    pub modified_at: Option<i64>,
}

/// A raw line of listing output. CLI listings interleave real rows with
/// summary lines such as `Found 3 items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingLine {
    Entry(ArtifactEntry),
    Summary(String),
}

impl ListingLine {
    pub fn into_entry(self) -> Option<ArtifactEntry> {
        match self {
            ListingLine::Entry(entry) => Some(entry),
            ListingLine::Summary(_) => None,
        }
    }
}
