//! Fingerprint manifest: the record of what has already been indexed.
//!
//! Maps a stable file identity key to the content hash, modification time,
//! and derived record ids seen at the last sync. The manifest — not the
//! record store — is the source of truth for change detection; the record
//! store can be rebuilt or migrated independently.
//!
//! Persisted as a single versioned JSON document. Anything unreadable
//! (missing file, blank content, parse failure, version mismatch) loads as
//! an empty manifest, which simply forces a full re-index on the next sync.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const MANIFEST_VERSION: u32 = 1;

/// Fingerprint of one indexed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Display path within the source tree.
    pub path: String,
    /// SHA-256 of the raw file bytes, lowercase hex. The authoritative
    /// change signal.
    pub sha256: String,
    /// Last-modified time in epoch milliseconds. Advisory only.
    pub mtime: i64,
    /// Record ids derived from this file. Every id listed must currently
    /// exist in the record store; entries are removed together with their
    /// records.
    pub document_ids: Vec<i64>,
}

/// Versioned key → fingerprint mapping.
///
/// `BTreeMap` keeps serialization deterministic: a sync that changes nothing
/// leaves the persisted document byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load the manifest from `path`. Never fails: corruption or version
    /// mismatch degrades to an empty manifest.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::new(),
        };
        if content.trim().is_empty() {
            return Self::new();
        }
        match serde_json::from_str::<Manifest>(&content) {
            Ok(manifest) if manifest.version == MANIFEST_VERSION => manifest,
            _ => Self::new(),
        }
    }

    /// Atomically overwrite the persisted document: write a sibling temp
    /// file, then rename over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}
