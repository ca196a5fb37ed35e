//! In-memory adapter for [`DocumentTree`].
//!
//! Models a platform-mediated folder grant (an abstract document-tree
//! handle): files are addressed by a relative path, and identity keys are
//! `<tree-id>://<relative-path>` composites, because two different grants
//! can alias the same relative path. Also serves as the sync engine's test
//! double.

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use crate::source::{DocumentTree, TreeFile};

struct MemFile {
    bytes: Vec<u8>,
    modified_ms: i64,
}

/// A tree handle backed by an in-memory map of relative path → bytes.
pub struct MemTree {
    id: String,
    files: BTreeMap<String, MemFile>,
}

impl MemTree {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            files: BTreeMap::new(),
        }
    }

    /// Add or replace a file.
    pub fn put(&mut self, relative_path: &str, bytes: impl Into<Vec<u8>>, modified_ms: i64) {
        self.files.insert(
            relative_path.to_string(),
            MemFile {
                bytes: bytes.into(),
                modified_ms,
            },
        );
    }

    pub fn remove(&mut self, relative_path: &str) {
        self.files.remove(relative_path);
    }

    /// Update the modification time without touching content.
    pub fn touch(&mut self, relative_path: &str, modified_ms: i64) {
        if let Some(file) = self.files.get_mut(relative_path) {
            file.modified_ms = modified_ms;
        }
    }

    fn key_for(&self, relative_path: &str) -> String {
        format!("{}://{}", self.id, relative_path)
    }
}

impl DocumentTree for MemTree {
    fn label(&self) -> &str {
        &self.id
    }

    fn enumerate(&self) -> Result<Vec<TreeFile>> {
        Ok(self
            .files
            .iter()
            .map(|(relative_path, file)| TreeFile {
                key: self.key_for(relative_path),
                path: relative_path.clone(),
                name: relative_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(relative_path)
                    .to_string(),
                modified_ms: file.modified_ms,
            })
            .collect())
    }

    fn open(&self, file: &TreeFile) -> Result<Box<dyn Read + '_>> {
        let prefix = format!("{}://", self.id);
        let relative_path = match file.key.strip_prefix(&prefix) {
            Some(p) => p,
            None => bail!("key {} does not belong to tree {}", file.key, self.id),
        };
        match self.files.get(relative_path) {
            Some(mem_file) => Ok(Box::new(Cursor::new(mem_file.bytes.as_slice()))),
            None => bail!("no such file in tree {}: {}", self.id, relative_path),
        }
    }
}
