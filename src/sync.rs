//! Sync/diff engine.
//!
//! Reconciles a document tree against the fingerprint manifest: removed
//! files lose their records, new and changed files are re-extracted,
//! chunked, embedded, and written to the store and the in-memory index,
//! and the manifest is persisted once at the end. Content hashes are the
//! authoritative change signal — a touched modification time alone never
//! triggers re-indexing — so running a sync twice over an unchanged tree
//! is a no-op with a byte-identical manifest.

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Read;
use std::path::PathBuf;
use std::sync::OnceLock;
use tokio::sync::Mutex;

use crate::chunk::chunk_text;
use crate::config::{default_extensions, Config};
use crate::db;
use crate::embedding::HashEmbedder;
use crate::extract;
use crate::index::VectorIndex;
use crate::manifest::{Manifest, ManifestEntry};
use crate::models::{NewDocument, SyncReport};
use crate::source::{extension_of, DocumentTree, TreeFile};
use crate::source_fs::FsTree;
use crate::store::{DocumentStore, SqliteStore};

/// Read buffer size for streamed content hashing.
const HASH_BLOCK_BYTES: usize = 8192;

// Single-writer discipline: one in-flight sync at a time per process.
// Lazily initialized so the lock exists before any sync can start.
static SYNC_GUARD: OnceLock<Mutex<()>> = OnceLock::new();

/// Orchestrates the scan → diff → extract → chunk → embed → persist flow.
///
/// The engine owns the mutation sequence for both the manifest and the
/// vector index; no other component writes to either.
pub struct SyncEngine<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    index: &'a VectorIndex,
    embedder: &'a HashEmbedder,
    manifest_path: PathBuf,
    max_chars: usize,
}

impl<'a, S: DocumentStore + ?Sized> SyncEngine<'a, S> {
    pub fn new(
        store: &'a S,
        index: &'a VectorIndex,
        embedder: &'a HashEmbedder,
        manifest_path: impl Into<PathBuf>,
        max_chars: usize,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            manifest_path: manifest_path.into(),
            max_chars,
        }
    }

    /// Run one sync pass over `tree`.
    ///
    /// `full` discards the manifest (removing every tracked record) before
    /// scanning, forcing a re-index of the whole tree.
    ///
    /// Per-file read or extraction failures skip that file and continue;
    /// enumeration and store failures abort the pass with the manifest left
    /// as it was.
    pub async fn sync(
        &self,
        tree: &dyn DocumentTree,
        allowed_extensions: &HashSet<String>,
        full: bool,
    ) -> Result<SyncReport> {
        let guard = SYNC_GUARD.get_or_init(|| Mutex::new(()));
        let _lock = guard.lock().await;

        let mut manifest = Manifest::load(&self.manifest_path);
        let mut report = SyncReport::default();

        if full {
            let entries = std::mem::take(&mut manifest.entries);
            for (_, entry) in entries {
                self.remove_records(&entry.document_ids, &mut report).await?;
                report.files_removed += 1;
            }
        }

        let files: Vec<TreeFile> = tree
            .enumerate()?
            .into_iter()
            .filter(|f| matches_extension(&f.name, allowed_extensions))
            .collect();

        // Keys present only in the manifest are deletions.
        let scanned: HashSet<&str> = files.iter().map(|f| f.key.as_str()).collect();
        let stale: Vec<String> = manifest
            .entries
            .keys()
            .filter(|key| !scanned.contains(key.as_str()))
            .cloned()
            .collect();
        for key in stale {
            if let Some(entry) = manifest.entries.remove(&key) {
                self.remove_records(&entry.document_ids, &mut report).await?;
                report.files_removed += 1;
            }
        }

        for file in &files {
            let bytes = match read_file(tree, file) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("Warning: could not read {}: {}", file.path, e);
                    continue;
                }
            };
            let digest = hash_reader(bytes.as_slice())?;

            let previous = manifest.entries.get(&file.key);
            if let Some(prev) = previous {
                if prev.sha256 == digest {
                    // Unchanged: no extraction, no re-embedding.
                    continue;
                }
            }
            let is_update = previous.is_some();

            let ext = match extension_of(&file.name) {
                Some(e) => e,
                None => continue,
            };
            let text = match extract::extract_text(&bytes, &ext) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Warning: extraction failed for {}: {}", file.path, e);
                    continue;
                }
            };
            let chunks = chunk_text(&text, self.max_chars);
            if chunks.is_empty() {
                // Blank document: skipped, no manifest entry.
                continue;
            }

            // Old records go first so stale chunks from a shrunk document
            // cannot linger next to the new set.
            if let Some(prev) = manifest.entries.get(&file.key) {
                let old_ids = prev.document_ids.clone();
                self.remove_records(&old_ids, &mut report).await?;
            }

            let ids = self.insert_chunks(&file.name, chunks, &mut report).await?;

            if is_update {
                report.files_updated += 1;
            } else {
                report.files_added += 1;
            }

            manifest.entries.insert(
                file.key.clone(),
                ManifestEntry {
                    path: file.path.clone(),
                    sha256: digest,
                    mtime: file.modified_ms,
                    document_ids: ids,
                },
            );
        }

        manifest.save(&self.manifest_path)?;
        Ok(report)
    }

    async fn remove_records(&self, ids: &[i64], report: &mut SyncReport) -> Result<()> {
        for &id in ids {
            self.store.delete(id).await?;
            self.index.remove(id);
            report.removed_record_ids.push(id);
            report.records_removed += 1;
        }
        Ok(())
    }

    /// Embed and insert one file's chunk set, returning the assigned ids in
    /// chunk order. Embedding is CPU-bound and runs off the async runtime;
    /// ordinals stay attached to their chunks throughout.
    async fn insert_chunks(
        &self,
        file_name: &str,
        chunks: Vec<String>,
        report: &mut SyncReport,
    ) -> Result<Vec<i64>> {
        let multi = chunks.len() > 1;
        let titles: Vec<String> = (0..chunks.len())
            .map(|ordinal| {
                if multi {
                    format!("{} #{}", file_name, ordinal + 1)
                } else {
                    file_name.to_string()
                }
            })
            .collect();

        let embed_inputs: Vec<String> = titles
            .iter()
            .zip(&chunks)
            .map(|(title, chunk)| format!("{} {}", title, chunk))
            .collect();
        let embedder = self.embedder.clone();
        let vectors = tokio::task::spawn_blocking(move || {
            embed_inputs
                .iter()
                .map(|text| embedder.embed(text))
                .collect::<Vec<_>>()
        })
        .await?;

        let mut ids = Vec::with_capacity(chunks.len());
        for ((title, body), embedding) in titles.into_iter().zip(chunks).zip(vectors) {
            let doc = self
                .store
                .insert(&NewDocument {
                    title,
                    body,
                    embedding,
                })
                .await?;
            self.index
                .upsert(doc.id, doc.embedding.clone(), Some(doc.clone()));
            report.upserted_record_ids.push(doc.id);
            report.records_added += 1;
            ids.push(doc.id);
        }
        Ok(ids)
    }
}

/// Rebuild the in-memory index from a full scan of the store.
///
/// The index is a derived cache; this runs at startup and after any
/// external store migration. Returns the number of records loaded.
pub async fn rebuild_index<S: DocumentStore + ?Sized>(
    store: &S,
    index: &VectorIndex,
) -> Result<usize> {
    index.clear();
    let documents = store.list_all().await?;
    let count = documents.len();
    for doc in documents {
        index.upsert(doc.id, doc.embedding.clone(), Some(doc));
    }
    Ok(count)
}

fn matches_extension(name: &str, allowed: &HashSet<String>) -> bool {
    extension_of(name).is_some_and(|ext| allowed.contains(&ext))
}

fn read_file(tree: &dyn DocumentTree, file: &TreeFile) -> Result<Vec<u8>> {
    let mut reader = tree.open(file)?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// SHA-256 over a byte stream in fixed-size blocks, rendered lowercase hex.
fn hash_reader(mut reader: impl Read) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_BLOCK_BYTES];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// CLI entry point: sync the configured filesystem source (or `--root`
/// override) and print a summary.
pub async fn run_sync(config: &Config, root_override: Option<PathBuf>, full: bool) -> Result<()> {
    let fs_cfg = config.sources.filesystem.as_ref();
    let root = root_override
        .or_else(|| fs_cfg.map(|c| c.root.clone()))
        .ok_or_else(|| anyhow!("no source root: configure [sources.filesystem] or pass --root"))?;
    let extensions: HashSet<String> = fs_cfg
        .map(|c| c.allowed_extensions())
        .unwrap_or_else(|| default_extensions().into_iter().collect());
    let exclude = fs_cfg.map(|c| c.exclude_globs.clone()).unwrap_or_default();
    let follow = fs_cfg.map(|c| c.follow_symlinks).unwrap_or(false);

    let tree = FsTree::new(root, follow, &exclude)?;

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let index = VectorIndex::new();
    rebuild_index(&store, &index).await?;

    let embedder = HashEmbedder::new(config.embedding.dims);
    let engine = SyncEngine::new(
        &store,
        &index,
        &embedder,
        config.manifest.path.clone(),
        config.chunking.max_chars,
    );

    let report = engine.sync(&tree, &extensions, full).await?;

    println!("sync {}", tree.label());
    println!("  files added: {}", report.files_added);
    println!("  files updated: {}", report.files_updated);
    println!("  files removed: {}", report.files_removed);
    println!("  records added: {}", report.records_added);
    println!("  records removed: {}", report.records_removed);
    println!("  index size: {}", index.len());
    println!("ok");

    store.pool().close().await;
    Ok(())
}
