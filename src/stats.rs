//! Corpus statistics overview.
//!
//! A quick summary of what is indexed: record counts, manifest entries,
//! and on-disk sizes. Used by `qry stats` to confirm that syncs are doing
//! what they should.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::manifest::Manifest;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;

    let manifest = Manifest::load(&config.manifest.path);
    let tracked_files = manifest.entries.len();
    let tracked_records: usize = manifest
        .entries
        .values()
        .map(|e| e.document_ids.len())
        .sum();
    let newest_mtime = manifest.entries.values().map(|e| e.mtime).max();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Quarry — Corpus Stats");
    println!("=====================");
    println!();
    println!("  Database:        {}", config.db.path.display());
    println!("  Size:            {}", format_bytes(db_size));
    println!("  Manifest:        {}", config.manifest.path.display());
    println!();
    println!("  Records:         {}", total_docs);
    println!("  Tracked files:   {}", tracked_files);
    println!("  Tracked records: {}", tracked_records);
    println!("  Embedding dims:  {}", config.embedding.dims);
    if let Some(mtime) = newest_mtime {
        println!("  Newest source:   {}", format_ts_iso_millis(mtime));
    }
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_iso_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}
