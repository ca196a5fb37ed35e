//! Document retrieval by id.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::store::{DocumentStore, SqliteStore};

/// CLI entry point: print one document's metadata and body.
pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let doc = match store.get(id).await? {
        Some(d) => d,
        None => {
            store.pool().close().await;
            eprintln!("Error: document not found: {}", id);
            std::process::exit(1);
        }
    };

    println!("--- Document ---");
    println!("id:         {}", doc.id);
    println!("title:      {}", doc.title);
    println!("dims:       {}", doc.embedding.len());
    println!("created_at: {}", format_ts_iso(doc.created_at));
    println!("updated_at: {}", format_ts_iso(doc.updated_at));
    println!();
    println!("--- Body ---");
    println!("{}", doc.body);

    store.pool().close().await;
    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
