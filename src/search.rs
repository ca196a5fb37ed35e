//! Query-side retrieval.
//!
//! Thin composition over the embedder and the vector index: a blank query
//! returns nothing without touching the embedder, everything else is
//! embedded off the caller's thread and ranked by the index. An empty index
//! is an empty result, never an error.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::embedding::HashEmbedder;
use crate::index::VectorIndex;
use crate::models::SearchHit;
use crate::store::SqliteStore;
use crate::sync::rebuild_index;

/// Embed `query` and return the top `limit` hits scoring at least
/// `min_similarity`.
pub async fn search_documents(
    index: &VectorIndex,
    embedder: &HashEmbedder,
    query: &str,
    limit: usize,
    min_similarity: f32,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let embedder = embedder.clone();
    let owned_query = query.to_string();
    let query_vec = match tokio::task::spawn_blocking(move || embedder.embed(&owned_query)).await {
        Ok(v) => v,
        Err(e) => {
            // Embedding failure degrades to "no results", never a crash.
            eprintln!("Warning: query embedding failed: {}", e);
            return Ok(Vec::new());
        }
    };

    Ok(index
        .search_with_display(&query_vec, limit, min_similarity)
        .into_iter()
        .map(|(document, score)| SearchHit { document, score })
        .collect())
}

/// CLI entry point: rebuild the index from the store, run the query, print
/// ranked results.
pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    min_score: Option<f32>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let index = VectorIndex::new();
    rebuild_index(&store, &index).await?;

    let embedder = HashEmbedder::new(config.embedding.dims);
    let limit = limit.unwrap_or(config.retrieval.final_limit);
    let min_similarity = min_score.unwrap_or(config.retrieval.min_similarity);

    let hits = search_documents(&index, &embedder, query, limit, min_similarity).await?;

    if hits.is_empty() {
        println!("No results.");
        store.pool().close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, hit.score, hit.document.title);
        println!(
            "    excerpt: \"{}\"",
            excerpt(&hit.document.body).replace('\n', " ")
        );
        println!("    id: {}", hit.document.id);
        println!();
    }

    store.pool().close().await;
    Ok(())
}

fn excerpt(body: &str) -> String {
    body.chars().take(240).collect()
}
