//! Resolve a question twice against a small in-memory index
//!
//! This example shows:
//! 1. Building a MemoryIndex and a SQLite-backed response cache
//! 2. Expanding a query with configured synonyms
//! 3. Computing an answer by cross-variant consensus
//! 4. Replaying the same answer from the cache, including for a paraphrase
//! 5. Nudging a cached score with the feedback hook

use std::sync::Arc;

use anyhow::Result;
use quorum_resolver::{KeywordBoostRanker, Resolver, ResolverConfig};
use quorum_store::{Chunk, MemoryIndex, ResponseCache, SqliteCacheStore};
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut chunks = vec![
        Chunk::new("paris", "Paris is the capital of France.").with_source("geo/france.md"),
        Chunk::new("lyon", "Lyon is a large city in France.").with_source("geo/france.md"),
        Chunk::new("berlin", "Berlin is the capital of Germany.").with_source("geo/germany.md"),
    ];
    chunks.extend((0..30).map(|i| {
        Chunk::new(
            format!("garden-{i}"),
            format!("Tomato seedlings need steady warmth, note {i}."),
        )
        .with_source("garden.md")
    }));
    let index = Arc::new(MemoryIndex::from_chunks(chunks));
    println!("📚 Indexed {} chunks", index.len().await);

    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("cache.db");
    let store = SqliteCacheStore::open(&db_path).await?;
    println!("🗄️  Cache database at {}", db_path.display());

    let config = ResolverConfig::from_toml_str(
        r#"
        score_threshold = 250
        per_variant_top_k = 3
        documents_to_return = 3
        synonyms = [["capital of France", "France's capital"]]
        "#,
    )?;

    let resolver = Resolver::new(config, index, ResponseCache::new(Arc::new(store)))?
        .with_ranker(Arc::new(KeywordBoostRanker::new(2)));

    println!("\n🔎 First call (computed):");
    let answer = resolver.resolve("capital of France").await?;
    println!("{}", answer.brief());

    println!("\n🔁 Second call (cached):");
    let answer = resolver.resolve("capital of France").await?;
    println!("{}", answer.brief());

    println!("\n🔁 Paraphrase (cached under its own key):");
    let answer = resolver.resolve("France's capital").await?;
    println!("{}", answer.brief());

    println!("\n👍 Promoting lyon for \"capital of France\"");
    resolver.adjust_score("capital of France", "lyon", 100).await?;
    let answer = resolver.resolve("capital of France").await?;
    println!("{}", answer.brief());

    println!("\n🕳️  Question nothing answers:");
    let answer = resolver.resolve("tallest mountain").await?;
    println!("{}", answer.brief());

    println!("\n✅ {} cache keys stored", resolver.cache().len().await?);
    Ok(())
}
