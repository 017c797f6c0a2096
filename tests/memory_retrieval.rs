//! End-to-end tests for the memory subsystem: corpus rebuild, conversational
//! memory, context assembly, and persistence — all against isolated tempdir
//! state with the deterministic local embedder, so no network or API keys
//! are needed.

use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;

use recall::config::{Config, EmbeddingProviderKind};
use recall::memory::{
    EmbeddingProvider, IndexRecord, LocalEmbeddingProvider, MemoryManager, SourceTag,
};

fn test_config(state: &Path) -> Config {
    let mut config = Config::default();
    config.state_dir = state.to_path_buf();
    config.corpus.dir = Some(state.join("corpus"));
    config.index.dir = Some(state.join("index"));
    config.embedding.provider = EmbeddingProviderKind::Local;
    config
}

fn write_corpus(state: &Path, files: &[(&str, &str)]) {
    let corpus = state.join("corpus");
    std::fs::create_dir_all(&corpus).unwrap();
    for (name, content) in files {
        std::fs::write(corpus.join(name), content).unwrap();
    }
}

async fn embed_one(text: &str) -> Vec<f64> {
    let provider = LocalEmbeddingProvider::new(None);
    provider.embed(&[text.to_string()]).await.unwrap().remove(0)
}

/// A provider whose every call fails, for degradation tests.
struct FailingProvider;

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f64>>> {
        Err(anyhow!("simulated embedding outage"))
    }

    fn model_name(&self) -> String {
        "always-fails".to_string()
    }

    fn dimensions(&self) -> usize {
        384
    }
}

// ---------------------------------------------------------------------------
// Corpus retrieval
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lexical_overlap_ranks_matching_document_first() {
    let state = tempfile::tempdir().unwrap();
    write_corpus(
        state.path(),
        &[
            ("cats.txt", "cats are great pets"),
            ("dogs.txt", "dogs are loyal companions"),
        ],
    );

    let manager = MemoryManager::open(&test_config(state.path())).unwrap();
    let report = manager.rebuild().await.unwrap();
    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 2);

    let context = manager.context_for_query("pets", 1, 2).await;
    let segments: Vec<&str> = context.split("\n\n").collect();
    assert!(segments[0].contains("cats"), "context was: {context}");
}

#[tokio::test]
async fn empty_store_yields_empty_context() {
    let state = tempfile::tempdir().unwrap();
    let manager = MemoryManager::open(&test_config(state.path())).unwrap();

    assert_eq!(manager.context_for_query("anything", 42, 6).await, "");
}

#[tokio::test]
async fn empty_corpus_build_yields_empty_search() {
    let state = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(state.path().join("corpus")).unwrap();

    let manager = MemoryManager::open(&test_config(state.path())).unwrap();
    let report = manager.rebuild().await.unwrap();
    assert_eq!(report.chunks, 0);

    let query = embed_one("anything").await;
    assert!(manager.store().search(&query, 5).unwrap().is_empty());
    assert_eq!(manager.context_for_query("anything", 1, 6).await, "");
}

// ---------------------------------------------------------------------------
// Conversational memory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memories_never_leak_across_users() {
    let state = tempfile::tempdir().unwrap();
    let manager = MemoryManager::open(&test_config(state.path())).unwrap();

    manager.remember(1, "my dog is Rex", "Got it, Rex the dog").await;
    manager.remember(2, "my dog is Fido", "Noted").await;

    let context = manager.context_for_query("what is my dog's name", 1, 6).await;
    assert!(context.contains("Rex"));
    assert!(!context.contains("Fido"));

    let other = manager.context_for_query("what is my dog's name", 2, 6).await;
    assert!(other.contains("Fido"));
    assert!(!other.contains("Rex"));
}

#[tokio::test]
async fn newer_memories_come_first() {
    let state = tempfile::tempdir().unwrap();
    let manager = MemoryManager::open(&test_config(state.path())).unwrap();

    let older = "User said: my favorite color is blue\nAssistant replied: noted";
    let newer = "User said: actually my favorite color is green\nAssistant replied: updated";
    manager
        .store()
        .add(IndexRecord::conversation(embed_one(older).await, older, 1, 100.0))
        .unwrap();
    manager
        .store()
        .add(IndexRecord::conversation(embed_one(newer).await, newer, 1, 200.0))
        .unwrap();

    let context = manager.context_for_query("favorite color", 1, 2).await;
    let green = context.find("green").expect("newer memory present");
    let blue = context.find("blue").expect("older memory present");
    assert!(green < blue, "context was: {context}");
}

#[tokio::test]
async fn context_is_bounded_by_k() {
    let state = tempfile::tempdir().unwrap();
    let files: Vec<(String, String)> = (0..8)
        .map(|i| (format!("doc{i}.txt"), format!("pets fact number {i}")))
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(n, c)| (n.as_str(), c.as_str())).collect();
    write_corpus(state.path(), &refs);

    let manager = MemoryManager::open(&test_config(state.path())).unwrap();
    manager.rebuild().await.unwrap();
    manager.remember(1, "I love pets", "Good to know").await;

    let context = manager.context_for_query("pets", 1, 2).await;
    assert!(!context.is_empty());
    assert!(context.split("\n\n").count() <= 2);
}

#[tokio::test]
async fn rebuild_replaces_prior_memories() {
    let state = tempfile::tempdir().unwrap();
    write_corpus(state.path(), &[("facts.txt", "cats are great pets")]);

    let manager = MemoryManager::open(&test_config(state.path())).unwrap();
    manager.remember(1, "my dog is Rex", "Got it").await;
    manager.rebuild().await.unwrap();

    let context = manager.context_for_query("my dog Rex pets", 1, 6).await;
    assert!(!context.contains("Rex"));
    assert!(context.contains("cats"));

    for hit in manager.store().search(&embed_one("dog").await, 12).unwrap() {
        assert!(matches!(hit.record.tag, SourceTag::Knowledge { .. }));
    }
}

// ---------------------------------------------------------------------------
// Degradation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn embedding_failure_degrades_to_empty_context() {
    let state = tempfile::tempdir().unwrap();
    let manager =
        MemoryManager::with_provider(&test_config(state.path()), Box::new(FailingProvider))
            .unwrap();

    assert_eq!(manager.context_for_query("pets", 1, 6).await, "");
}

#[tokio::test]
async fn embedding_failure_never_blocks_remember() {
    let state = tempfile::tempdir().unwrap();
    let manager =
        MemoryManager::with_provider(&test_config(state.path()), Box::new(FailingProvider))
            .unwrap();

    // Must not panic or error; the exchange is simply forgotten.
    manager.remember(1, "my dog is Rex", "Got it").await;
    assert_eq!(manager.stats().doc_count, 0);
}

#[tokio::test]
async fn rebuild_failure_surfaces_to_caller() {
    let state = tempfile::tempdir().unwrap();
    write_corpus(state.path(), &[("facts.txt", "cats are great pets")]);

    let manager =
        MemoryManager::with_provider(&test_config(state.path()), Box::new(FailingProvider))
            .unwrap();
    assert!(manager.rebuild().await.is_err());
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn index_round_trips_across_instances() {
    let state = tempfile::tempdir().unwrap();
    write_corpus(
        state.path(),
        &[
            ("cats.txt", "cats are great pets"),
            ("dogs.txt", "dogs are loyal companions"),
        ],
    );
    let config = test_config(state.path());

    let before = {
        let manager = MemoryManager::open(&config).unwrap();
        manager.rebuild().await.unwrap();
        manager.context_for_query("pets", 1, 4).await
    };

    let manager = MemoryManager::open(&config).unwrap();
    assert!(manager.load().unwrap());

    let first = manager.context_for_query("pets", 1, 4).await;
    // Load is idempotent: repeating it must not change query results.
    assert!(manager.load().unwrap());
    let second = manager.context_for_query("pets", 1, 4).await;

    assert_eq!(before, first);
    assert_eq!(first, second);
}

#[tokio::test]
async fn stats_track_builds_and_appends() {
    let state = tempfile::tempdir().unwrap();
    write_corpus(state.path(), &[("facts.txt", "cats are great pets")]);

    let manager = MemoryManager::open(&test_config(state.path())).unwrap();
    assert_eq!(manager.stats().doc_count, 0);
    assert!(manager.stats().last_rebuild_time.is_none());

    manager.rebuild().await.unwrap();
    let after_build = manager.stats();
    assert_eq!(after_build.doc_count, 1);
    let rebuild_time = after_build.last_rebuild_time.expect("rebuild recorded");

    manager.remember(1, "hello", "hi").await;
    let after_add = manager.stats();
    assert_eq!(after_add.doc_count, 2);
    assert_eq!(after_add.last_rebuild_time, Some(rebuild_time));
    assert_eq!(after_add.index_location, state.path().join("index"));
}

#[tokio::test]
async fn rebuild_reuses_cached_embeddings() {
    let state = tempfile::tempdir().unwrap();
    write_corpus(state.path(), &[("facts.txt", "cats are great pets")]);

    let manager = MemoryManager::open(&test_config(state.path())).unwrap();
    let first = manager.rebuild().await.unwrap();
    assert_eq!(first.reused_embeddings, 0);

    let second = manager.rebuild().await.unwrap();
    assert_eq!(second.reused_embeddings, 1);
    assert_eq!(second.chunks, 1);
}
