use super::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use index::{
    CollectionSchema, IndexError, InMemoryStore, Payload, RecordId, VectorRecord, PRIMARY_FIELD,
    SECONDARY_FIELD,
};
use semantic::{Embedding, SemanticError, StubEmbedder};

use crate::threshold::MatchLabel;
use crate::{KnowledgeBase, MemoryEntry};

/// Stub embedder that counts calls and can be told to fail.
struct CountingEmbedder {
    inner: StubEmbedder,
    calls: AtomicUsize,
    fail: bool,
}

impl CountingEmbedder {
    fn new(dim: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: StubEmbedder::new(dim),
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            inner: StubEmbedder::new(4),
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn generate_embedding(&self, text: &str) -> Result<Embedding, SemanticError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SemanticError::EmbeddingService("connection refused".into()));
        }
        self.inner.generate_embedding(text).await
    }

    fn model_name(&self) -> &str {
        "counting-stub"
    }
}

/// Store returning canned hits and remembering which field was searched.
#[derive(Default)]
struct ScriptedStore {
    hits: Vec<RawHit>,
    searches: AtomicUsize,
    fields: Mutex<Vec<String>>,
}

impl ScriptedStore {
    fn with_hits(hits: Vec<RawHit>) -> Arc<Self> {
        Arc::new(Self {
            hits,
            ..Self::default()
        })
    }

    fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn last_field(&self) -> Option<String> {
        self.fields.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn ensure_collection(&self, _schema: &CollectionSchema) -> bool {
        true
    }

    async fn upsert(&self, _record: VectorRecord) -> Result<RecordId, IndexError> {
        Err(IndexError::backend("read-only"))
    }

    async fn search(
        &self,
        field: &str,
        _query: &[f32],
        limit: usize,
        _with_payload: bool,
    ) -> Vec<RawHit> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.fields.lock().unwrap().push(field.to_string());
        self.hits.iter().take(limit).cloned().collect()
    }

    async fn delete(&self, _id: &str) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

fn hit(id: &str, score: f32, cn: &str, en: &str) -> RawHit {
    let payload: Payload = BTreeMap::from([
        ("Chinese".to_string(), cn.to_string()),
        ("English".to_string(), en.to_string()),
        ("Japanese".to_string(), String::new()),
    ]);
    RawHit {
        id: id.into(),
        score,
        payload: Some(payload),
    }
}

fn up() -> Arc<VectorAvailability> {
    let a = Arc::new(VectorAvailability::new());
    a.mark_available();
    a
}

fn retriever(embedder: Arc<CountingEmbedder>, store: Arc<ScriptedStore>) -> Retriever {
    Retriever::new(embedder, store, up())
}

#[tokio::test]
async fn empty_text_returns_nothing_without_calls() {
    let embedder = CountingEmbedder::new(4);
    let store = ScriptedStore::with_hits(vec![hit("1", 0.95, "你好", "hello")]);
    let r = retriever(embedder.clone(), store.clone());

    for text in ["", "   ", "\n\t"] {
        let out = r
            .get_translation_memory(text, Language::Chinese, Language::English, 3)
            .await
            .unwrap();
        assert!(out.is_empty());
    }
    assert_eq!(embedder.calls(), 0);
    assert_eq!(store.searches(), 0);
}

#[tokio::test]
async fn zero_max_results_is_invalid_request() {
    let r = retriever(CountingEmbedder::new(4), ScriptedStore::with_hits(vec![]));
    let err = r
        .get_translation_memory("你好", Language::Chinese, Language::English, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidRequest(_)));
}

#[tokio::test]
async fn source_language_selects_vector_field() {
    let store = ScriptedStore::with_hits(vec![]);
    let r = retriever(CountingEmbedder::new(4), store.clone());

    r.get_translation_memory("机器学习", Language::Chinese, Language::English, 3)
        .await
        .unwrap();
    assert_eq!(store.last_field().as_deref(), Some(PRIMARY_FIELD));

    r.get_translation_memory("machine learning", Language::English, Language::Chinese, 3)
        .await
        .unwrap();
    assert_eq!(store.last_field().as_deref(), Some(SECONDARY_FIELD));

    r.get_translation_memory("機械学習", Language::Japanese, Language::English, 3)
        .await
        .unwrap();
    assert_eq!(store.last_field().as_deref(), Some(SECONDARY_FIELD));
}

#[tokio::test]
async fn hits_missing_a_side_are_dropped_and_order_kept() {
    let store = ScriptedStore::with_hits(vec![
        hit("a", 0.96, "机器学习", "machine learning"),
        hit("b", 0.91, "深度学习", ""),
        hit("c", 0.84, "  ", "neural network"),
        hit("d", 0.72, "人工智能", "  artificial intelligence "),
        hit("e", 0.50, "天气", "weather"),
    ]);
    let r = retriever(CountingEmbedder::new(4), store);

    let out = r
        .get_translation_memory("机器学习", Language::Chinese, Language::English, 5)
        .await
        .unwrap();

    let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["a", "d", "e"]);
    assert_eq!(out[0].label, MatchLabel::Strong);
    assert_eq!(out[1].label, MatchLabel::Broad);
    assert_eq!(out[1].target, "artificial intelligence");
    assert_eq!(out[2].label, MatchLabel::Unrelated);
}

#[tokio::test]
async fn missing_target_language_excludes_everything() {
    let store = ScriptedStore::with_hits(vec![hit("a", 0.96, "机器学习", "machine learning")]);
    let r = retriever(CountingEmbedder::new(4), store);
    let out = r
        .get_translation_memory("机器学习", Language::Chinese, Language::Japanese, 3)
        .await
        .unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn embedding_failure_degrades_to_empty() {
    let embedder = CountingEmbedder::failing();
    let store = ScriptedStore::with_hits(vec![hit("a", 0.96, "机器学习", "machine learning")]);
    let r = retriever(embedder.clone(), store.clone());

    let out = r
        .get_translation_memory("机器学习", Language::Chinese, Language::English, 3)
        .await
        .unwrap();
    assert!(out.is_empty());
    assert_eq!(embedder.calls(), 1);
    assert_eq!(store.searches(), 0);
}

#[tokio::test]
async fn unavailable_service_skips_lookup() {
    let embedder = CountingEmbedder::new(4);
    let store = ScriptedStore::with_hits(vec![hit("a", 0.96, "机器学习", "machine learning")]);
    let r = Retriever::new(embedder.clone(), store.clone(), Arc::new(VectorAvailability::new()));

    let out = r
        .get_translation_memory("机器学习", Language::Chinese, Language::English, 3)
        .await
        .unwrap();
    assert!(out.is_empty());
    assert_eq!(embedder.calls(), 0);
    assert_eq!(store.searches(), 0);
}

#[tokio::test]
async fn max_results_is_capped() {
    let hits = (0..80)
        .map(|i| hit(&i.to_string(), 0.9, "源", "target"))
        .collect();
    let r = retriever(CountingEmbedder::new(4), ScriptedStore::with_hits(hits));
    let out = r
        .get_translation_memory("源", Language::Chinese, Language::English, 1000)
        .await
        .unwrap();
    assert_eq!(out.len(), RetrieverConfig::default().max_results_cap);
}

#[tokio::test]
async fn batch_keeps_input_order() {
    let store = Arc::new(InMemoryStore::new(CollectionSchema::translation_memory("tm", 32)));
    let embedder = Arc::new(StubEmbedder::new(32));
    let availability = up();
    let kb = KnowledgeBase::new(embedder.clone(), store.clone(), availability.clone());

    for (cn, en) in [("你好", "hello"), ("谢谢", "thank you"), ("再见", "goodbye")] {
        kb.remember(
            MemoryEntry::new()
                .with_text(Language::Chinese, cn)
                .with_text(Language::English, en),
        )
        .await
        .unwrap();
    }

    let r = Retriever::new(embedder, store, availability);
    let out = r
        .get_translation_memory_batch(&["再见", "", "你好"], Language::Chinese, Language::English, 1)
        .await
        .unwrap();

    assert_eq!(out.len(), 3);
    assert_eq!(out[0][0].target, "goodbye");
    assert!(out[1].is_empty());
    assert_eq!(out[2][0].target, "hello");
}

#[tokio::test]
async fn batch_rejects_zero_limit() {
    let r = retriever(CountingEmbedder::new(4), ScriptedStore::with_hits(vec![]));
    assert!(r
        .get_translation_memory_batch(&["a"], Language::Chinese, Language::English, 0)
        .await
        .is_err());
}

#[tokio::test]
async fn exact_text_round_trips_as_strong_match() {
    let store = Arc::new(InMemoryStore::new(CollectionSchema::translation_memory("tm", 64)));
    let embedder = Arc::new(StubEmbedder::new(64));
    let availability = up();
    let kb = KnowledgeBase::new(embedder.clone(), store.clone(), availability.clone());
    kb.remember(
        MemoryEntry::new()
            .with_text(Language::Chinese, "机器学习是人工智能的一个分支")
            .with_text(Language::English, "Machine learning is a branch of AI"),
    )
    .await
    .unwrap();

    let r = Retriever::new(embedder, store, availability);
    let out = r
        .get_translation_memory(
            "机器学习是人工智能的一个分支",
            Language::Chinese,
            Language::English,
            3,
        )
        .await
        .unwrap();

    assert_eq!(out.len(), 1);
    assert!((out[0].score - 1.0).abs() < 1e-4);
    assert_eq!(out[0].label, MatchLabel::Strong);
    assert_eq!(out[0].target, "Machine learning is a branch of AI");
}

#[tokio::test]
async fn find_similar_applies_recommended_cutoff() {
    let store = ScriptedStore::with_hits(vec![
        hit("a", 0.93, "机器学习", "machine learning"),
        hit("b", 0.82, "深度学习", "deep learning"),
        hit("c", 0.66, "人工智能", ""),
        hit("d", 0.40, "天气", "weather"),
    ]);
    let r = retriever(CountingEmbedder::new(4), store);

    let strict = r
        .find_similar("机器学习", Language::Chinese, SimilarityLevel::High, UseCase::Translation, 10)
        .await
        .unwrap();
    assert_eq!(strict.len(), 1);
    assert_eq!(strict[0].label, MatchLabel::Strong);

    let loose = r
        .find_similar("机器学习", Language::Chinese, SimilarityLevel::Low, UseCase::Search, 10)
        .await
        .unwrap();
    let ids: Vec<&str> = loose.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert!(!loose[2].payload.contains_key("English"));
    assert!(!loose[2].payload.contains_key("Japanese"));
}

#[tokio::test]
async fn find_similar_rejects_zero_limit() {
    let r = retriever(CountingEmbedder::new(4), ScriptedStore::with_hits(vec![]));
    let err = r
        .find_similar("x", Language::English, SimilarityLevel::Medium, UseCase::Search, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidRequest(_)));
}

fn ja_hit(id: &str, score: f32, ja: &str, cn: &str) -> RawHit {
    let payload: Payload = BTreeMap::from([
        ("Japanese".to_string(), ja.to_string()),
        ("Chinese".to_string(), cn.to_string()),
    ]);
    RawHit {
        id: id.into(),
        score,
        payload: Some(payload),
    }
}

#[tokio::test]
async fn third_language_query_uses_cross_language_table() {
    let store = ScriptedStore::with_hits(vec![
        ja_hit("a", 0.42, "機械学習", "机器学习"),
        ja_hit("b", 0.37, "深層学習", "深度学习"),
        ja_hit("c", 0.20, "天気", "天气"),
    ]);
    let r = retriever(CountingEmbedder::new(4), store.clone());

    let out = r
        .get_translation_memory("機械学習", Language::Japanese, Language::Chinese, 3)
        .await
        .unwrap();
    assert_eq!(store.last_field().as_deref(), Some(SECONDARY_FIELD));
    let labels: Vec<MatchLabel> = out.iter().map(|c| c.label).collect();
    assert_eq!(
        labels,
        [MatchLabel::Related, MatchLabel::Broad, MatchLabel::Unrelated]
    );

    let similar = r
        .find_similar("機械学習", Language::Japanese, SimilarityLevel::Low, UseCase::Search, 3)
        .await
        .unwrap();
    let ids: Vec<&str> = similar.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(similar[0].label, MatchLabel::Related);
}

#[tokio::test]
async fn secondary_language_query_stays_same_language() {
    let store = ScriptedStore::with_hits(vec![hit("a", 0.42, "机器学习", "machine learning")]);
    let r = retriever(CountingEmbedder::new(4), store);

    let out = r
        .get_translation_memory("machine learning", Language::English, Language::Chinese, 3)
        .await
        .unwrap();
    assert_eq!(out[0].label, MatchLabel::Unrelated);
}
