//! End-to-end lookup scenarios driven through the HTTP router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use polydict::core::dictionary::cache::{CacheService, CacheSettings, MemoryCacheBackend};
use polydict::core::dictionary::providers::{LocalDictionaryProvider, WiktionaryProvider};
use polydict::core::dictionary::server;
use polydict::core::dictionary::storage::{DictRow, LocalDictStore, MemoryDictStore};
use polydict::core::dictionary::{
    DictSource, DictionaryProvider, DictionaryResponse, DictionaryService, LazyDictionaryDescriptor,
    LazyDictionaryManager, LookupOrchestrator, ProviderFactory, ProviderNames, ProviderRegistry,
    Result,
};

/// Store wrapper counting exact lookups.
struct CountingStore {
    inner: MemoryDictStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn new(inner: MemoryDictStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalDictStore for CountingStore {
    async fn query_exact(&self, word: &str) -> Result<Option<DictRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.query_exact(word).await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn scan_from(&self, word: &str, limit: usize) -> Result<Vec<String>> {
        self.inner.scan_from(word, limit).await
    }

    async fn close(&self) {}
}

struct KengdicFactory;

#[async_trait]
impl ProviderFactory for KengdicFactory {
    async fn create(&self) -> Result<Arc<dyn DictionaryProvider>> {
        let store = MemoryDictStore::new().with_row(
            DictRow::new()
                .with("word", "사랑")
                .with("phonetic", "salang")
                .with("translation", "n. love; affection"),
        );
        Ok(Arc::new(LocalDictionaryProvider::new(
            "kengdic",
            "KEngDic",
            DictSource::Kengdic,
            vec!["ko".to_string()],
            Arc::new(store),
        )))
    }
}

/// Primary dictionary whose lookups blow up.
struct ExplodingProvider {
    languages: Vec<String>,
}

#[async_trait]
impl DictionaryProvider for ExplodingProvider {
    fn name(&self) -> &str {
        "ecdict"
    }

    fn display_name(&self) -> &str {
        "ECDICT"
    }

    fn source(&self) -> DictSource {
        DictSource::Ecdict
    }

    fn supported_languages(&self) -> &[String] {
        &self.languages
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn query(&self, _word: &str, _language: &str) -> Result<Option<DictionaryResponse>> {
        panic!("corrupt dictionary page");
    }

    async fn close(&self) {}
}

struct Harness {
    app: Router,
    service: Arc<DictionaryService>,
    primary: Arc<CountingStore>,
    supplement: Arc<CountingStore>,
    remote: MockServer,
}

async fn harness() -> Harness {
    let remote = MockServer::start().await;

    let primary = Arc::new(CountingStore::new(
        MemoryDictStore::new()
            .with_row(
                DictRow::new()
                    .with("word", "hello")
                    .with("phonetic", "hә'lәu")
                    .with("translation", "interj. 喂；嘿\nn. 问候")
                    .with("exchange", "s:hellos")
                    .with("collins", "3"),
            )
            .with_row(
                DictRow::new()
                    .with("word", "help")
                    .with("translation", "v. 帮助"),
            ),
    ));
    let supplement = Arc::new(CountingStore::new(MemoryDictStore::new().with_row(
        DictRow::new().with("word", "hello").with(
            "definitions",
            r#"[{"pos":"noun","definition":"an expression of greeting","example":"every morning they exchanged polite hellos"}]"#,
        ),
    )));

    let registry = Arc::new(ProviderRegistry::new());
    registry
        .register(
            Arc::new(LocalDictionaryProvider::new(
                "ecdict",
                "ECDICT",
                DictSource::Ecdict,
                vec!["en".to_string()],
                primary.clone(),
            )),
            100,
        )
        .await;
    registry
        .register(
            Arc::new(LocalDictionaryProvider::new(
                "wordnet",
                "WordNet",
                DictSource::Wordnet,
                vec!["en".to_string()],
                supplement.clone(),
            )),
            90,
        )
        .await;
    registry
        .register(
            Arc::new(
                WiktionaryProvider::new(
                    &remote.uri(),
                    Duration::from_secs(5),
                    vec!["en".to_string(), "ko".to_string()],
                )
                .unwrap(),
            ),
            10,
        )
        .await;

    let lazy = Arc::new(LazyDictionaryManager::new(registry.clone()));
    lazy.configure(
        vec![LazyDictionaryDescriptor {
            name: "kengdic".to_string(),
            display_name: "KEngDic".to_string(),
            languages: vec!["ko".to_string()],
            priority: 80,
            factory: Arc::new(KengdicFactory),
        }],
        Duration::from_secs(600),
    )
    .await;

    let cache = Arc::new(CacheService::new(
        Arc::new(MemoryCacheBackend::default()),
        CacheSettings::default(),
    ));

    let orchestrator = Arc::new(LookupOrchestrator::new(
        registry,
        lazy,
        cache,
        ProviderNames::default(),
    ));
    let service = Arc::new(DictionaryService::new(
        orchestrator,
        Some(primary.clone() as Arc<dyn LocalDictStore>),
    ));

    Harness {
        app: server::router(service.clone()),
        service,
        primary,
        supplement,
        remote,
    }
}

struct Reply {
    status: StatusCode,
    cache_header: Option<String>,
    hit_count_header: Option<String>,
    body: Value,
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let header_text = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let cache_header = header_text(server::CACHE_HEADER);
    let hit_count_header = header_text(server::CACHE_HIT_COUNT_HEADER);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    Reply {
        status,
        cache_header,
        hit_count_header,
        body,
    }
}

async fn get(app: &Router, uri: &str) -> Reply {
    send(app, Method::GET, uri, None).await
}

fn api_payload(word: &str, definition: &str) -> Value {
    json!([{
        "word": word,
        "phonetic": "/ˌsɛɹ.ənˈdɪp.ɪ.ti/",
        "phonetics": [{"text": "/ˌsɛrənˈdɪpɪti/", "audio": format!("https://audio.example/{word}-us.mp3")}],
        "meanings": [{
            "partOfSpeech": "noun",
            "definitions": [{"definition": definition, "synonyms": []}],
            "synonyms": ["chance"],
            "antonyms": []
        }],
        "sourceUrls": [format!("https://en.wiktionary.org/wiki/{word}")]
    }])
}

#[tokio::test]
async fn english_lookup_merges_supplement_definitions() {
    let h = harness().await;

    let reply = get(&h.app, "/entries/en/Hello").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.cache_header.as_deref(), Some("MISS"));

    let body = reply.body;
    assert_eq!(body["source"], "ecdict+wordnet");
    assert_eq!(body["cached"], false);
    assert_eq!(body["translations"][0]["posTag"], "interj.");
    assert_eq!(body["translations"][0]["meanings"], json!(["喂", "嘿"]));
    assert_eq!(body["definitions"][0]["definition"], "an expression of greeting");
    assert_eq!(body["exchange"]["plural"], "hellos");
    assert_eq!(body["frequency"]["collins"], 3);

    // Local results are never cached.
    assert_eq!(get(&h.app, "/cache/en/hello").await.status, StatusCode::NOT_FOUND);
    assert_eq!(h.remote.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn primary_only_word_keeps_plain_source() {
    let h = harness().await;

    let first = get(&h.app, "/entries/en/help").await;
    let second = get(&h.app, "/entries/en/help").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["source"], "ecdict");
    assert_eq!(first.body, second.body);
    assert_eq!(second.cache_header.as_deref(), Some("MISS"));
    assert_eq!(h.primary.calls(), 2);
}

#[tokio::test]
async fn unknown_word_is_not_found_and_not_cached() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/entries/en/zzzxq"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "title": "No Definitions Found"
        })))
        .expect(1)
        .mount(&h.remote)
        .await;

    let reply = get(&h.app, "/entries/en/zzzxq").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["title"], "No Definitions Found");
    assert!(reply.body["message"].is_string());
    assert!(reply.body["resolution"].is_string());

    assert_eq!(get(&h.app, "/cache/en/zzzxq").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fallback_result_is_cached_and_counts_hits() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/entries/en/serendipity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_payload(
            "serendipity",
            "The faculty of making fortunate discoveries by accident.",
        )))
        .expect(1)
        .mount(&h.remote)
        .await;

    let first = get(&h.app, "/entries/en/serendipity").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["source"], "wiktionary");
    assert_eq!(first.body["cached"], false);
    assert_eq!(first.cache_header.as_deref(), Some("MISS"));
    assert_eq!(first.body["audio"]["us"], "https://audio.example/serendipity-us.mp3");
    assert_eq!(first.body["definitions"][0]["synonyms"], json!(["chance"]));

    let info = get(&h.app, "/cache/en/serendipity").await;
    assert_eq!(info.status, StatusCode::OK);
    assert_eq!(info.body["source"], "wiktionary");
    assert_eq!(info.body["hitCount"], 0);

    let second = get(&h.app, "/entries/en/serendipity").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["source"], "cache");
    assert_eq!(second.body["cached"], true);
    assert_eq!(second.cache_header.as_deref(), Some("HIT"));
    assert_eq!(second.hit_count_header.as_deref(), Some("1"));
    assert_eq!(second.body["definitions"], first.body["definitions"]);
    assert_eq!(second.body["detailUrl"], first.body["detailUrl"]);

    let deleted = send(&h.app, Method::DELETE, "/cache/en/serendipity", None).await;
    assert_eq!(deleted.body["deleted"], true);
    assert_eq!(get(&h.app, "/cache/en/serendipity").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disabled_local_dictionaries_go_straight_to_fallback() {
    let h = harness().await;
    h.service.orchestrator().set_local_disabled(true);
    Mock::given(method("GET"))
        .and(path("/api/v2/entries/en/hello"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(api_payload("hello", "A greeting.")),
        )
        .expect(1)
        .mount(&h.remote)
        .await;

    let reply = get(&h.app, "/entries/en/hello").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["source"], "wiktionary");
    assert_eq!(h.primary.calls(), 0);
    assert_eq!(h.supplement.calls(), 0);

    let reply = get(&h.app, "/entries/ko/%EC%82%AC%EB%9E%91").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(h.service.orchestrator().lazy().construction_count(), 0);
}

#[tokio::test]
async fn bilingual_dictionary_loads_on_first_request() {
    let h = harness().await;
    assert!(!h.service.orchestrator().lazy().is_loaded("kengdic").await);

    let reply = get(&h.app, "/entries/ko/%EC%82%AC%EB%9E%91").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["word"], "사랑");
    assert_eq!(reply.body["source"], "kengdic");
    assert_eq!(reply.body["translations"][0]["meanings"], json!(["love", "affection"]));

    assert!(h.service.orchestrator().lazy().is_loaded("kengdic").await);
    let health = get(&h.app, "/health").await;
    let names: Vec<&str> = health.body["providers"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(names, ["ecdict", "wordnet", "kengdic", "wiktionary"]);
}

#[tokio::test]
async fn health_reports_providers_and_word_count() {
    let h = harness().await;

    let reply = get(&h.app, "/health").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "ok");
    assert_eq!(reply.body["wordCount"], 2);
    assert_eq!(reply.body["providers"][0]["name"], "ecdict");
    assert_eq!(reply.body["providers"][0]["displayName"], "ECDICT");
    assert_eq!(reply.body["providers"][0]["available"], true);
    assert_eq!(reply.body["cache"]["backend"], "memory");
    assert_eq!(reply.body["lazyDictionaries"][0]["state"], "unloaded");
}

#[tokio::test]
async fn suggest_scans_primary_dictionary() {
    let h = harness().await;

    let reply = get(&h.app, "/suggest/hel?limit=5").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["suggestions"], json!(["hello", "help"]));

    let reply = get(&h.app, "/suggest/help").await;
    assert_eq!(reply.body["suggestions"], json!(["help"]));
}

#[tokio::test]
async fn cache_ttl_can_be_changed_at_runtime() {
    let h = harness().await;

    let reply = send(&h.app, Method::PUT, "/admin/cache-ttl", Some(json!({"days": 7}))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["days"], 7);
    assert_eq!(get(&h.app, "/health").await.body["cache"]["ttlDays"], 7);

    let reply = send(&h.app, Method::PUT, "/admin/cache-ttl", Some(json!({"days": 0}))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn panicking_provider_yields_internal_error_body() {
    let h = harness().await;
    h.service
        .orchestrator()
        .registry()
        .register(
            Arc::new(ExplodingProvider {
                languages: vec!["en".to_string()],
            }),
            100,
        )
        .await;

    let reply = get(&h.app, "/entries/en/hello").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["title"], "Something Went Wrong");
    assert!(reply.body["message"].is_string());
    assert!(reply.body["resolution"].is_string());
    assert!(!reply.body["message"].as_str().unwrap().contains("corrupt"));

    // The router keeps serving after the panic.
    assert_eq!(get(&h.app, "/health").await.status, StatusCode::OK);
}
