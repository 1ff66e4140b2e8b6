//! HTTP round-trips over the full stack: router, cache, pool, workers and
//! the reference engine.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use akshara_api::SharedApp;
use akshara_core::config::{DaemonConfig, UserAccount};
use akshara_core::types::{symbol_types, SchemeDetails, Symbol, MATCH_EXACT};
use akshara_core::utils::gunzip_bytes;
use akshara_engine::MemoryEngine;

fn symbol(symbol_type: i32, pattern: &str, value1: &str) -> Symbol {
    Symbol {
        symbol_type,
        pattern: pattern.to_string(),
        value1: value1.to_string(),
        value2: String::new(),
        match_type: MATCH_EXACT,
        weight: 0,
    }
}

fn test_engine() -> MemoryEngine {
    let engine = MemoryEngine::new(vec![SchemeDetails {
        identifier: "ml".into(),
        lang_code: "ml".into(),
        display_name: "Malayalam".into(),
        author: "community".into(),
        compiled_date: "2024-01-01".into(),
        is_stable: true,
    }]);
    engine.set_symbols(
        "ml",
        vec![
            symbol(symbol_types::VOWEL, "a", "അ"),
            symbol(symbol_types::CONSONANT, "ma", "മ"),
            symbol(symbol_types::CONSONANT, "la", "ല"),
            symbol(symbol_types::CONSONANT, "ya", "യ"),
            symbol(symbol_types::CONSONANT, "yaa", "യാ"),
            symbol(symbol_types::CONSONANT, "LaM", "ളം"),
        ],
    );
    engine
}

struct Fixture {
    _dir: tempfile::TempDir,
    app: SharedApp,
    router: Router,
}

fn fixture_with(configure: impl FnOnce(&mut DaemonConfig)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DaemonConfig {
        config_dir: dir.path().to_path_buf(),
        enable_internal_api: true,
        // Nothing in these tests may reach a real upstream.
        upstream: "http://127.0.0.1:1".to_string(),
        ..Default::default()
    };
    configure(&mut config);
    config.normalize();

    let app = akshara_api::build(config, Arc::new(test_engine())).unwrap();
    let router = akshara_api::router(app.clone());
    Fixture { _dir: dir, app, router }
}

fn fixture() -> Fixture {
    fixture_with(|_| {})
}

async fn get(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn post_json(router: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn transliteration_round_trip_and_cache() {
    let fx = fixture();

    let (status, body) = get(&fx.router, "/tl/ml/mala").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["input"], "mala");
    assert_eq!(body["result"][0], "മല");

    let misses_before = fx.app.metrics.snapshot().cache_misses;
    let hits_before = fx.app.metrics.snapshot().cache_hits;

    let (status, body) = get(&fx.router, "/tl/ml/mala").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"][0], "മല");

    let snap = fx.app.metrics.snapshot();
    assert_eq!(snap.cache_misses, misses_before, "second read must not miss");
    assert_eq!(snap.cache_hits, hits_before + 1);
}

#[tokio::test]
async fn unknown_scheme_is_bad_request() {
    let fx = fixture();

    let (status, body) = get(&fx.router, "/tl/xx/mala").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("xx"));
}

#[tokio::test]
async fn reverse_transliteration_answers() {
    let fx = fixture();

    let (status, body) = get(&fx.router, "/rtl/ml/%E0%B4%AE%E0%B4%B2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"][0], "mala");
}

#[tokio::test]
async fn languages_and_status() {
    let fx = fixture();

    let (status, body) = get(&fx.router, "/languages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["identifier"], "ml");
    assert_eq!(body[0]["langCode"], "ml");

    let (status, body) = get(&fx.router, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["version"].as_str().unwrap(), akshara_core::VERSION);
    assert!(body["uptime"].as_str().unwrap().ends_with('s'));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn learn_becomes_visible_through_advanced_read() {
    let fx = fixture();

    let (status, body) =
        post_json(&fx.router, "/learn", serde_json::json!({"lang": "ml", "text": "മലയാളം"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!("success"));

    // The worker applies the learn asynchronously; it must land well
    // within a second.
    let mut found = false;
    for _ in 0..100 {
        let (status, body) = get(&fx.router, "/atl/ml/malayaaLaM").await;
        assert_eq!(status, StatusCode::OK);
        let exact = body["exact_words"].as_array().unwrap();
        if exact.iter().any(|s| s["word"] == "മലയാളം") {
            found = true;
            break;
        }
        // Not yet applied: drop the stale cached answer and retry.
        fx.app.cache.clear();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(found, "learned word never appeared in exact_words");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn learn_to_unknown_scheme_is_rejected() {
    let fx = fixture();

    let (status, body) =
        post_json(&fx.router, "/learn", serde_json::json!({"lang": "xx", "text": "word"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn train_invalidates_the_pattern_fingerprint() {
    let fx = fixture();

    // Prime the cache for the pattern.
    let (status, _) = get(&fx.router, "/tl/ml/chrome").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &fx.router,
        "/train/ml",
        serde_json::json!({"pattern": "chrome", "word": "ക്രോം"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!("Word Trained"));

    let misses_before = fx.app.metrics.snapshot().cache_misses;
    let (_, _) = get(&fx.router, "/tl/ml/chrome").await;
    assert_eq!(
        fx.app.metrics.snapshot().cache_misses,
        misses_before + 1,
        "read after train must miss the cache"
    );

    // Once the worker catches up, the trained word is the first answer.
    let mut trained = false;
    for _ in 0..100 {
        fx.app.cache.clear();
        let (_, body) = get(&fx.router, "/tl/ml/chrome").await;
        if body["result"][0] == "ക്രോം" {
            trained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(trained);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn train_bulk_accepts_pattern_lists() {
    let fx = fixture();

    let (status, body) = post_json(
        &fx.router,
        "/train/bulk/ml",
        serde_json::json!([
            {"word": "ക്രോം", "pattern": ["chrome", "crome"]},
            {"word": "മല", "pattern": ["mountain"]}
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!("Words Trained"));

    let mut trained = false;
    for _ in 0..100 {
        fx.app.cache.clear();
        let (_, body) = get(&fx.router, "/tl/ml/mountain").await;
        if body["result"][0] == "മല" {
            trained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(trained);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_clears_the_whole_cache() {
    let fx = fixture();

    post_json(&fx.router, "/learn", serde_json::json!({"lang": "ml", "text": "തെറ്റ്"})).await;

    // Wait for the learn to apply so the delete can find the word.
    let mut applied = false;
    for _ in 0..100 {
        if fx.app.pool.with_handle("ml", |h| h.corpus_details()).await.unwrap().words_count > 0 {
            applied = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(applied);

    // Populate the cache with an unrelated answer.
    get(&fx.router, "/tl/ml/mala").await;
    assert!(fx.app.cache.stats().entries > 0);

    let (status, body) =
        post_json(&fx.router, "/delete", serde_json::json!({"lang": "ml", "text": "തെറ്റ്"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!("success"));
    assert_eq!(fx.app.cache.stats().entries, 0, "delete must clear everything");

    // Deleting a word that is not there is an engine error.
    let (status, _) =
        post_json(&fx.router, "/delete", serde_json::json!({"lang": "ml", "text": "തെറ്റ്"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn corpus_download_serves_gzip_and_bypasses_short_pages() {
    let fx = fixture();

    for i in 0..5 {
        post_json(
            &fx.router,
            "/learn",
            serde_json::json!({"lang": "ml", "text": format!("word-{}", i)}),
        )
        .await;
    }
    for _ in 0..100 {
        if fx.app.pool.with_handle("ml", |h| h.corpus_details()).await.unwrap().words_count == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = fx
        .router
        .clone()
        .oneshot(Request::get("/download/ml/0").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let page: serde_json::Value =
        serde_json::from_slice(&gunzip_bytes(&body).unwrap()).unwrap();
    assert_eq!(page["count"], 5);
    assert_eq!(page["success"], true);
    assert_eq!(page["words"].as_array().unwrap().len(), 5);

    // Short page: never cached.
    assert_eq!(fx.app.corpus.cached_pages(), 0);

    let (status, _) = get(&fx.router, "/download/ml/-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scheme_definitions_and_letters() {
    let fx = fixture();

    let (status, body) = get(&fx.router, "/schemes/ml").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["details"]["identifier"], "ml");

    let (status, body) = get(&fx.router, "/schemes/ml/definitions").await;
    assert_eq!(status, StatusCode::OK);
    let definitions = body["definitions"].as_array().unwrap();
    assert!(definitions.iter().any(|d| d["letter"] == "അ"));
    assert!(definitions.iter().any(|d| d["letter"] == "മ"));

    // A letter nothing starts with gives an empty list, not null.
    let (status, body) = get(&fx.router, "/schemes/ml/definitions/q").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["definitions"], serde_json::json!([]));

    let (status, _) = get(&fx.router, "/schemes/xx").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pack_listings_on_empty_registry() {
    let fx = fixture();

    let (status, body) = get(&fx.router, "/packs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));

    let (status, _) = get(&fx.router, "/packs/ml").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&fx.router, "/packs/ml/ml-basic").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_toggle_starts_dispatcher() {
    let fx = fixture();
    assert!(!fx.app.sync.is_running());

    let (status, body) = post_json(&fx.router, "/sync/download/ml/enable", serde_json::Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(fx.app.sync.is_running());
    assert!(fx.app.sync.is_enabled("ml"));

    let (status, _) = post_json(&fx.router, "/sync/download/ml/disable", serde_json::Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!fx.app.sync.is_enabled("ml"));

    let (status, _) = post_json(&fx.router, "/sync/download/xx/enable", serde_json::Value::Null).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn learn_upload_streams_progress() {
    let fx = fixture();

    let boundary = "aksharad-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"words.txt\"\r\nContent-Type: text/plain\r\n\r\nമല 5\nമഴ 3\n\r\n--{b}--\r\n",
        b = boundary
    );

    let response = fx
        .router
        .clone()
        .oneshot(
            Request::post("/learn/upload/ml")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(
        response.into_body().collect().await.unwrap().to_bytes().to_vec(),
    )
    .unwrap();
    assert!(text.contains("Learning from"), "got: {}", text);
    assert!(text.contains("TotalWords: 2"), "got: {}", text);

    let words = fx.app.pool.with_handle("ml", |h| h.corpus_details()).await.unwrap();
    assert_eq!(words.words_count, 2);
}

#[tokio::test]
async fn admin_routes_require_basic_auth_when_accounts_enabled() {
    let fx = fixture_with(|config| {
        config.accounts_enabled = true;
        config
            .users
            .insert("admin".to_string(), UserAccount { password: "secret".to_string() });
    });

    // No header.
    let (status, body) =
        post_json(&fx.router, "/learn", serde_json::json!({"lang": "ml", "text": "മല"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    // Wrong password.
    let response = fx
        .router
        .clone()
        .oneshot(
            Request::post("/learn")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, "Basic YWRtaW46d3Jvbmc=") // admin:wrong
                .body(Body::from(r#"{"lang":"ml","text":"മല"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Correct credentials.
    let response = fx
        .router
        .clone()
        .oneshot(
            Request::post("/learn")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, "Basic YWRtaW46c2VjcmV0") // admin:secret
                .body(Body::from(r#"{"lang":"ml","text":"മല"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Reads stay public.
    let (status, _) = get(&fx.router, "/tl/ml/mala").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_absent_without_internal_api() {
    let fx = fixture_with(|config| config.enable_internal_api = false);

    let (status, _) =
        post_json(&fx.router, "/learn", serde_json::json!({"lang": "ml", "text": "മല"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&fx.router, "/tl/ml/mala").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn language_download_serves_scheme_file() {
    let dir = tempfile::tempdir().unwrap();
    let schemes_dir = dir.path().join("schemes");
    std::fs::create_dir_all(&schemes_dir).unwrap();
    std::fs::write(
        schemes_dir.join("ml.toml"),
        r#"
identifier = "ml"
lang_code = "ml"
display_name = "Malayalam"

[[symbols]]
type = 2
pattern = "ma"
value1 = "മ"
"#,
    )
    .unwrap();

    let mut config = DaemonConfig {
        config_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    config.normalize();

    let engine = MemoryEngine::load(&schemes_dir).unwrap();
    let app = akshara_api::build(config, Arc::new(engine)).unwrap();
    let router = akshara_api::router(app);

    let response = router
        .oneshot(Request::get("/languages/ml/download").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("ml.vst"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("Malayalam"));
}
