//! Request handlers. Read handlers consult the response cache before the
//! pool; mutation handlers feed the per-scheme queues and invalidate the
//! affected cache fingerprints before replying.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use akshara_core::error::Error;
use akshara_core::types::{AdvancedSuggestions, CorpusDetails, Pack, PackPage, SchemeDetails};
use akshara_core::utils::utc_now_string;
use akshara_engine::cache::{atl_fingerprint, rtl_fingerprint, tl_fingerprint};
use akshara_engine::scheme::{self, SchemeDefinition};
use akshara_engine::workers::TrainRequest;

use crate::error::{ApiError, ApiResult};
use crate::server::SharedApp;

// ========== Response envelope ==========

#[derive(Debug, Serialize)]
pub struct StandardResponse {
    pub success: bool,
    pub error: String,
    pub at: String,
}

fn ok_envelope() -> StandardResponse {
    StandardResponse { success: true, error: String::new(), at: utc_now_string() }
}

#[derive(Serialize)]
pub struct TransliterationResponse {
    #[serde(flatten)]
    pub standard: StandardResponse,
    pub result: Vec<String>,
    pub input: String,
}

#[derive(Serialize)]
pub struct AdvancedResponse {
    #[serde(flatten)]
    pub standard: StandardResponse,
    pub input: String,
    #[serde(flatten)]
    pub suggestions: AdvancedSuggestions,
}

#[derive(Serialize)]
pub struct MetaResponse {
    #[serde(flatten)]
    pub standard: StandardResponse,
    pub result: CorpusDetails,
}

#[derive(Serialize)]
pub struct SchemeResponse {
    #[serde(flatten)]
    pub standard: StandardResponse,
    pub details: SchemeDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definitions: Option<Vec<SchemeDefinition>>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub standard: StandardResponse,
    pub version: String,
    pub uptime: String,
}

// ========== Request bodies ==========

#[derive(Debug, Deserialize)]
pub struct WordArgs {
    pub lang: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TrainArgs {
    pub pattern: String,
    pub word: String,
}

#[derive(Debug, Deserialize)]
pub struct TrainBulkArgs {
    pub word: String,
    #[serde(default)]
    pub pattern: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PackDownloadArgs {
    pub lang: String,
    pub pack: String,
    pub page: String,
}

// ========== Read handlers ==========

pub async fn transliterate(
    State(app): State<SharedApp>,
    Path((scheme, word)): Path<(String, String)>,
) -> ApiResult<Json<TransliterationResponse>> {
    let key = tl_fingerprint(&scheme, &word);

    let result = match app.cache.get_string(&key) {
        Some(words) => {
            app.metrics.record_cache_hit();
            words
        }
        None => {
            app.metrics.record_cache_miss();

            let suggestions = app
                .pool
                .with_handle(&scheme, |handle| handle.transliterate(&word))
                .await
                .map_err(|e| {
                    warn!(scheme = %scheme, word = %word, error = %e, "transliteration failed");
                    e
                })?;

            let words: Vec<String> = suggestions.into_iter().map(|s| s.word).collect();
            app.cache.set_string(key, &words);
            words
        }
    };

    Ok(Json(TransliterationResponse { standard: ok_envelope(), result, input: word }))
}

pub async fn reverse_transliterate(
    State(app): State<SharedApp>,
    Path((scheme, word)): Path<(String, String)>,
) -> ApiResult<Json<TransliterationResponse>> {
    let key = rtl_fingerprint(&scheme, &word);

    let result = match app.cache.get_string(&key) {
        Some(words) => {
            app.metrics.record_cache_hit();
            words
        }
        None => {
            app.metrics.record_cache_miss();

            let suggestions = app
                .pool
                .with_handle(&scheme, |handle| handle.reverse_transliterate(&word))
                .await
                .map_err(|e| {
                    warn!(scheme = %scheme, word = %word, error = %e, "reverse transliteration failed");
                    e
                })?;

            if suggestions.is_empty() {
                return Err(Error::bad_request(format!(
                    "no transliteration found for language: {}, word: {}",
                    scheme, word
                ))
                .into());
            }

            let words: Vec<String> = suggestions.into_iter().map(|s| s.word).collect();
            app.cache.set_string(key, &words);
            words
        }
    };

    Ok(Json(TransliterationResponse { standard: ok_envelope(), result, input: word }))
}

pub async fn transliterate_advanced(
    State(app): State<SharedApp>,
    Path((scheme, word)): Path<(String, String)>,
) -> ApiResult<Json<AdvancedResponse>> {
    let key = atl_fingerprint(&scheme, &word);

    let suggestions = match app.cache.get(&key) {
        Some(cached) => {
            app.metrics.record_cache_hit();
            serde_json::from_slice(&cached).map_err(Error::from)?
        }
        None => {
            app.metrics.record_cache_miss();

            let suggestions = app
                .pool
                .with_handle(&scheme, |handle| handle.transliterate_advanced(&word))
                .await
                .map_err(|e| {
                    warn!(scheme = %scheme, word = %word, error = %e, "advanced transliteration failed");
                    e
                })?;

            let encoded = serde_json::to_vec(&suggestions).map_err(Error::from)?;
            app.cache.set(key, Bytes::from(encoded));
            suggestions
        }
    };

    Ok(Json(AdvancedResponse { standard: ok_envelope(), input: word, suggestions }))
}

pub async fn languages(State(app): State<SharedApp>) -> Json<Vec<SchemeDetails>> {
    Json(app.schemes.clone())
}

pub async fn language_download(
    State(app): State<SharedApp>,
    Path(scheme): Path<String>,
) -> ApiResult<Response> {
    let path = app
        .pool
        .with_handle(&scheme, |handle| Ok(handle.vst_path()))
        .await?;

    let content = tokio::fs::read(&path).await.map_err(Error::from)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.vst\"", scheme),
            ),
        ],
        content,
    )
        .into_response())
}

pub async fn corpus_meta(
    State(app): State<SharedApp>,
    Path(scheme): Path<String>,
) -> ApiResult<Json<MetaResponse>> {
    let result = app
        .pool
        .with_handle(&scheme, |handle| handle.corpus_details())
        .await?;

    Ok(Json(MetaResponse { standard: ok_envelope(), result }))
}

pub async fn corpus_download(
    State(app): State<SharedApp>,
    Path((scheme, offset)): Path<(String, i64)>,
) -> ApiResult<Response> {
    if offset < 0 {
        return Err(Error::bad_request("invalid parameter").into());
    }

    let body = app.corpus.page(&app.pool, &scheme, offset as usize).await?;

    Ok((
        [
            (header::CONTENT_ENCODING, "gzip"),
            (header::CONTENT_TYPE, "application/json; charset=utf-8"),
        ],
        body,
    )
        .into_response())
}

pub async fn scheme_info(
    State(app): State<SharedApp>,
    Path(scheme): Path<String>,
) -> ApiResult<Json<SchemeResponse>> {
    let details = app.scheme_details(&scheme)?.clone();
    Ok(Json(SchemeResponse { standard: ok_envelope(), details, definitions: None }))
}

pub async fn scheme_definitions(
    State(app): State<SharedApp>,
    Path(scheme): Path<String>,
) -> ApiResult<Json<SchemeResponse>> {
    let details = app.scheme_details(&scheme)?.clone();
    let definitions = scheme::definitions(&app.pool, &details).await?;

    Ok(Json(SchemeResponse { standard: ok_envelope(), details, definitions: Some(definitions) }))
}

pub async fn scheme_letter_definitions(
    State(app): State<SharedApp>,
    Path((scheme, letter)): Path<(String, String)>,
) -> ApiResult<Json<SchemeResponse>> {
    let details = app.scheme_details(&scheme)?.clone();
    let definitions = scheme::letter_definitions(&app.pool, &details, &letter).await?;

    Ok(Json(SchemeResponse { standard: ok_envelope(), details, definitions: Some(definitions) }))
}

pub async fn status(State(app): State<SharedApp>) -> Json<StatusResponse> {
    Json(StatusResponse {
        standard: ok_envelope(),
        version: akshara_core::VERSION.to_string(),
        uptime: format_uptime(app.started_at.elapsed()),
    })
}

// ========== Pack handlers ==========

pub async fn packs(State(app): State<SharedApp>) -> ApiResult<Json<Vec<Pack>>> {
    Ok(Json(app.packs.packs()?))
}

pub async fn packs_for_lang(
    State(app): State<SharedApp>,
    Path(lang): Path<String>,
) -> ApiResult<Json<Vec<Pack>>> {
    Ok(Json(app.packs.packs_for_lang(&lang)?))
}

pub async fn pack_info(
    State(app): State<SharedApp>,
    Path((lang, pack)): Path<(String, String)>,
) -> ApiResult<Json<Pack>> {
    Ok(Json(app.packs.pack_info(&lang, &pack)?))
}

pub async fn pack_page_info(
    State(app): State<SharedApp>,
    Path((lang, pack, page)): Path<(String, String, String)>,
) -> ApiResult<Json<PackPage>> {
    Ok(Json(app.packs.pack_page_info(&lang, &pack, &page)?))
}

pub async fn pack_page_download(
    State(app): State<SharedApp>,
    Path((lang, pack, page)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let gzip_path = app.packs.serve_page(&lang, &pack, &page)?;
    let content = tokio::fs::read(&gzip_path).await.map_err(Error::from)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", page)),
        ],
        content,
    )
        .into_response())
}

pub async fn pack_download_request(
    State(app): State<SharedApp>,
    Json(args): Json<PackDownloadArgs>,
) -> ApiResult<Json<&'static str>> {
    app.packs
        .download_page(&app.pool, &args.lang, &args.pack, &args.page)
        .await
        .map_err(|e| match e {
            Error::Io { .. } | Error::Internal { .. } => e,
            Error::Engine { .. } => Error::internal(format!("Error importing from '{}'", e)),
            other => Error::bad_request(format!("error downloading pack: {}", other)),
        })?;

    app.metrics.record_pack_install();

    Ok(Json("success"))
}

// ========== Mutation handlers ==========

pub async fn learn(
    State(app): State<SharedApp>,
    Json(args): Json<WordArgs>,
) -> ApiResult<Json<&'static str>> {
    app.mutations.submit_learn(&args.lang, args.text.clone())?;

    // The worker applies the learn shortly; dropping the fingerprints now
    // means the next read observes post-learn ground truth.
    app.cache.delete(&tl_fingerprint(&args.lang, &args.text));
    app.cache.delete(&rtl_fingerprint(&args.lang, &args.text));
    app.cache.delete(&atl_fingerprint(&args.lang, &args.text));

    Ok(Json("success"))
}

pub async fn learn_upload(
    State(app): State<SharedApp>,
    Path(scheme): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    if !app.pool.is_valid_scheme(&scheme) {
        return Err(Error::bad_request("unable to find language to train").into());
    }

    let tempdir = tempfile::tempdir().map_err(Error::from)?;
    let mut saved = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::bad_request(format!("request data not found: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|name| {
                std::path::Path::new(name)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_string())
            })
            .unwrap_or_else(|| "upload".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::bad_request(format!("failed to read upload: {}", e)))?;

        let path = tempdir.path().join(filename);
        tokio::fs::write(&path, &data).await.map_err(Error::from)?;
        saved.push(path);
    }

    if saved.is_empty() {
        return Err(Error::bad_request("no files were uploaded").into());
    }

    // Stream progress lines while the uploads are learned one by one.
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(16);
    tokio::spawn(async move {
        let _files = tempdir;

        for path in saved {
            let _ = tx
                .send(Ok(Bytes::from(format!("Learning from {}\n", path.display()))))
                .await;

            let start = Instant::now();
            let line = match app
                .pool
                .with_handle(&scheme, |handle| handle.learn_from_file(&path))
                .await
            {
                Ok(status) => format!(
                    "Learned from '{}'. TotalWords: {}, Failed: {}. Took {:?}\n",
                    path.display(),
                    status.total_words,
                    status.failed,
                    start.elapsed()
                ),
                Err(e) => format!("Error learning from '{}'\n", e),
            };
            let _ = tx.send(Ok(Bytes::from(line))).await;
        }
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| Error::internal(e))?;

    Ok(response)
}

pub async fn train(
    State(app): State<SharedApp>,
    Path(scheme): Path<String>,
    Json(args): Json<TrainArgs>,
) -> ApiResult<Json<&'static str>> {
    app.mutations
        .submit_train(&scheme, TrainRequest { pattern: args.pattern.clone(), word: args.word })?;

    app.cache.delete(&tl_fingerprint(&scheme, &args.pattern));

    Ok(Json("Word Trained"))
}

pub async fn train_bulk(
    State(app): State<SharedApp>,
    Path(scheme): Path<String>,
    Json(entries): Json<Vec<TrainBulkArgs>>,
) -> ApiResult<Json<&'static str>> {
    if !app.mutations.knows_scheme(&scheme) {
        return Err(Error::UnknownScheme(scheme).into());
    }

    for entry in entries {
        for pattern in entry.pattern {
            app.mutations.submit_train(
                &scheme,
                TrainRequest { pattern: pattern.clone(), word: entry.word.clone() },
            )?;
            app.cache.delete(&tl_fingerprint(&scheme, &pattern));
        }
    }

    Ok(Json("Words Trained"))
}

pub async fn delete_word(
    State(app): State<SharedApp>,
    Json(args): Json<WordArgs>,
) -> ApiResult<Json<&'static str>> {
    app.pool
        .with_handle(&args.lang, |handle| handle.unlearn(&args.text))
        .await
        .map_err(|e| {
            warn!(scheme = %args.lang, word = %args.text, error = %e, "delete failed");
            e
        })?;

    // A deleted word can surface in any cached answer, so everything goes.
    app.cache.clear();

    Ok(Json("success"))
}

// ========== Sync handlers ==========

pub async fn enable_download(
    State(app): State<SharedApp>,
    Path(scheme): Path<String>,
) -> ApiResult<Json<StandardResponse>> {
    toggle_download(&app, &scheme, true)
}

pub async fn disable_download(
    State(app): State<SharedApp>,
    Path(scheme): Path<String>,
) -> ApiResult<Json<StandardResponse>> {
    toggle_download(&app, &scheme, false)
}

fn toggle_download(
    app: &SharedApp,
    scheme: &str,
    enabled: bool,
) -> ApiResult<Json<StandardResponse>> {
    if !app.pool.is_valid_scheme(scheme) {
        return Err(ApiError(Error::bad_request(format!(
            "{} is not a supported scheme",
            scheme
        ))));
    }

    app.sync.set_download_status(scheme, enabled);

    Ok(Json(ok_envelope()))
}

fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
