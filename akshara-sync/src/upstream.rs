//! HTTP client for the upstream peer. One client per daemon; errors carry
//! the upstream's body text so admin requests see the real reason.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use akshara_core::error::{Error, Result};
use akshara_core::types::{CorpusDetails, CorpusWord, Pack};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// `GET /meta/{scheme}` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetaResponse {
    pub result: CorpusDetails,
}

/// `GET /download/{scheme}/{offset}` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub count: usize,
    #[serde(default)]
    pub words: Vec<CorpusWord>,
}

/// Client for the corpus and pack endpoints of an upstream daemon.
#[derive(Clone)]
pub struct UpstreamClient {
    base: String,
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(Error::upstream)?;

        Ok(Self { base: base.into(), http })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    async fn get_ok(&self, url: &str) -> Result<reqwest::Response> {
        debug!(url, "GET");

        let response = self.http.get(url).send().await.map_err(Error::upstream)?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream { message: body });
        }

        Ok(response)
    }

    /// Corpus size of a scheme on the peer.
    pub async fn corpus_size(&self, scheme: &str) -> Result<usize> {
        let url = format!("{}/meta/{}", self.base, scheme);
        let meta: MetaResponse = self.get_ok(&url).await?.json().await.map_err(Error::upstream)?;
        Ok(meta.result.words_count)
    }

    /// One corpus page starting at `offset`.
    pub async fn download_page(&self, scheme: &str, offset: usize) -> Result<DownloadResponse> {
        let url = format!("{}/download/{}/{}", self.base, scheme, offset);
        self.get_ok(&url).await?.json().await.map_err(Error::upstream)
    }

    /// Pack descriptor from the peer's registry.
    pub async fn pack(&self, lang: &str, pack: &str) -> Result<Pack> {
        let url = format!("{}/packs/{}/{}", self.base, lang, pack);
        self.get_ok(&url).await?.json().await.map_err(|e| Error::Upstream {
            message: format!("Parsing packs JSON failed, err: {}", e),
        })
    }

    /// Raw gzip body of a pack page.
    pub async fn download_pack_page(&self, lang: &str, pack: &str, page: &str) -> Result<Bytes> {
        let url = format!("{}/packs/{}/{}/{}/download", self.base, lang, pack, page);
        self.get_ok(&url).await?.bytes().await.map_err(Error::upstream)
    }
}
