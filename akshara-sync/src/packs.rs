//! Word-pack lifecycle: an on-disk registry of installed packs, the
//! download-and-install path, and lazy gzip serving of installed pages.
//!
//! Registry layout: `{packs_dir}/{lang}/{pack}/pack.json` describes the
//! installed pages; each page's learnings live beside it as
//! `{page}.vlf`, with a `.vlf.gzip` copy written on first serve.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::info;

use akshara_core::error::{Error, Result};
use akshara_core::types::{Pack, PackPage};
use akshara_core::utils::gzip_bytes;
use akshara_engine::pool::HandlePool;

use crate::upstream::UpstreamClient;

/// Registry and installer for word packs.
pub struct PackManager {
    packs_dir: PathBuf,
    upstream: UpstreamClient,
    /// Disk scan memo, invalidated on install.
    cached: RwLock<Option<Vec<Pack>>>,
}

impl PackManager {
    pub fn new(packs_dir: PathBuf, upstream: UpstreamClient) -> Self {
        Self { packs_dir, upstream, cached: RwLock::new(None) }
    }

    /// Every installed pack, across languages.
    pub fn packs(&self) -> Result<Vec<Pack>> {
        if let Some(packs) = self.cached.read().as_ref() {
            return Ok(packs.clone());
        }

        let packs = self.scan_disk()?;
        *self.cached.write() = Some(packs.clone());
        Ok(packs)
    }

    /// Installed packs of one language. Erring when empty mirrors the
    /// public API, which answers 404 for a language with no packs.
    pub fn packs_for_lang(&self, lang: &str) -> Result<Vec<Pack>> {
        let packs: Vec<Pack> = self
            .packs()?
            .into_iter()
            .filter(|p| p.lang_code == lang)
            .collect();

        if packs.is_empty() {
            return Err(Error::NoPacksFound);
        }

        Ok(packs)
    }

    pub fn pack_info(&self, lang: &str, pack: &str) -> Result<Pack> {
        self.packs_for_lang(lang)
            .map_err(|_| Error::PackNotFound)?
            .into_iter()
            .find(|p| p.identifier == pack)
            .ok_or(Error::PackNotFound)
    }

    pub fn pack_page_info(&self, lang: &str, pack: &str, page: &str) -> Result<PackPage> {
        self.pack_info(lang, pack)?
            .page(page)
            .cloned()
            .ok_or(Error::PackPageNotFound)
    }

    fn pack_dir(&self, lang: &str, pack: &str) -> PathBuf {
        self.packs_dir.join(lang).join(pack)
    }

    fn pack_json_path(&self, lang: &str, pack: &str) -> PathBuf {
        self.pack_dir(lang, pack).join("pack.json")
    }

    /// Path of an installed page's learnings file.
    pub fn page_file_path(&self, lang: &str, pack: &str, page: &str) -> Result<PathBuf> {
        self.pack_page_info(lang, pack, page)?;

        let path = self.pack_dir(lang, pack).join(format!("{}.vlf", page));
        if !path.is_file() {
            return Err(Error::PackFileNotFound);
        }

        Ok(path)
    }

    /// Gzip the installed page on first request and return the gzip path
    /// for attachment serving.
    pub fn serve_page(&self, lang: &str, pack: &str, page: &str) -> Result<PathBuf> {
        let raw = self.page_file_path(lang, pack, page)?;
        let packed = raw.with_extension("vlf.gzip");

        if !packed.is_file() {
            let content = std::fs::read(&raw)?;
            std::fs::write(&packed, gzip_bytes(&content)?)?;
        }

        Ok(packed)
    }

    /// Download, decompress, import and register one pack page.
    /// Installing a page twice fails without touching the upstream.
    pub async fn download_page(
        &self,
        pool: &HandlePool,
        lang: &str,
        pack_id: &str,
        page_id: &str,
    ) -> Result<PathBuf> {
        if self.pack_page_info(lang, pack_id, page_id).is_ok() {
            return Err(Error::PackAlreadyInstalled);
        }

        let pack = self.upstream.pack(lang, pack_id).await?;
        let page = pack.page(page_id).cloned().ok_or(Error::PackPageNotFound)?;

        let dir = self.pack_dir(lang, pack_id);
        std::fs::create_dir_all(&dir)?;

        let body = self.upstream.download_pack_page(lang, pack_id, page_id).await?;
        let vlf_path = dir.join(format!("{}.vlf", page_id));
        decompress_to_file(&body, &vlf_path)?;

        // Learnings import, not single-word learn; the file stays on disk
        // for serving.
        pool.with_handle(lang, |handle| handle.import(&vlf_path)).await?;

        self.register_page(lang, &pack, &page)?;

        info!(lang, pack = pack_id, page = page_id, "pack page installed");

        Ok(vlf_path)
    }

    /// Merge a freshly installed page into `pack.json`, creating the pack
    /// entry on first install.
    fn register_page(&self, lang: &str, pack: &Pack, page: &PackPage) -> Result<()> {
        std::fs::create_dir_all(self.pack_dir(lang, &pack.identifier))?;
        let path = self.pack_json_path(lang, &pack.identifier);

        let mut on_disk = match self.pack_info(lang, &pack.identifier) {
            Ok(existing) => existing,
            Err(_) => Pack { pages: Vec::new(), ..pack.clone() },
        };

        if on_disk.page(&page.identifier).is_none() {
            on_disk.pages.push(page.clone());
        }

        let json = serde_json::to_vec_pretty(&on_disk)?;
        std::fs::write(path, json)?;

        *self.cached.write() = None;

        Ok(())
    }

    fn scan_disk(&self) -> Result<Vec<Pack>> {
        std::fs::create_dir_all(&self.packs_dir)?;

        let mut packs = Vec::new();

        for lang_entry in std::fs::read_dir(&self.packs_dir)? {
            let lang_dir = lang_entry?.path();
            if !lang_dir.is_dir() {
                continue;
            }

            for pack_entry in std::fs::read_dir(&lang_dir)? {
                let pack_dir = pack_entry?.path();
                if !pack_dir.is_dir() {
                    continue;
                }

                let json_path = pack_dir.join("pack.json");
                if !json_path.is_file() {
                    continue;
                }

                let content = std::fs::read(&json_path)?;
                let pack: Pack = serde_json::from_slice(&content).map_err(|e| {
                    Error::internal(format!(
                        "Parsing packs JSON failed, err: {} ({})",
                        e,
                        json_path.display()
                    ))
                })?;
                packs.push(pack);
            }
        }

        Ok(packs)
    }
}

fn decompress_to_file(gzip_body: &[u8], target: &Path) -> Result<()> {
    use std::io::copy;

    let mut decoder = flate2::read::GzDecoder::new(gzip_body);
    let mut out = std::fs::File::create(target)?;
    copy(&mut decoder, &mut out)?;
    Ok(())
}
