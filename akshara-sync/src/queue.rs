//! On-disk sync state: per-scheme download offsets and the learn queue.
//!
//! The offset file is only advanced after the page it covers has been
//! fsync-closed into the queue, so after a crash the worst case is
//! re-learning queue files that were already persisted, never
//! re-downloading an already-persisted offset.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use akshara_core::error::Result;
use akshara_core::types::CorpusWord;

/// Paths of the sync metadata tree under `{config_dir}/sync`.
#[derive(Debug, Clone)]
pub struct SyncPaths {
    root: PathBuf,
}

impl SyncPaths {
    pub fn new(config_dir: &Path) -> Self {
        Self { root: config_dir.join("sync") }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn offset_file(&self, scheme: &str) -> PathBuf {
        self.root.join(format!("{}.download.offset", scheme))
    }

    pub fn learn_queue_dir(&self, scheme: &str) -> PathBuf {
        self.root.join(format!("{}.learn.queue", scheme))
    }

    /// Create the metadata dir and the scheme's queue dir.
    pub fn ensure_dirs(&self, scheme: &str) -> Result<()> {
        std::fs::create_dir_all(self.learn_queue_dir(scheme))?;
        Ok(())
    }

    /// Persisted download offset; a missing or unreadable file means 0.
    pub fn read_offset(&self, scheme: &str) -> usize {
        std::fs::read_to_string(self.offset_file(scheme))
            .ok()
            .and_then(|content| content.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn write_offset(&self, scheme: &str, offset: usize) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.offset_file(scheme), offset.to_string())?;
        Ok(())
    }

    /// Queue files left over from earlier runs, oldest offset first.
    pub fn queued_files(&self, scheme: &str) -> Vec<PathBuf> {
        let dir = self.learn_queue_dir(scheme);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();

        files.sort_by_key(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .and_then(|ext| ext.parse::<usize>().ok())
                .unwrap_or(usize::MAX)
        });

        files
    }

    /// Write one downloaded page as `{scheme}.{offset}`, one
    /// `word confidence` line per word, fsynced before returning.
    pub fn persist_page(
        &self,
        scheme: &str,
        offset: usize,
        words: &[CorpusWord],
    ) -> Result<PathBuf> {
        let path = self.learn_queue_dir(scheme).join(format!("{}.{}", scheme, offset));

        let mut file = File::create(&path)?;
        for word in words {
            writeln!(file, "{} {}", word.word, word.confidence)?;
        }
        file.sync_all()?;

        Ok(path)
    }

    /// Remove a consumed queue file. Failures are logged, not fatal.
    pub fn remove_queued(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to delete learn queue file");
        }
    }
}
