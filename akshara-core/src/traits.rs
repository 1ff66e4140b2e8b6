//! # Engine Traits
//!
//! The native transliteration engine is an opaque capability behind these
//! two traits. `Engine` is the thread-safe factory; `EngineHandle` is a
//! single-threaded session. Handles are not concurrency-safe, which the
//! `&mut self` receivers encode: a handle can only ever be driven by one
//! caller at a time.

use std::path::PathBuf;

use crate::error::Result;
use crate::types::{
    AdvancedSuggestions, CorpusDetails, CorpusWord, LearnStatus, SchemeDetails, Suggestion, Symbol,
};

/// Engine factory. Discovers schemes and opens per-scheme handles.
pub trait Engine: Send + Sync {
    /// All schemes this engine was compiled with. Called once at startup.
    fn scheme_details(&self) -> Vec<SchemeDetails>;

    /// Open a fresh handle for the given scheme identifier.
    fn new_handle(&self, scheme: &str) -> Result<Box<dyn EngineHandle>>;
}

/// A per-scheme engine session. Errors carry the engine's own code and
/// message verbatim, formatted `{code}:{message}`.
pub trait EngineHandle: Send {
    /// Scheme identifier this handle was opened for.
    fn scheme(&self) -> &str;

    /// Latin input to ranked native-script words.
    fn transliterate(&mut self, text: &str) -> Result<Vec<Suggestion>>;

    /// Transliterate with every suggestion bucket filled separately.
    fn transliterate_advanced(&mut self, text: &str) -> Result<AdvancedSuggestions>;

    /// Native-script input back to its Latin phonetic forms.
    fn reverse_transliterate(&mut self, text: &str) -> Result<Vec<Suggestion>>;

    /// Teach the engine that `word` is valid output. A zero weight lets
    /// the engine pick its default confidence.
    fn learn(&mut self, word: &str, weight: u64) -> Result<()>;

    /// Teach the engine that `pattern` maps to `word`.
    fn train(&mut self, pattern: &str, word: &str) -> Result<()>;

    /// Forget a learned word.
    fn unlearn(&mut self, word: &str) -> Result<()>;

    /// Bulk learn from a file of `word confidence` lines.
    fn learn_from_file(&mut self, path: &std::path::Path) -> Result<LearnStatus>;

    /// Import an exported learnings dump (.vlf).
    fn import(&mut self, path: &std::path::Path) -> Result<()>;

    /// Query the symbol table. Zero / empty criteria fields are wildcards.
    fn search_symbol_table(&mut self, criteria: &Symbol) -> Result<Vec<Symbol>>;

    /// Corpus statistics for this scheme.
    fn corpus_details(&mut self) -> Result<CorpusDetails>;

    /// Learned words ordered by id, starting at `offset`. Backs corpus
    /// page serving.
    fn learned_words(&mut self, offset: usize, limit: usize) -> Result<Vec<CorpusWord>>;

    /// Path of the compiled scheme file (.vst) served to thick clients.
    fn vst_path(&self) -> PathBuf;

    /// Path of the engine-owned learnings store.
    fn suggestions_file_path(&self) -> PathBuf;
}
