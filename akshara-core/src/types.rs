//! # Core Types
//!
//! Data structures shared across the daemon: scheme metadata, engine
//! results, symbol-table rows, corpus pages and pack descriptors.
//! JSON field names follow the public wire format.

use serde::{Deserialize, Serialize};

/// One language configuration of the engine, discovered at startup.
/// Immutable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemeDetails {
    pub identifier: String,
    #[serde(rename = "langCode")]
    pub lang_code: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "compiledDate", default)]
    pub compiled_date: String,
    #[serde(rename = "isStable", default)]
    pub is_stable: bool,
}

/// A ranked engine answer for one input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Suggestion {
    pub word: String,
    pub weight: i64,
    #[serde(rename = "learnedOn", default)]
    pub learned_on: i64,
}

/// Result of an advanced transliteration: every bucket the engine knows
/// how to fill, empty buckets serialized as empty arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvancedSuggestions {
    #[serde(rename = "exact_words")]
    pub exact_words: Vec<Suggestion>,
    #[serde(rename = "exact_matches")]
    pub exact_matches: Vec<Suggestion>,
    #[serde(rename = "dictionary_suggestions")]
    pub dictionary_suggestions: Vec<Suggestion>,
    #[serde(rename = "pattern_dictionary_suggestions")]
    pub pattern_dictionary_suggestions: Vec<Suggestion>,
    #[serde(rename = "tokenizer_suggestions")]
    pub tokenizer_suggestions: Vec<Suggestion>,
    #[serde(rename = "greedy_tokenized")]
    pub greedy_tokenized: Vec<Suggestion>,
}

/// Symbol-table row. The same struct doubles as search criteria: zero /
/// empty fields are wildcards, and `value1` accepts a `LIKE x%` prefix
/// expression the way the native search does.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Symbol {
    #[serde(rename = "type", default)]
    pub symbol_type: i32,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub value1: String,
    #[serde(default)]
    pub value2: String,
    #[serde(rename = "matchType", default)]
    pub match_type: i32,
    #[serde(default)]
    pub weight: i32,
}

/// Well-known symbol type values in the engine's symbol table.
pub mod symbol_types {
    pub const VOWEL: i32 = 1;
    pub const CONSONANT: i32 = 2;
    pub const SYMBOL: i32 = 6;
    pub const ANUSVARA: i32 = 7;
    pub const VISARGA: i32 = 8;
    pub const VIRAMA: i32 = 9;
    pub const OTHER: i32 = 10;
    pub const ZWNJ: i32 = 11;
    pub const ZWJ: i32 = 12;
    pub const PERIOD: i32 = 13;
}

/// A pattern that maps exactly to its letter, as opposed to a possibility.
pub const MATCH_EXACT: i32 = 1;

/// Corpus statistics of one scheme.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusDetails {
    #[serde(rename = "wordsCount")]
    pub words_count: usize,
}

/// Outcome of a bulk learn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LearnStatus {
    #[serde(rename = "totalWords")]
    pub total_words: usize,
    pub failed: usize,
}

/// One learned word as served in a corpus page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusWord {
    pub id: u64,
    pub word: String,
    pub confidence: u64,
}

/// A published bundle of learnings for one language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pack {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "lang")]
    pub lang_code: String,
    #[serde(default)]
    pub pages: Vec<PackPage>,
}

/// One page of a pack. Page identifiers are unique across all packs of a
/// language, e.g. `ml-basic-1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackPage {
    pub identifier: String,
    pub page: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub size: u64,
}

impl Pack {
    pub fn page(&self, page_identifier: &str) -> Option<&PackPage> {
        self.pages.iter().find(|p| p.identifier == page_identifier)
    }
}
