//! In-process reference engine.
//!
//! A small but real transliteration backend: a symbol table drives greedy
//! tokenization both ways, and learned words plus trained patterns feed
//! the ranked suggestion buckets. It stands exactly where the native
//! library would, which lets the daemon run and the whole runtime be
//! exercised end to end without native bindings.
//!
//! Scheme definitions load from TOML files, one per scheme:
//!
//! ```toml
//! identifier = "ml"
//! lang_code = "ml"
//! display_name = "Malayalam"
//!
//! [[symbols]]
//! type = 1
//! pattern = "a"
//! value1 = "അ"
//! match_type = 1
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::info;

use akshara_core::error::{Error, Result};
use akshara_core::traits::{Engine, EngineHandle};
use akshara_core::types::{
    AdvancedSuggestions, CorpusDetails, CorpusWord, LearnStatus, SchemeDetails, Suggestion, Symbol,
    MATCH_EXACT,
};
use akshara_core::utils::unix_now;

const ERR_INVALID_INPUT: i32 = 2;
const ERR_WORD_NOT_FOUND: i32 = 5;

#[derive(Debug, Clone)]
struct LearnedWord {
    id: u64,
    confidence: u64,
    learned_on: i64,
}

#[derive(Default)]
struct SchemeState {
    symbols: Vec<Symbol>,
    words: HashMap<String, LearnedWord>,
    /// pattern -> words it produces, trained or derived on learn
    patterns: HashMap<String, Vec<String>>,
    next_id: u64,
}

struct SchemeEntry {
    details: SchemeDetails,
    state: Arc<RwLock<SchemeState>>,
    vst_path: PathBuf,
}

/// The in-process engine. Handles share one state per scheme, the same
/// way native handles share one learnings store on disk.
pub struct MemoryEngine {
    schemes: Vec<SchemeEntry>,
    root: PathBuf,
}

#[derive(Deserialize)]
struct SchemeFile {
    identifier: String,
    lang_code: String,
    display_name: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    compiled_date: String,
    #[serde(default)]
    is_stable: bool,
    #[serde(default)]
    symbols: Vec<SymbolRow>,
}

#[derive(Deserialize)]
struct SymbolRow {
    #[serde(rename = "type", default)]
    symbol_type: i32,
    pattern: String,
    value1: String,
    #[serde(default)]
    value2: String,
    #[serde(default = "default_match_type")]
    match_type: i32,
    #[serde(default)]
    weight: i32,
}

fn default_match_type() -> i32 {
    MATCH_EXACT
}

impl MemoryEngine {
    pub fn new(schemes: Vec<SchemeDetails>) -> Self {
        let root = std::env::temp_dir().join("aksharad");
        let schemes = schemes
            .into_iter()
            .map(|details| {
                let vst_path = root.join(format!("{}.vst", details.identifier));
                SchemeEntry { details, state: Arc::default(), vst_path }
            })
            .collect();
        Self { schemes, root }
    }

    /// Load every `*.toml` scheme definition under `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut schemes = Vec::new();

        let entries = std::fs::read_dir(dir)?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().map(|e| e == "toml").unwrap_or(false) {
                let content = std::fs::read_to_string(&path)?;
                let file: SchemeFile = toml::from_str(&content).map_err(|e| {
                    Error::Configuration {
                        message: format!("bad scheme file {}: {}", path.display(), e),
                    }
                })?;

                let details = SchemeDetails {
                    identifier: file.identifier,
                    lang_code: file.lang_code,
                    display_name: file.display_name,
                    author: file.author,
                    compiled_date: file.compiled_date,
                    is_stable: file.is_stable,
                };

                let state = SchemeState {
                    symbols: file
                        .symbols
                        .into_iter()
                        .map(|s| Symbol {
                            symbol_type: s.symbol_type,
                            pattern: s.pattern,
                            value1: s.value1,
                            value2: s.value2,
                            match_type: s.match_type,
                            weight: s.weight,
                        })
                        .collect(),
                    ..Default::default()
                };

                info!(scheme = %details.identifier, path = %path.display(), "loaded scheme");
                schemes.push(SchemeEntry {
                    details,
                    state: Arc::new(RwLock::new(state)),
                    vst_path: path,
                });
            }
        }

        Ok(Self { schemes, root: dir.to_path_buf() })
    }

    /// Replace the symbol table of a scheme.
    pub fn set_symbols(&self, scheme: &str, symbols: Vec<Symbol>) {
        if let Some(entry) = self.schemes.iter().find(|s| s.details.identifier == scheme) {
            entry.state.write().symbols = symbols;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}

impl Engine for MemoryEngine {
    fn scheme_details(&self) -> Vec<SchemeDetails> {
        self.schemes.iter().map(|s| s.details.clone()).collect()
    }

    fn new_handle(&self, scheme: &str) -> Result<Box<dyn EngineHandle>> {
        let entry = self
            .schemes
            .iter()
            .find(|s| s.details.identifier == scheme)
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))?;

        Ok(Box::new(MemoryHandle {
            scheme: entry.details.identifier.clone(),
            state: entry.state.clone(),
            vst_path: entry.vst_path.clone(),
            suggestions_path: self.root.join(format!("{}.learnings", scheme)),
        }))
    }
}

struct MemoryHandle {
    scheme: String,
    state: Arc<RwLock<SchemeState>>,
    vst_path: PathBuf,
    suggestions_path: PathBuf,
}

impl SchemeState {
    /// Longest symbol whose pattern is a prefix of `input`, exact matches
    /// preferred over possibilities.
    fn longest_pattern<'a>(&'a self, input: &str) -> Option<&'a Symbol> {
        self.symbols
            .iter()
            .filter(|s| input.starts_with(s.pattern.as_str()) && !s.pattern.is_empty())
            .max_by_key(|s| (s.pattern.len(), s.match_type == MATCH_EXACT))
    }

    /// Longest symbol whose letter is a prefix of `input`.
    fn longest_letter<'a>(&'a self, input: &str) -> Option<&'a Symbol> {
        self.symbols
            .iter()
            .filter(|s| input.starts_with(s.value1.as_str()) && !s.value1.is_empty())
            .max_by_key(|s| (s.value1.len(), s.match_type == MATCH_EXACT))
    }

    /// Greedy Latin-to-native tokenization. Characters no symbol covers
    /// pass through untouched.
    fn tokenize(&self, text: &str) -> String {
        let mut rest = text;
        let mut out = String::new();

        while !rest.is_empty() {
            match self.longest_pattern(rest) {
                Some(symbol) => {
                    out.push_str(&symbol.value1);
                    rest = &rest[symbol.pattern.len()..];
                }
                None => {
                    let mut chars = rest.chars();
                    if let Some(c) = chars.next() {
                        out.push(c);
                    }
                    rest = chars.as_str();
                }
            }
        }

        out
    }

    /// Greedy native-to-Latin tokenization, the inverse of `tokenize`.
    fn detokenize(&self, text: &str) -> String {
        let mut rest = text;
        let mut out = String::new();

        while !rest.is_empty() {
            match self.longest_letter(rest) {
                Some(symbol) => {
                    out.push_str(&symbol.pattern);
                    rest = &rest[symbol.value1.len()..];
                }
                None => {
                    let mut chars = rest.chars();
                    if let Some(c) = chars.next() {
                        out.push(c);
                    }
                    rest = chars.as_str();
                }
            }
        }

        out
    }

    fn suggestion_for(&self, word: &str) -> Suggestion {
        match self.words.get(word) {
            Some(learned) => Suggestion {
                word: word.to_string(),
                weight: learned.confidence as i64,
                learned_on: learned.learned_on,
            },
            None => Suggestion { word: word.to_string(), weight: 0, learned_on: 0 },
        }
    }

    fn words_for_pattern(&self, pattern: &str) -> Vec<Suggestion> {
        let mut suggestions: Vec<Suggestion> = self
            .patterns
            .get(pattern)
            .map(|words| words.iter().map(|w| self.suggestion_for(w)).collect())
            .unwrap_or_default();
        suggestions.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.word.cmp(&b.word)));
        suggestions
    }

    fn words_for_pattern_prefix(&self, prefix: &str) -> Vec<Suggestion> {
        let mut seen = Vec::new();
        let mut suggestions = Vec::new();

        for (pattern, words) in &self.patterns {
            if pattern.starts_with(prefix) && pattern != prefix {
                for word in words {
                    if !seen.contains(word) {
                        seen.push(word.clone());
                        suggestions.push(self.suggestion_for(word));
                    }
                }
            }
        }

        suggestions.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.word.cmp(&b.word)));
        suggestions
    }

    fn insert_word(&mut self, word: &str, confidence: u64) -> &mut LearnedWord {
        self.next_id += 1;
        let id = self.next_id;
        self.words.entry(word.to_string()).or_insert(LearnedWord {
            id,
            confidence,
            learned_on: unix_now(),
        })
    }

    fn map_pattern(&mut self, pattern: &str, word: &str) {
        let words = self.patterns.entry(pattern.to_string()).or_default();
        if !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }

    fn learn_word(&mut self, word: &str, weight: u64) -> Result<()> {
        let word = word.trim();
        if word.is_empty() {
            return Err(Error::engine(ERR_INVALID_INPUT, "nothing to learn"));
        }

        if let Some(existing) = self.words.get_mut(word) {
            existing.confidence = if weight > 0 { weight } else { existing.confidence + 1 };
            existing.learned_on = unix_now();
        } else {
            self.insert_word(word, weight.max(1));
        }

        // Derive the phonetic pattern so the word is reachable from
        // Latin input straight away.
        let pattern = self.detokenize(word);
        if !pattern.is_empty() {
            self.map_pattern(&pattern, word);
        }

        Ok(())
    }
}

impl EngineHandle for MemoryHandle {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn transliterate(&mut self, text: &str) -> Result<Vec<Suggestion>> {
        if text.is_empty() {
            return Err(Error::engine(ERR_INVALID_INPUT, "empty input"));
        }

        let state = self.state.read();

        let mut suggestions = state.words_for_pattern(text);
        for extra in state.words_for_pattern_prefix(text) {
            if !suggestions.iter().any(|s| s.word == extra.word) {
                suggestions.push(extra);
            }
        }

        let tokenized = state.tokenize(text);
        if !tokenized.is_empty() && !suggestions.iter().any(|s| s.word == tokenized) {
            suggestions.push(Suggestion { word: tokenized, weight: 0, learned_on: 0 });
        }

        Ok(suggestions)
    }

    fn transliterate_advanced(&mut self, text: &str) -> Result<AdvancedSuggestions> {
        if text.is_empty() {
            return Err(Error::engine(ERR_INVALID_INPUT, "empty input"));
        }

        let state = self.state.read();

        let exact_words = state.words_for_pattern(text);

        let exact_matches = state
            .symbols
            .iter()
            .filter(|s| s.pattern == text)
            .map(|s| Suggestion { word: s.value1.clone(), weight: s.weight as i64, learned_on: 0 })
            .collect();

        let pattern_dictionary_suggestions = state.words_for_pattern_prefix(text);

        let tokenized = state.tokenize(text);
        let tokenizer_suggestions = if tokenized.is_empty() {
            Vec::new()
        } else {
            vec![Suggestion { word: tokenized.clone(), weight: 0, learned_on: 0 }]
        };

        let greedy_tokenized = if tokenized.is_empty() {
            Vec::new()
        } else {
            vec![Suggestion { word: tokenized, weight: 0, learned_on: 0 }]
        };

        Ok(AdvancedSuggestions {
            exact_words,
            exact_matches,
            dictionary_suggestions: Vec::new(),
            pattern_dictionary_suggestions,
            tokenizer_suggestions,
            greedy_tokenized,
        })
    }

    fn reverse_transliterate(&mut self, text: &str) -> Result<Vec<Suggestion>> {
        if text.is_empty() {
            return Err(Error::engine(ERR_INVALID_INPUT, "empty input"));
        }

        let state = self.state.read();
        let pattern = state.detokenize(text);
        if pattern.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![Suggestion { word: pattern, weight: 0, learned_on: 0 }])
    }

    fn learn(&mut self, word: &str, weight: u64) -> Result<()> {
        self.state.write().learn_word(word, weight)
    }

    fn train(&mut self, pattern: &str, word: &str) -> Result<()> {
        let pattern = pattern.trim();
        let word = word.trim();
        if pattern.is_empty() || word.is_empty() {
            return Err(Error::engine(ERR_INVALID_INPUT, "nothing to train"));
        }

        let mut state = self.state.write();
        state.learn_word(word, 0)?;
        state.map_pattern(pattern, word);
        Ok(())
    }

    fn unlearn(&mut self, word: &str) -> Result<()> {
        let word = word.trim();
        let mut state = self.state.write();

        if state.words.remove(word).is_none() {
            return Err(Error::engine(ERR_WORD_NOT_FOUND, "word not found"));
        }

        for words in state.patterns.values_mut() {
            words.retain(|w| w != word);
        }
        state.patterns.retain(|_, words| !words.is_empty());

        Ok(())
    }

    fn learn_from_file(&mut self, path: &Path) -> Result<LearnStatus> {
        let content = std::fs::read_to_string(path)?;
        let mut state = self.state.write();

        let mut total_words = 0;
        let mut failed = 0;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            total_words += 1;

            let mut parts = line.rsplitn(2, ' ');
            let (word, confidence) = match (parts.next(), parts.next()) {
                (Some(confidence), Some(word)) => {
                    (word, confidence.parse::<u64>().unwrap_or(0))
                }
                _ => (line, 0),
            };

            if state.learn_word(word, confidence).is_err() {
                failed += 1;
            }
        }

        Ok(LearnStatus { total_words, failed })
    }

    fn import(&mut self, path: &Path) -> Result<()> {
        // The reference engine's export format is the learn-queue line
        // format, so import shares the bulk-learn path.
        self.learn_from_file(path)?;
        Ok(())
    }

    fn search_symbol_table(&mut self, criteria: &Symbol) -> Result<Vec<Symbol>> {
        let state = self.state.read();

        let value1_prefix = criteria
            .value1
            .strip_prefix("LIKE ")
            .and_then(|rest| rest.strip_suffix('%'))
            .map(str::to_string);

        let rows = state
            .symbols
            .iter()
            .filter(|s| criteria.symbol_type == 0 || s.symbol_type == criteria.symbol_type)
            .filter(|s| criteria.pattern.is_empty() || s.pattern == criteria.pattern)
            .filter(|s| match &value1_prefix {
                Some(prefix) => s.value1.starts_with(prefix.as_str()),
                None => criteria.value1.is_empty() || s.value1 == criteria.value1,
            })
            .filter(|s| criteria.match_type == 0 || s.match_type == criteria.match_type)
            .cloned()
            .collect();

        Ok(rows)
    }

    fn corpus_details(&mut self) -> Result<CorpusDetails> {
        Ok(CorpusDetails { words_count: self.state.read().words.len() })
    }

    fn learned_words(&mut self, offset: usize, limit: usize) -> Result<Vec<CorpusWord>> {
        let state = self.state.read();

        let mut all: Vec<(&String, &LearnedWord)> = state.words.iter().collect();
        all.sort_by_key(|(_, w)| w.id);

        Ok(all
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(word, learned)| CorpusWord {
                id: learned.id,
                word: word.clone(),
                confidence: learned.confidence,
            })
            .collect())
    }

    fn vst_path(&self) -> PathBuf {
        self.vst_path.clone()
    }

    fn suggestions_file_path(&self) -> PathBuf {
        self.suggestions_path.clone()
    }
}
