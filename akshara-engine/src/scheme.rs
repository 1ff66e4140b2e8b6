//! Scheme introspection: categorized letter and pattern definitions built
//! from the engine's symbol table. Used by client UIs to render keyboard
//! help for a scheme.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use akshara_core::error::Result;
use akshara_core::types::{symbol_types, SchemeDetails, Symbol, MATCH_EXACT};

use crate::pool::HandlePool;

/// One letter of a scheme with the patterns that produce it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemeDefinition {
    pub letter: String,
    pub category: String,
    pub exact: Vec<String>,
    pub possibility: Vec<String>,
}

#[derive(Default)]
struct PatternMatches {
    exact: Vec<String>,
    possibility: Vec<String>,
}

/// Malayalam consonant groups. Domain data: the traditional varga rows
/// plus the chillu letters.
const ML_CONSONANT_SETS: &[(&str, &[&str])] = &[
    ("ക", &["ക", "ഖ", "ഗ", "ഘ", "ങ"]),
    ("ച", &["ച", "ഛ", "ജ", "ഝ", "ഞ"]),
    ("ട", &["ട", "ഠ", "ഡ", "ഢ", "ണ"]),
    ("ത", &["ത", "ഥ", "ദ", "ധ", "ന", "ഩ"]),
    ("പ", &["പ", "ഫ", "ബ", "ഭ", "മ"]),
    ("യ", &["യ", "ര", "ല", "വ", "ശ", "ഷ", "സ", "ഹ", "ള", "ഴ", "റ"]),
    ("ചില്ലക്ഷരം", &["ൻ", "ർ", "ൽ", "ൾ", "ൺ", "ൿ"]),
];

/// Named categories for the trailing symbol-table types.
const OTHER_CHARACTER_TYPES: &[(i32, &str)] = &[
    (symbol_types::SYMBOL, "Symbol"),
    (symbol_types::ANUSVARA, "Anusvara"),
    (symbol_types::VISARGA, "Visarga"),
    (symbol_types::VIRAMA, "Virama"),
    (symbol_types::OTHER, "Other"),
    (symbol_types::ZWNJ, "ZWNJ - Zero Width Non Joiner"),
    (symbol_types::ZWJ, "ZWJ - Zero Width Joiner"),
    (symbol_types::PERIOD, "Period"),
];

/// Group symbol rows by target letter, splitting patterns into exact
/// matches and possibilities. BTreeMap keeps letters sorted.
fn group_by_letter(results: &[Symbol]) -> BTreeMap<String, PatternMatches> {
    let mut items: BTreeMap<String, PatternMatches> = BTreeMap::new();

    for row in results {
        let entry = items.entry(row.value1.clone()).or_default();
        if row.match_type == MATCH_EXACT {
            entry.exact.push(row.pattern.clone());
        } else {
            entry.possibility.push(row.pattern.clone());
        }
    }

    items
}

fn categorized(results: &[Symbol], category: &str) -> Vec<SchemeDefinition> {
    group_by_letter(results)
        .into_iter()
        .map(|(letter, matches)| SchemeDefinition {
            category: if category.is_empty() { letter.clone() } else { category.to_string() },
            letter,
            exact: matches.exact,
            possibility: matches.possibility,
        })
        .collect()
}

async fn search(pool: &HandlePool, scheme: &str, criteria: Symbol) -> Result<Vec<Symbol>> {
    pool.with_handle(scheme, |handle| handle.search_symbol_table(&criteria)).await
}

/// Full categorized definitions for a scheme: vowels, consonants for
/// Malayalam, and the trailing character classes.
pub async fn definitions(
    pool: &HandlePool,
    details: &SchemeDetails,
) -> Result<Vec<SchemeDefinition>> {
    let scheme = details.identifier.as_str();

    // Vowels, categorized under the first vowel of the script.
    let vowels = search(
        pool,
        scheme,
        Symbol { symbol_type: symbol_types::VOWEL, ..Default::default() },
    )
    .await?;

    let vowel_category = vowels.first().map(|s| s.value1.clone()).unwrap_or_default();
    let mut result = categorized(&vowels, &vowel_category);

    if details.lang_code == "ml" {
        result.extend(ml_consonants(pool, scheme).await?);
    }

    result.extend(other_characters(pool, scheme).await?);

    Ok(result)
}

async fn ml_consonants(pool: &HandlePool, scheme: &str) -> Result<Vec<SchemeDefinition>> {
    let consonants = search(
        pool,
        scheme,
        Symbol { symbol_type: symbol_types::CONSONANT, ..Default::default() },
    )
    .await?;

    let items = group_by_letter(&consonants);

    let mut result = Vec::new();
    for (category, letters) in ML_CONSONANT_SETS {
        for letter in *letters {
            let matches = items.get(*letter);
            result.push(SchemeDefinition {
                letter: (*letter).to_string(),
                category: (*category).to_string(),
                exact: matches.map(|m| m.exact.clone()).unwrap_or_default(),
                possibility: matches.map(|m| m.possibility.clone()).unwrap_or_default(),
            });
        }
    }

    Ok(result)
}

async fn other_characters(pool: &HandlePool, scheme: &str) -> Result<Vec<SchemeDefinition>> {
    let mut result = Vec::new();

    for (symbol_type, category) in OTHER_CHARACTER_TYPES {
        let rows = search(
            pool,
            scheme,
            Symbol { symbol_type: *symbol_type, ..Default::default() },
        )
        .await?;
        result.extend(categorized(&rows, category));
    }

    Ok(result)
}

/// Definitions for every letter combination starting with `letter`.
/// The category is the combining mark (third character) when present.
pub async fn letter_definitions(
    pool: &HandlePool,
    details: &SchemeDetails,
    letter: &str,
) -> Result<Vec<SchemeDefinition>> {
    let rows = search(
        pool,
        &details.identifier,
        Symbol { value1: format!("LIKE {}%", letter), ..Default::default() },
    )
    .await?;

    let result = group_by_letter(&rows)
        .into_iter()
        .map(|(combination, matches)| {
            let category = combination
                .chars()
                .nth(2)
                .map(|c| c.to_string())
                .unwrap_or_else(|| letter.to_string());
            SchemeDefinition {
                letter: combination,
                category,
                exact: matches.exact,
                possibility: matches.possibility,
            }
        })
        .collect();

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use akshara_core::config::DaemonConfig;
    use akshara_core::metrics::Metrics;

    use crate::memory::MemoryEngine;

    fn symbol(symbol_type: i32, pattern: &str, value1: &str, match_type: i32) -> Symbol {
        Symbol {
            symbol_type,
            pattern: pattern.to_string(),
            value1: value1.to_string(),
            value2: String::new(),
            match_type,
            weight: 0,
        }
    }

    fn fixture() -> Arc<HandlePool> {
        let engine = MemoryEngine::new(vec![SchemeDetails {
            identifier: "ml".into(),
            lang_code: "ml".into(),
            display_name: "Malayalam".into(),
            author: String::new(),
            compiled_date: String::new(),
            is_stable: true,
        }]);
        engine.set_symbols(
            "ml",
            vec![
                symbol(symbol_types::VOWEL, "a", "അ", MATCH_EXACT),
                symbol(symbol_types::VOWEL, "aa", "ആ", MATCH_EXACT),
                symbol(symbol_types::VOWEL, "A", "ആ", 2),
                symbol(symbol_types::CONSONANT, "ka", "ക", MATCH_EXACT),
                symbol(symbol_types::CONSONANT, "kha", "ഖ", MATCH_EXACT),
                symbol(symbol_types::CONSONANT, "ga", "ഗ", MATCH_EXACT),
                symbol(symbol_types::VIRAMA, "~", "്", MATCH_EXACT),
                symbol(symbol_types::CONSONANT, "kaa", "കാ", MATCH_EXACT),
            ],
        );

        let mut config = DaemonConfig::default();
        config.max_handle_count.insert("default".to_string(), 2);
        Arc::new(HandlePool::new(Arc::new(engine), &config, Metrics::new()).unwrap())
    }

    #[tokio::test]
    async fn vowels_sorted_and_categorized_under_first_vowel() {
        let pool = fixture();
        let details = pool.scheme_details("ml").unwrap().clone();

        let defs = definitions(&pool, &details).await.unwrap();

        let vowels: Vec<_> = defs.iter().filter(|d| d.category == "അ").collect();
        assert_eq!(vowels.len(), 2);
        assert_eq!(vowels[0].letter, "അ");
        assert_eq!(vowels[1].letter, "ആ");
        assert_eq!(vowels[1].exact, vec!["aa"]);
        assert_eq!(vowels[1].possibility, vec!["A"]);
    }

    #[tokio::test]
    async fn ml_schemes_include_consonant_buckets() {
        let pool = fixture();
        let details = pool.scheme_details("ml").unwrap().clone();

        let defs = definitions(&pool, &details).await.unwrap();

        let ka = defs.iter().find(|d| d.letter == "ക").unwrap();
        assert_eq!(ka.category, "ക");
        assert_eq!(ka.exact, vec!["ka"]);

        // Letters without symbols still appear in their bucket, empty.
        let nga = defs.iter().find(|d| d.letter == "ങ").unwrap();
        assert!(nga.exact.is_empty());

        // The virama shows up under its named category.
        let virama = defs.iter().find(|d| d.category == "Virama").unwrap();
        assert_eq!(virama.letter, "്");
    }

    #[tokio::test]
    async fn letter_definitions_group_combinations() {
        let pool = fixture();
        let details = pool.scheme_details("ml").unwrap().clone();

        let defs = letter_definitions(&pool, &details, "ക").await.unwrap();
        let letters: Vec<_> = defs.iter().map(|d| d.letter.as_str()).collect();
        assert!(letters.contains(&"ക"));
        assert!(letters.contains(&"കാ"));

        let plain = defs.iter().find(|d| d.letter == "ക").unwrap();
        assert_eq!(plain.category, "ക");
    }

    #[tokio::test]
    async fn unknown_letter_yields_empty_list() {
        let pool = fixture();
        let details = pool.scheme_details("ml").unwrap().clone();

        let defs = letter_definitions(&pool, &details, "z").await.unwrap();
        assert!(defs.is_empty());
    }
}
