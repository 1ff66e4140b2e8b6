//! # Akshara Core
//!
//! Shared building blocks for the Akshara transliteration daemon:
//! - Core data structures (schemes, suggestions, symbols, packs)
//! - The engine capability traits every backend implements
//! - Error types
//! - Daemon configuration
//! - Metrics collection

pub mod config;
pub mod error;
pub mod metrics;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::DaemonConfig;
pub use error::{Error, Result};
pub use types::{
    AdvancedSuggestions, CorpusDetails, CorpusWord, LearnStatus, Pack, PackPage, SchemeDetails,
    Suggestion, Symbol,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
