//! # Akshara HTTP API
//!
//! Translates HTTP requests into engine-runtime calls: the read path goes
//! through the response cache and handle pool, mutations go through the
//! per-scheme queues, and the admin surface drives sync and packs.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use server::{build, router, App, SharedApp};
