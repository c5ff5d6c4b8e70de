//! Shared types, error model, and configuration for pocsync.
//!
//! This crate is the foundation depended on by all other pocsync crates.
//! It provides:
//! - [`PocsyncError`]: the unified error type
//! - Call-search domain types ([`SearchFilter`], [`CallRecord`], [`TranscriptLine`])
//! - Configuration ([`AppConfig`], [`CallsClientConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CallsApiConfig, CallsClientConfig, Credentials, DefaultsConfig, DocsConfig,
    RetryPolicy, config_dir, config_file_path, database_path, init_config, load_config,
    load_config_from, resolve_calls_config,
};
pub use error::{PocsyncError, Result};
pub use types::{
    CallRecord, DEFAULT_SEARCH_FROM, SearchFilter, TranscriptLine, parse_search_bound,
    render_transcript,
};
