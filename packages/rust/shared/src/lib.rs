//! Shared types, error model, and configuration for cfpscout.
//!
//! This crate is the foundation depended on by all other cfpscout crates.
//! It provides:
//! - [`CfpScoutError`], the unified error type
//! - Domain types ([`StoredUrl`], [`ExtractedData`], [`CfpRecord`], [`FailureReason`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], [`RetryPolicy`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ExtractionSection, ExtractionSettings, FetchConfig, FetchSection,
    RetryPolicy, RetrySection, config_dir, config_file_path, expand_home, init_config,
    load_config, load_config_from,
};
pub use error::{CfpScoutError, Result};
pub use types::{
    CfpRecord, ExtractedData, FailureReason, FetchMethod, StoredUrl, UrlStatus, normalize_url,
    record_id,
};
