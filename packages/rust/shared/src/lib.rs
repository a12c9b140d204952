//! Shared types, error model, and configuration for agent-bridge.
//!
//! This crate is the foundation depended on by all other agent-bridge crates.
//! It provides:
//! - [`BridgeError`]: the unified error type
//! - The canonical knowledge model ([`KnowledgeUnit`], [`KnowledgeTree`],
//!   [`MergedKnowledgeTree`]) and recoverable [`Warning`]s
//! - Configuration and the persisted source registry ([`AppConfig`], [`SourceRecord`],
//!   [`BridgeHome`])

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BUILTIN_SOURCE_NAME, BridgeHome, DefaultsConfig, HOME_ENV_VAR, PROJECT_SOURCE_NAME,
    SourceOrigin, SourceRecord, config_dir, load_config, load_config_from, validate_source_name,
};
pub use error::{BridgeError, Result};
pub use types::{
    KnowledgeKind, KnowledgeTree, KnowledgeUnit, MergedKnowledgeTree, MergedUnit, MetaValue,
    Metadata, Segment, UnitKey, Warning, WarningKind,
};
