//! Knowledge sources: where units come from before they are merged.
//!
//! - [`layout`]: classify a kind directory into single files and bundles
//! - [`loader`]: turn a knowledge root into a [`KnowledgeTree`](agentbridge_shared::KnowledgeTree)
//! - [`adapters`]: remote (git), local, and built-in origins behind [`SourceAdapter`]

pub mod adapters;
pub mod layout;
pub mod loader;

pub use adapters::{
    BUILTIN_BUNDLE_VERSION, BuiltinAdapter, LocalAdapter, RemoteAdapter, SourceAdapter,
    SourceSnapshot, SyncOutcome, adapter_for,
};
pub use layout::{LayoutEntry, plan_entries};
pub use loader::{RootLoad, TOOL_CONFIG_FILE, load_root, parse_tool_config};
