//! agentbridge-core: overlay merge and the end-to-end pipeline.
//!
//! - [`merge`]: combine ordered knowledge layers into one merged tree
//! - [`pipeline`]: sync sources, build the tree, render and remove targets
//! - [`report`]: warnings and per-source/per-target outcomes of a run
//! - [`status`]: what is registered, synced, and rendered

pub mod merge;
pub mod pipeline;
pub mod report;
pub mod status;

pub use merge::{PROJECT_SOURCE_NAME, SourceLayers, merge};
pub use pipeline::{
    BuiltTree, ProgressReporter, SilentProgress, all_targets, build_tree, remove_targets,
    render_targets, sync_sources,
};
pub use report::{Outcome, RunReport, SourceOutcome, SourceStatus, TargetOutcome, TargetResult};
pub use status::{StatusReport, collect_status};
