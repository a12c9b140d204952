//! Target converters for agent-bridge.
//!
//! A [`Converter`] maps the merged knowledge tree onto one assistant tool's
//! on-disk schema. Conversion is pure; writing goes through the shared
//! transactional [`writer`] which keeps a manifest per target so stale files
//! can be cleaned up and a target can be removed again.
//!
//! Targets register through [`registry()`]:
//!
//! | id | output |
//! |----|--------|
//! | `agent` | `.agent-bridge/kit/` |
//! | `copilot` | `.github/` |
//! | `cursor` | `.cursor/` |
//! | `kiro` | `.kiro/` |
//! | `opencode` | `.opencode/` |
//! | `windsurf` | `.windsurf/` |

pub mod converter;
pub mod profiles;
pub mod registry;
pub mod targets;
pub mod tool_config;
pub mod writer;

pub use converter::{Artifact, Converter, TargetInfo, TargetStatus};
pub use registry::{ConverterRegistry, Registrar, registry};
pub use writer::{Manifest, ManifestEntry, RenderSummary, read_manifest};
