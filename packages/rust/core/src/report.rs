//! Per-run outcome aggregation.

use agentbridge_shared::Warning;
use serde::Serialize;

/// Overall result of one command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    /// Completed, but something was skipped or a source was dropped.
    SucceededWithWarnings,
    /// At least one requested target was not rendered or removed.
    Failed,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Succeeded => 0,
            Self::Failed => 1,
            Self::SucceededWithWarnings => 2,
        }
    }
}

/// What happened to one source during sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Cloned,
    Updated,
    Current,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: SourceStatus,
}

/// What happened to one requested target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetResult {
    Rendered {
        files: usize,
        written: usize,
        removed: usize,
    },
    Removed {
        files: usize,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
    pub target: String,
    #[serde(flatten)]
    pub result: TargetResult,
}

impl TargetOutcome {
    pub fn failed(target: impl Into<String>, error: impl ToString) -> Self {
        Self {
            target: target.into(),
            result: TargetResult::Failed {
                error: error.to_string(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.result, TargetResult::Failed { .. })
    }
}

/// Everything a command surfaces at the end: warnings once, then outcomes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetOutcome>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warnings(warnings: Vec<Warning>) -> Self {
        Self {
            warnings,
            ..Self::default()
        }
    }

    pub fn failed_targets(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.targets.iter().filter(|t| t.is_failed())
    }

    pub fn outcome(&self) -> Outcome {
        if self.failed_targets().next().is_some() {
            Outcome::Failed
        } else if !self.warnings.is_empty() {
            Outcome::SucceededWithWarnings
        } else {
            Outcome::Succeeded
        }
    }
}
