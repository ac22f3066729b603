//! Types shared across injectors.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::prompt::PromptType;
use crate::record::RecordError;
use crate::services::error::ServiceError;

/// Which injector variant to run.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum InjectorKind {
    /// Pass entries through unchanged
    #[default]
    Identity,
    /// NER labels plus number normalization
    General,
    /// Entity-linking type tags after linked mentions
    #[value(alias = "entityLinking")]
    #[serde(alias = "entityLinking")]
    EntityLinking,
    /// Predicted column types inserted per column
    #[value(alias = "sherlock")]
    #[serde(alias = "sherlock")]
    ColumnType,
}

impl InjectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectorKind::Identity => "identity",
            InjectorKind::General => "general",
            InjectorKind::EntityLinking => "entity-linking",
            InjectorKind::ColumnType => "column-type",
        }
    }

    /// Suffix appended to an input path to name its cached output.
    pub fn output_suffix(&self, prompt_type: PromptType) -> String {
        match self {
            InjectorKind::Identity => ".identity.dk".to_string(),
            InjectorKind::General => ".dk".to_string(),
            InjectorKind::EntityLinking => ".refined.dk".to_string(),
            InjectorKind::ColumnType => format!(".prompt_type{}.sherlock.dk", prompt_type.code()),
        }
    }

    /// Conventional cache path for `input`.
    pub fn output_path(&self, input: &Path, prompt_type: PromptType) -> PathBuf {
        let mut name = OsString::from(input.as_os_str());
        name.push(self.output_suffix(prompt_type));
        PathBuf::from(name)
    }
}

impl fmt::Display for InjectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset split of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted while running an injector over a task's splits.
/// Used by the CLI to drive progress output.
#[derive(Debug, Clone)]
pub enum InjectionEvent {
    Started {
        task: String,
        injector: InjectorKind,
        total_splits: usize,
    },
    SplitStarted {
        split: Split,
        input: PathBuf,
        output: PathBuf,
    },
    SplitCached {
        split: Split,
        output: PathBuf,
    },
    SplitCompleted {
        split: Split,
        output: PathBuf,
        bytes: u64,
    },
    SplitFailed {
        split: Split,
        error: String,
    },
    Complete {
        written: usize,
        cached: usize,
    },
}

/// Result of running an injector over a task.
#[derive(Debug, Clone, Default)]
pub struct InjectionRunResult {
    /// Output path per split, in split order.
    pub outputs: Vec<(Split, PathBuf)>,
    pub written: usize,
    pub cached: usize,
}

impl InjectionRunResult {
    pub fn output(&self, split: Split) -> Option<&Path> {
        self.outputs
            .iter()
            .find(|(s, _)| *s == split)
            .map(|(_, p)| p.as_path())
    }
}

/// Line counts from one streaming file transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub written: usize,
    pub dropped: usize,
}

/// Errors from injectors.
#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("{0} is not initialized")]
    NotInitialized(String),

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {source}")]
    MalformedLine {
        line: usize,
        #[source]
        source: RecordError,
    },

    #[error("row count mismatch: left table has {left} rows, right table has {right}")]
    RowCountMismatch { left: usize, right: usize },

    #[error("expected {expected} predicted column types, got {got}")]
    PredictionCount { expected: usize, got: usize },

    #[error("invalid prompt type {0} (expected 0, 1 or 2)")]
    InvalidPromptType(i64),
}

impl InjectionError {
    /// Adapter for `map_err` on I/O results touching `path`.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> InjectionError + '_ {
        move |source| InjectionError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
