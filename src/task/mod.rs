//! Target tasks: layouts, sequences, the dwell / speed-gated sequencer and
//! the run controller that drives it from the frame loop.

pub mod context;
pub mod controller;
pub mod producer;
pub mod sequence;
pub mod sequencer;
pub mod setup;
pub mod target;

use serde::{Deserialize, Serialize};

pub use context::{Mailbox, RunContext, SampleLog};
pub use controller::RunController;
pub use producer::SampleProducer;
pub use sequence::Sequence;
pub use sequencer::{Advance, SequencerState, TargetSequencer, TickInput, TickOutcome, TriggerPolicy};
pub use setup::{build_sequence, build_targets};
pub use target::{Target, TargetSet};

/// Which task the application runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Clock,
    Corners,
    CornersDepth,
    Tapping,
    Postural,
}

impl TaskKind {
    pub fn is_target_task(&self) -> bool {
        matches!(self, TaskKind::Clock | TaskKind::Corners | TaskKind::CornersDepth)
    }

    pub fn default_trigger(&self) -> TriggerKind {
        match self {
            TaskKind::Clock => TriggerKind::DwellFill,
            _ => TriggerKind::SpeedGated,
        }
    }

    pub fn default_sequence_mode(&self) -> SequenceMode {
        match self {
            TaskKind::Clock => SequenceMode::Alternating,
            _ => SequenceMode::Pattern,
        }
    }

    pub fn file_root(&self) -> &'static str {
        match self {
            TaskKind::Clock => "clock",
            TaskKind::Corners | TaskKind::CornersDepth => "corners",
            TaskKind::Tapping => "tapping",
            TaskKind::Postural => "postural",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
    DwellFill,
    SpeedGated,
}

/// How the clock sequence is generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequenceMode {
    /// Centre and perimeter alternate
    Alternating,
    /// Any target except the current one
    RandomWalk,
    /// Random walk until every ordered path was taken `path_hits` times
    CoverPaths,
    /// Built-in fixed pattern of the layout
    Pattern,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("Target radius must be positive, got {0}")]
    InvalidRadius(f64),
    #[error("A task needs at least two targets, got {0}")]
    TooFewTargets(usize),
    #[error("Sequence is empty")]
    EmptySequence,
    #[error("Sequence entry {position} refers to target {index}, only {targets} targets exist")]
    UnknownTarget { position: usize, index: usize, targets: usize },
    #[error("Sequence repeats target {index} at position {position}")]
    RepeatedTarget { position: usize, index: usize },
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),
    #[error("Task {0:?} has no targets")]
    NotATargetTask(TaskKind),
    #[error("Screen is not calibrated")]
    NotCalibrated,
    #[error("A run is already in progress")]
    AlreadyRunning,
}
