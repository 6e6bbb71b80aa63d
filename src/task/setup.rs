use rand::Rng;

use super::sequence::{CORNERS_PATTERN, CORNERS_PRACTICE_PATTERN, DEPTH_PATTERN, DEPTH_PRACTICE_PATTERN};
use super::{Sequence, SequenceMode, TargetSet, TaskError, TaskKind};
use crate::config::TaskConfig;

/// Target layout for the configured task on a display of `display_size` px
pub fn build_targets(config: &TaskConfig, display_size: (f64, f64)) -> Result<TargetSet, TaskError> {
    match config.kind {
        TaskKind::Clock => TargetSet::clock(display_size, config.spacing_px, config.radius_px),
        TaskKind::Corners => TargetSet::corners(config.edge_px, config.spacing_px, config.radius_px),
        TaskKind::CornersDepth => TargetSet::corners_depth(
            config.edge_px,
            config.spacing_px,
            config.radius_px,
            config.box_depth_mm,
        ),
        other => Err(TaskError::NotATargetTask(other)),
    }
}

/// A fresh sequence for one run over `n_targets` targets.
///
/// The clock layout has no built-in pattern; `Pattern` falls back to
/// alternating there.
pub fn build_sequence<R: Rng + ?Sized>(
    config: &TaskConfig,
    n_targets: usize,
    rng: &mut R,
) -> Result<Sequence, TaskError> {
    match config.sequence_mode() {
        SequenceMode::Alternating => Sequence::alternating(config.sequence_len, n_targets, rng),
        SequenceMode::RandomWalk => Sequence::random_walk(config.sequence_len, n_targets, rng),
        SequenceMode::CoverPaths => Sequence::covering_paths(n_targets, config.path_hits, rng),
        SequenceMode::Pattern => match (config.kind, config.practice) {
            (TaskKind::Corners, true) => Sequence::fixed(&CORNERS_PRACTICE_PATTERN, n_targets),
            (TaskKind::Corners, false) => Sequence::fixed(&CORNERS_PATTERN, n_targets),
            (TaskKind::CornersDepth, true) => Sequence::fixed(&DEPTH_PRACTICE_PATTERN, n_targets),
            (TaskKind::CornersDepth, false) => Sequence::fixed(&DEPTH_PATTERN, n_targets),
            _ => Sequence::alternating(config.sequence_len, n_targets, rng),
        },
    }
}
