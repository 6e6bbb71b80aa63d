use rand::Rng;

use super::TaskError;

// Corner indices: NW, NE, SW, SE
const NW: usize = 0;
const NE: usize = 1;
const SW: usize = 2;
const SE: usize = 3;

// Depth indices: close corners, then far corners
const NWC: usize = 0;
const NEC: usize = 1;
const SWC: usize = 2;
const SEC: usize = 3;
const NWF: usize = 4;
const NEF: usize = 5;
const SWF: usize = 6;
const SEF: usize = 7;

pub const CORNERS_PRACTICE_PATTERN: [usize; 13] = [NW, SW, NE, SE, NE, NW, SE, SW, SE, NW, NE, SW, NW];

pub const CORNERS_PATTERN: [usize; 37] = [
    NW, SW, NE, SE, NE, NW, SE, SW, SE, NW, NE, SW, NW, NE, SW, SE, SW, NW, SE, NE, SE, NW, SW, NE, NW,
    SW, NE, SE, NE, NW, SE, SW, SE, NW, NE, SW, NW,
];

pub const DEPTH_PRACTICE_PATTERN: [usize; 13] = [NWC, SWF, NEF, SEC, NEF, NWF, SEC, SWF, SEC, NWC, NEF, SWF, NWC];

pub const DEPTH_PATTERN: [usize; 37] = [
    NWC, SWF, NEF, SEC, NEF, NWF, SEC, SWF, SEC, NWC, NEF, SWF, NWC, NEC, SWF, SEC, SWF, NWC, SEF, NEC,
    SEF, NWC, SWF, NEC, NWF, SWC, NEF, SEC, NEF, NWC, SEF, SWC, SEF, NWC, NEF, SWC, NWF,
];

/// Ordered target indices a run walks through. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    steps: Vec<usize>,
}

impl Sequence {
    pub fn fixed(pattern: &[usize], n_targets: usize) -> Result<Self, TaskError> {
        let sequence = Self { steps: pattern.to_vec() };
        sequence.validate(n_targets)?;
        Ok(sequence)
    }

    /// Centre (index 0) and a random perimeter target alternate, starting
    /// at the centre
    pub fn alternating<R: Rng + ?Sized>(len: usize, n_targets: usize, rng: &mut R) -> Result<Self, TaskError> {
        if n_targets < 2 {
            return Err(TaskError::TooFewTargets(n_targets));
        }
        let steps = (0..len)
            .map(|i| if i % 2 == 0 { 0 } else { rng.random_range(1..n_targets) })
            .collect();
        let sequence = Self { steps };
        sequence.validate(n_targets)?;
        Ok(sequence)
    }

    /// Each entry is a random target other than the previous one
    pub fn random_walk<R: Rng + ?Sized>(len: usize, n_targets: usize, rng: &mut R) -> Result<Self, TaskError> {
        if n_targets < 2 {
            return Err(TaskError::TooFewTargets(n_targets));
        }
        let mut steps = Vec::with_capacity(len);
        let mut current = 0;
        for i in 0..len {
            if i > 0 {
                current = next_other(current, n_targets, rng);
            }
            steps.push(current);
        }
        let sequence = Self { steps };
        sequence.validate(n_targets)?;
        Ok(sequence)
    }

    /// Random walk from target 0 that stops once every ordered path between
    /// two different targets has been taken at least `hits` times
    pub fn covering_paths<R: Rng + ?Sized>(n_targets: usize, hits: u32, rng: &mut R) -> Result<Self, TaskError> {
        if n_targets < 2 {
            return Err(TaskError::TooFewTargets(n_targets));
        }
        let mut counts = vec![0u32; n_targets * n_targets];
        let mut remaining = if hits == 0 { 0 } else { n_targets * (n_targets - 1) };
        let mut current = 0;
        let mut steps = vec![current];
        while remaining > 0 {
            let next = next_other(current, n_targets, rng);
            let slot = &mut counts[current * n_targets + next];
            *slot += 1;
            if *slot == hits {
                remaining -= 1;
            }
            steps.push(next);
            current = next;
        }
        Ok(Self { steps })
    }

    pub fn validate(&self, n_targets: usize) -> Result<(), TaskError> {
        if self.steps.is_empty() {
            return Err(TaskError::EmptySequence);
        }
        for (position, &index) in self.steps.iter().enumerate() {
            if index >= n_targets {
                return Err(TaskError::UnknownTarget { position, index, targets: n_targets });
            }
            if position > 0 && self.steps[position - 1] == index {
                return Err(TaskError::RepeatedTarget { position, index });
            }
        }
        Ok(())
    }

    /// True when centre and non-centre entries strictly alternate
    pub fn is_alternating(&self) -> bool {
        self.steps
            .windows(2)
            .all(|pair| (pair[0] == 0) != (pair[1] == 0))
    }

    pub fn steps(&self) -> &[usize] {
        &self.steps
    }

    pub fn get(&self, step: usize) -> Option<usize> {
        self.steps.get(step).copied()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn next_other<R: Rng + ?Sized>(current: usize, n_targets: usize, rng: &mut R) -> usize {
    // draw from the n-1 other targets and skip over the current one
    let pick = rng.random_range(0..n_targets - 1);
    if pick >= current {
        pick + 1
    } else {
        pick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn built_in_patterns_are_valid() {
        assert!(Sequence::fixed(&CORNERS_PRACTICE_PATTERN, 4).is_ok());
        assert!(Sequence::fixed(&CORNERS_PATTERN, 4).is_ok());
        assert!(Sequence::fixed(&DEPTH_PRACTICE_PATTERN, 8).is_ok());
        assert!(Sequence::fixed(&DEPTH_PATTERN, 8).is_ok());
    }

    #[test]
    fn immediate_repeat_is_rejected() {
        assert_eq!(
            Sequence::fixed(&[0, 1, 1, 2], 4),
            Err(TaskError::RepeatedTarget { position: 2, index: 1 })
        );
    }

    #[test]
    fn unknown_target_and_empty_are_rejected() {
        assert!(matches!(
            Sequence::fixed(&[0, 4], 4),
            Err(TaskError::UnknownTarget { position: 1, index: 4, targets: 4 })
        ));
        assert_eq!(Sequence::fixed(&[], 4), Err(TaskError::EmptySequence));
    }

    #[test]
    fn alternating_sequence_never_pairs_like_with_like() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [1, 2, 9, 40, 101] {
            let seq = Sequence::alternating(len, 9, &mut rng).unwrap();
            assert_eq!(seq.len(), len);
            assert_eq!(seq.get(0), Some(0));
            for pair in seq.steps().windows(2) {
                assert!(!(pair[0] == 0 && pair[1] == 0));
                assert!(!(pair[0] != 0 && pair[1] != 0));
            }
            assert!(seq.is_alternating());
        }
    }

    #[test]
    fn random_walk_has_no_immediate_repeat() {
        let mut rng = StdRng::seed_from_u64(11);
        let seq = Sequence::random_walk(500, 4, &mut rng).unwrap();
        assert!(seq.steps().windows(2).all(|p| p[0] != p[1]));
        assert!(seq.steps().iter().all(|&i| i < 4));
    }

    #[test]
    fn covering_paths_visits_every_ordered_pair() {
        let mut rng = StdRng::seed_from_u64(3);
        let seq = Sequence::covering_paths(4, 2, &mut rng).unwrap();
        seq.validate(4).unwrap();
        let mut counts = [[0u32; 4]; 4];
        for pair in seq.steps().windows(2) {
            counts[pair[0]][pair[1]] += 1;
        }
        for a in 0..4 {
            for b in 0..4 {
                if a != b {
                    assert!(counts[a][b] >= 2, "path {a}-{b} taken {} times", counts[a][b]);
                }
            }
        }
        // the final step is the one that completed coverage
        let last = &seq.steps()[seq.len() - 2..];
        assert_eq!(counts[last[0]][last[1]], 2);
    }

    #[test]
    fn too_few_targets_cannot_form_a_sequence() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            Sequence::random_walk(3, 1, &mut rng),
            Err(TaskError::TooFewTargets(1))
        ));
    }
}
