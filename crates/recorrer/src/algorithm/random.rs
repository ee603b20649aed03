//! Uniform random selection.

use super::{Algorithm, Candidate};
use crate::history::History;
use crate::rng::TestRng;

/// Fully random algorithm: every enabled step is equally likely.
#[derive(Debug, Clone, Copy, Default)]
pub struct Random;

impl Algorithm for Random {
    fn choose(&self, rng: &mut TestRng, _history: &History, candidates: &[Candidate]) -> usize {
        rng.pick(candidates.len())
    }
}
