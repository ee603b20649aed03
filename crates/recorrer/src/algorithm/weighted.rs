//! Weight-proportional selection.

use super::{Algorithm, Candidate};
use crate::history::History;
use crate::rng::TestRng;

/// Selection proportional to step weight.
///
/// Weights arrive freshly evaluated in each [`Candidate`], so computed
/// weight providers steer the distribution round by round.
#[derive(Debug, Clone, Copy, Default)]
pub struct Weighted;

impl Algorithm for Weighted {
    fn choose(&self, rng: &mut TestRng, _history: &History, candidates: &[Candidate]) -> usize {
        let weights: Vec<f64> = candidates.iter().map(|c| c.weight).collect();
        rng.weighted(&weights)
    }
}
