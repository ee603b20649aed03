//! History-balancing selection.

use super::{Algorithm, Candidate};
use crate::history::History;
use crate::rng::TestRng;

/// Shift applied when a weighted-balancing score would be non-positive.
const RESCUE_EPSILON: f64 = 1e-6;

/// Deterministic balancing: pick the least-executed enabled step.
///
/// Ties break uniformly at random. With a stable enabled set of K steps,
/// execution counts over that set never drift further than one apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct Balancing;

impl Algorithm for Balancing {
    fn choose(&self, rng: &mut TestRng, history: &History, candidates: &[Candidate]) -> usize {
        let counts: Vec<usize> = candidates
            .iter()
            .map(|c| history.step_count(&c.name))
            .collect();
        let minimum = counts.iter().copied().min().unwrap_or(0);
        let tied: Vec<usize> = counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == minimum)
            .map(|(index, _)| index)
            .collect();
        tied[rng.pick(tied.len())]
    }
}

/// Weight-proportional selection corrected by execution history.
///
/// Each step scores its normalized weight minus its normalized suite-wide
/// execution count; over-executed steps lose score, rare ones gain. When
/// any score is non-positive the whole set shifts by `|min| + ε`, so every
/// value entering the draw is strictly positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedBalancing;

impl Algorithm for WeightedBalancing {
    #[allow(clippy::cast_precision_loss)]
    fn choose(&self, rng: &mut TestRng, history: &History, candidates: &[Candidate]) -> usize {
        let total_weight: f64 = candidates.iter().map(|c| c.weight).sum();
        let total_steps = history.total_steps();

        let mut scores: Vec<f64> = candidates
            .iter()
            .map(|c| {
                let normalized_weight = c.weight / total_weight;
                let normalized_count = if total_steps == 0 {
                    0.0
                } else {
                    history.step_count(&c.name) as f64 / total_steps as f64
                };
                normalized_weight - normalized_count
            })
            .collect();

        let minimum = scores.iter().copied().fold(f64::INFINITY, f64::min);
        if minimum <= 0.0 {
            let shift = minimum.abs() + RESCUE_EPSILON;
            for score in &mut scores {
                *score += shift;
            }
        }
        rng.weighted(&scores)
    }
}
