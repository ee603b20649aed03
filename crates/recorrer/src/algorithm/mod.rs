//! Step selection algorithms.
//!
//! Given the enabled set and the execution history, an algorithm picks the
//! next step. Algorithms are stateless: the engine owns the RNG and lends
//! it for exactly one call, so identical seeds replay identical choices.

mod balancing;
mod random;
mod weighted;

pub use balancing::{Balancing, WeightedBalancing};
pub use random::Random;
pub use weighted::Weighted;

use crate::history::History;
use crate::model::StepId;
use crate::rng::TestRng;

/// One enabled step offered to a selection algorithm.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Opaque step identity the engine uses to invoke the choice
    pub id: StepId,
    /// Catalogue step name
    pub name: String,
    /// Weight, evaluated fresh for this selection round
    pub weight: f64,
}

/// Strategy choosing the next step out of the enabled set.
pub trait Algorithm {
    /// Choose one of `candidates`, returning its index.
    ///
    /// `candidates` is never empty: the engine raises
    /// [`NoAvailableSteps`](crate::EngineError::NoAvailableSteps) before an
    /// algorithm ever sees an empty set.
    fn choose(&self, rng: &mut TestRng, history: &History, candidates: &[Candidate]) -> usize;
}
