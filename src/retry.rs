//! Multi-seed resolution
use log::{debug, warn};

use crate::{
    apriori::InitialGuess,
    detection::DetectionTriple,
    prelude::{Error, Solver},
    solutions::SolveResult,
};

/// Resolves a [DetectionTriple] from its own initial state first
/// (see [Solver::resolve]), then from each seed in order.
/// Each attempt is independent: the first converged [SolveResult] is returned,
/// otherwise the last [Error]. Out of bounds seeds are skipped.
/// Detection and baseline errors are final and returned immediately.
pub fn resolve_with_seeds(
    solver: &Solver,
    triple: &DetectionTriple,
    seeds: &[InitialGuess],
) -> Result<SolveResult, Error> {
    solver.prepare(triple)?;

    let mut failure = match solver.resolve(triple) {
        Ok(solution) => return Ok(solution),
        Err(e) => e,
    };

    for (index, seed) in seeds.iter().enumerate() {
        let initial = match solver.generator().validate_provided(seed) {
            Ok(initial) => initial,
            Err(e) => {
                warn!("seed #{} skipped: {}", index + 1, e);
                continue;
            },
        };

        debug!("{} - retrying from seed #{}", triple.timestamp(), index + 1);

        match solver.refine(triple, initial) {
            Ok(solution) => return Ok(solution),
            Err(e) => failure = e,
        }
    }

    Err(failure)
}
