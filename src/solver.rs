//! Bistatic position and velocity solver
use log::{debug, error, info};
use nalgebra::{Matrix6, Vector6};
use thiserror::Error;

use crate::{
    apriori::{AprioriSource, InitialGuessGenerator},
    baseline::BaselineValidator,
    constants::M_PER_KM,
    coords::LocalVelocity,
    detection::{Detection, DetectionTriple},
    model::BistaticLink,
    prelude::{Config, Error},
    solutions::SolveResult,
    state::TargetState,
};

/// Floor of the Marquardt scaling terms
const MIN_SCALING: f64 = 1.0E-12;

/// Reasons the solver gives up
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvergenceFailure {
    #[error("not converged after {iterations} iterations (residual norm {residual_norm:.3e})")]
    MaxIterations {
        iterations: usize,
        residual_norm: f64,
    },
    #[error("no improving step after {iterations} iterations, damping {damping:.1e} (residual norm {residual_norm:.3e})")]
    DampingExhausted {
        iterations: usize,
        damping: f64,
        residual_norm: f64,
    },
    #[error("stagnating after {iterations} iterations (residual norm {residual_norm:.3e})")]
    Stagnation {
        iterations: usize,
        residual_norm: f64,
    },
    #[error("stagnating against the altitude bounds after {iterations} iterations, at {altitude_m:.3} m (residual norm {residual_norm:.3e})")]
    AltitudeBound {
        iterations: usize,
        altitude_m: f64,
        residual_norm: f64,
    },
    #[error("non finite state or residuals")]
    NonFinite,
}

/// Measured minus predicted values, for a given [TargetState]
#[derive(Debug, Clone)]
struct Residuals {
    /// km then Hz
    raw: [f64; 6],
    /// m then m.s⁻¹
    normalized: Vector6<f64>,
    norm: f64,
}

impl Residuals {
    fn new(links: &[BistaticLink; 3], detections: &[Detection; 3], state: &TargetState) -> Self {
        let mut raw = [0.0; 6];
        let mut normalized = Vector6::zeros();

        for (i, (link, detection)) in links.iter().zip(detections.iter()).enumerate() {
            let predicted = link.predict(state);

            raw[i] = detection.bistatic_range_km - predicted.bistatic_range_km;
            raw[i + 3] = detection.doppler_hz - predicted.doppler_hz;

            normalized[i] = raw[i] * M_PER_KM;
            normalized[i + 3] = raw[i + 3] / link.doppler_scaling();
        }

        Self {
            raw,
            normalized,
            norm: normalized.norm(),
        }
    }
}

/// Jacobian of the normalized residual model (m, m.s⁻¹)
fn design_matrix(links: &[BistaticLink; 3], state: &TargetState) -> Matrix6<f64> {
    let mut h = Matrix6::zeros();
    for (i, link) in links.iter().enumerate() {
        let rows = link.jacobian(state);
        for j in 0..6 {
            h[(i, j)] = rows[(0, j)] * M_PER_KM;
            h[(i + 3, j)] = rows[(1, j)] / link.doppler_scaling();
        }
    }
    h
}

/// [Solver] resolves the position and velocity of a target observed
/// by three bistatic [Detection]s. A [Solver] holds no state between
/// resolutions: it may be shared across threads.
#[derive(Debug, Clone)]
pub struct Solver {
    /// [Config] preset
    cfg: Config,
    /// [BaselineValidator]
    validator: BaselineValidator,
    /// [InitialGuessGenerator]
    generator: InitialGuessGenerator,
}

impl Solver {
    /// Builds a new [Solver] from [Config] preset
    pub fn new(cfg: &Config) -> Result<Self, Error> {
        cfg.validate().map_err(Error::Config)?;
        Ok(Self {
            cfg: cfg.clone(),
            validator: BaselineValidator::new(cfg),
            generator: InitialGuessGenerator::new(cfg),
        })
    }

    /// [Config] in use
    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// [InitialGuessGenerator] in use
    pub fn generator(&self) -> &InitialGuessGenerator {
        &self.generator
    }

    /// Validates the [DetectionTriple] and its geometry, selects an initial
    /// state then solves for position and velocity.
    pub fn resolve(&self, triple: &DetectionTriple) -> Result<SolveResult, Error> {
        self.prepare(triple)?;
        let (initial, source) = self.generator.initial_state(triple);
        debug!("{} - initial state ({:?}): {}", triple.timestamp(), source, initial);
        self.iterate(triple, initial, source)
    }

    /// Solves for position and velocity, starting from a given [TargetState].
    /// Detections are validated, not their geometry.
    pub fn refine(
        &self,
        triple: &DetectionTriple,
        initial: TargetState,
    ) -> Result<SolveResult, Error> {
        triple.validate(&self.cfg)?;
        self.iterate(triple, initial, AprioriSource::Provided)
    }

    /// Runs every verification that precedes the iterative solver.
    pub(crate) fn prepare(&self, triple: &DetectionTriple) -> Result<(), Error> {
        triple.validate(&self.cfg).inspect_err(|e| {
            error!("{} - {}", triple.timestamp(), e);
        })?;

        self.validator
            .validate_detections(triple)
            .map_err(|violation| {
                error!("{} - {}", triple.timestamp(), violation);
                Error::BaselineConstraint(violation)
            })
    }

    /// Levenberg-Marquardt iterations
    fn iterate(
        &self,
        triple: &DetectionTriple,
        initial: TargetState,
        source: AprioriSource,
    ) -> Result<SolveResult, Error> {
        let t = triple.timestamp();
        let opts = &self.cfg.solver;

        if !initial.is_finite() {
            error!("{} - non finite initial state", t);
            return Err(Error::ConvergenceFailure(ConvergenceFailure::NonFinite));
        }

        let links = triple.detections.map(|det| {
            BistaticLink::from_detection(&det, &self.cfg.ellipsoid, self.cfg.doppler)
        });

        let mut state = initial;
        let mut residuals = Residuals::new(&links, &triple.detections, &state);

        if !residuals.norm.is_finite() {
            error!("{} - non finite residuals", t);
            return Err(Error::ConvergenceFailure(ConvergenceFailure::NonFinite));
        }

        let mut damping = opts.initial_damping;
        let mut iterations = 0;

        // steps rejected for leaving the altitude bounds
        let mut bounded_steps = 0_usize;

        loop {
            if residuals.norm < opts.residual_tolerance {
                return Ok(self.solution(triple, &state, &residuals, iterations, source));
            }

            if iterations == opts.max_iterations {
                let failure = ConvergenceFailure::MaxIterations {
                    iterations,
                    residual_norm: residuals.norm,
                };
                error!("{} - {}", t, failure);
                return Err(Error::ConvergenceFailure(failure));
            }

            iterations += 1;

            let h = design_matrix(&links, &state);
            let ht_h = h.transpose() * h;
            let ht_r = h.transpose() * residuals.normalized;

            if !ht_h.iter().all(|x| x.is_finite()) {
                error!("{} - non finite design matrix", t);
                return Err(Error::ConvergenceFailure(ConvergenceFailure::NonFinite));
            }

            let previous_norm = residuals.norm;

            // raise damping until a step improves the fit within altitude bounds
            loop {
                let mut system = ht_h;
                for i in 0..6 {
                    system[(i, i)] += damping * ht_h[(i, i)].max(MIN_SCALING);
                }

                let dx = system
                    .cholesky()
                    .map(|cholesky| cholesky.solve(&ht_r))
                    .or_else(|| system.lu().solve(&ht_r))
                    .filter(|dx| dx.iter().all(|x| x.is_finite()));

                if let Some(dx) = dx {
                    let candidate = state.correct(&dx);
                    let altitude_m = candidate.geographic(&self.cfg.ellipsoid).altitude_m;

                    if opts.altitude_in_bounds(altitude_m) {
                        let candidate_residuals =
                            Residuals::new(&links, &triple.detections, &candidate);

                        if candidate_residuals.norm < residuals.norm {
                            state = candidate;
                            residuals = candidate_residuals;
                            damping = (damping / opts.damping_decrease).max(opts.min_damping);
                            break;
                        }
                    } else {
                        bounded_steps += 1;
                        debug!(
                            "{} - iteration #{}: step rejected, altitude {:.1}m out of bounds",
                            t, iterations, altitude_m
                        );
                    }
                } else {
                    debug!("{} - iteration #{}: singular system", t, iterations);
                }

                damping *= opts.damping_increase;

                if damping > opts.max_damping {
                    let failure = ConvergenceFailure::DampingExhausted {
                        iterations,
                        damping,
                        residual_norm: residuals.norm,
                    };
                    error!("{} - {}", t, failure);
                    return Err(Error::ConvergenceFailure(failure));
                }
            }

            debug!(
                "{} - iteration #{}: residual norm={:.6e} damping={:.1e}",
                t, iterations, residuals.norm, damping
            );

            let improvement = (previous_norm - residuals.norm) / previous_norm;

            if residuals.norm >= opts.residual_tolerance && improvement < opts.stagnation_tolerance
            {
                let failure = if bounded_steps > 0 {
                    ConvergenceFailure::AltitudeBound {
                        iterations,
                        altitude_m: state.geographic(&self.cfg.ellipsoid).altitude_m,
                        residual_norm: residuals.norm,
                    }
                } else if residuals.norm < opts.acceptance_threshold {
                    info!(
                        "{} - stagnating, accepting residual norm {:.3e}",
                        t, residuals.norm
                    );
                    return Ok(self.solution(triple, &state, &residuals, iterations, source));
                } else {
                    ConvergenceFailure::Stagnation {
                        iterations,
                        residual_norm: residuals.norm,
                    }
                };

                error!("{} - {}", t, failure);
                return Err(Error::ConvergenceFailure(failure));
            }
        }
    }

    fn solution(
        &self,
        triple: &DetectionTriple,
        state: &TargetState,
        residuals: &Residuals,
        iterations: usize,
        initial_guess: AprioriSource,
    ) -> SolveResult {
        let position = state.geographic(&self.cfg.ellipsoid);
        let velocity = LocalVelocity::from_cartesian(&state.velocity_ecef_m_s, &position);

        info!(
            "{} - converged after {} iteration(s): {} (residual norm={:.3e})",
            triple.timestamp(),
            iterations,
            position,
            residuals.norm
        );

        SolveResult {
            timestamp: triple.timestamp(),
            position,
            velocity,
            convergence_metric: residuals.norm,
            residuals: residuals.raw,
            iterations,
            initial_guess,
        }
    }
}
