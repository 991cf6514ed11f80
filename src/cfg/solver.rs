//! Solver configuration preset

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Error;

const fn default_max_iterations() -> usize {
    100
}

const fn default_residual_tolerance() -> f64 {
    1.0E-3
}

const fn default_stagnation_tolerance() -> f64 {
    1.0E-10
}

const fn default_acceptance_threshold() -> f64 {
    75.0
}

const fn default_initial_damping() -> f64 {
    1.0E-3
}

const fn default_damping_factor() -> f64 {
    10.0
}

const fn default_min_damping() -> f64 {
    1.0E-12
}

const fn default_max_damping() -> f64 {
    1.0E10
}

const fn default_min_altitude_m() -> f64 {
    -1000.0
}

const fn default_max_altitude_m() -> f64 {
    100_000.0
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverOpts {
    /// Maximal number of Levenberg-Marquardt iterations
    #[cfg_attr(feature = "serde", serde(default = "default_max_iterations"))]
    pub max_iterations: usize,
    /// Convergence is declared once the normalized residual norm
    /// (meters of range, m.s⁻¹ of bistatic rate) drops below this value.
    #[cfg_attr(feature = "serde", serde(default = "default_residual_tolerance"))]
    pub residual_tolerance: f64,
    /// Relative residual norm decrease under which the solver is stagnating.
    #[cfg_attr(feature = "serde", serde(default = "default_stagnation_tolerance"))]
    pub stagnation_tolerance: f64,
    /// A stagnating solver is still declared converged when its residual
    /// norm lies under this threshold, unless a step ever left the altitude bounds.
    /// Otherwise it is a failure.
    #[cfg_attr(feature = "serde", serde(default = "default_acceptance_threshold"))]
    pub acceptance_threshold: f64,
    /// Initial damping factor
    #[cfg_attr(feature = "serde", serde(default = "default_initial_damping"))]
    pub initial_damping: f64,
    /// Damping is multiplied by this factor on each rejected step
    #[cfg_attr(feature = "serde", serde(default = "default_damping_factor"))]
    pub damping_increase: f64,
    /// Damping is divided by this factor on each accepted step
    #[cfg_attr(feature = "serde", serde(default = "default_damping_factor"))]
    pub damping_decrease: f64,
    /// Damping floor
    #[cfg_attr(feature = "serde", serde(default = "default_min_damping"))]
    pub min_damping: f64,
    /// Resolution fails once damping exceeds this value
    #[cfg_attr(feature = "serde", serde(default = "default_max_damping"))]
    pub max_damping: f64,
    /// Lowest target altitude the state may reach (m)
    #[cfg_attr(feature = "serde", serde(default = "default_min_altitude_m"))]
    pub min_altitude_m: f64,
    /// Highest target altitude the state may reach (m)
    #[cfg_attr(feature = "serde", serde(default = "default_max_altitude_m"))]
    pub max_altitude_m: f64,
}

impl Default for SolverOpts {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            residual_tolerance: default_residual_tolerance(),
            stagnation_tolerance: default_stagnation_tolerance(),
            acceptance_threshold: default_acceptance_threshold(),
            initial_damping: default_initial_damping(),
            damping_increase: default_damping_factor(),
            damping_decrease: default_damping_factor(),
            min_damping: default_min_damping(),
            max_damping: default_max_damping(),
            min_altitude_m: default_min_altitude_m(),
            max_altitude_m: default_max_altitude_m(),
        }
    }
}

impl SolverOpts {
    /// Returns true if given altitude (m) is admissible for the state
    pub(crate) fn altitude_in_bounds(&self, altitude_m: f64) -> bool {
        altitude_m >= self.min_altitude_m && altitude_m <= self.max_altitude_m
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.max_iterations == 0 {
            return Err(Error::NoIterations);
        }
        if !(self.residual_tolerance > 0.0
            && self.stagnation_tolerance > 0.0
            && self.acceptance_threshold >= self.residual_tolerance)
        {
            return Err(Error::InvalidTolerance);
        }
        if !(self.initial_damping > 0.0
            && self.min_damping > 0.0
            && self.min_damping <= self.initial_damping
            && self.initial_damping < self.max_damping
            && self.damping_increase > 1.0
            && self.damping_decrease > 1.0)
        {
            return Err(Error::InvalidDamping);
        }
        if !(self.min_altitude_m < self.max_altitude_m) {
            return Err(Error::InvalidAltitudeRange(
                self.min_altitude_m,
                self.max_altitude_m,
            ));
        }
        Ok(())
    }
}
