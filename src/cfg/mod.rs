use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{coords::Ellipsoid, prelude::Duration};

mod solver;
pub use solver::SolverOpts;

/// Configuration Error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("baseline angle must lie within ]0°, 180°[")]
    InvalidBaselineAngle,
    #[error("maximal baseline length must be positive")]
    InvalidBaselineLength,
    #[error("invalid altitude range: [{0}, {1}]")]
    InvalidAltitudeRange(f64, f64),
    #[error("velocity bound must be positive")]
    InvalidVelocityBound,
    #[error("solver tolerances must be positive")]
    InvalidTolerance,
    #[error("solver damping setup is incoherent")]
    InvalidDamping,
    #[error("at least one iteration is required")]
    NoIterations,
}

/// Sign convention of the measured Doppler shifts
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DopplerConvention {
    /// Δf = -f.v.(u₁ + u₂) / c, as produced by the adsb2dd delay-Doppler bridge
    #[default]
    Adsb2dd,
    /// Δf = +f.v.(u₁ + u₂) / c
    Closing,
}

impl DopplerConvention {
    /// Sign applied to f.v.(u₁ + u₂) / c
    pub const fn sign(&self) -> f64 {
        match self {
            Self::Adsb2dd => -1.0,
            Self::Closing => 1.0,
        }
    }
}

const fn default_min_baseline_angle_deg() -> f64 {
    30.0
}

const fn default_max_baseline_length_m() -> f64 {
    30_000.0
}

const fn default_guess_min_altitude_m() -> f64 {
    0.0
}

const fn default_guess_max_altitude_m() -> f64 {
    100_000.0
}

const fn default_guess_max_velocity_m_s() -> f64 {
    1000.0
}

/// Geometrical conditioning policy, applied to sensor/illuminator pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BaselineConstraints {
    /// Minimal angle between any two baselines (ddeg)
    #[cfg_attr(feature = "serde", serde(default = "default_min_baseline_angle_deg"))]
    pub min_angle_deg: f64,
    /// Maximal sensor to illuminator distance (m)
    #[cfg_attr(feature = "serde", serde(default = "default_max_baseline_length_m"))]
    pub max_length_m: f64,
}

impl Default for BaselineConstraints {
    fn default() -> Self {
        Self {
            min_angle_deg: default_min_baseline_angle_deg(),
            max_length_m: default_max_baseline_length_m(),
        }
    }
}

/// Bounds a caller-supplied initial guess must respect.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GuessBounds {
    /// Minimal altitude (m)
    #[cfg_attr(feature = "serde", serde(default = "default_guess_min_altitude_m"))]
    pub min_altitude_m: f64,
    /// Maximal altitude (m)
    #[cfg_attr(feature = "serde", serde(default = "default_guess_max_altitude_m"))]
    pub max_altitude_m: f64,
    /// Maximal magnitude of each local velocity component (m.s⁻¹)
    #[cfg_attr(feature = "serde", serde(default = "default_guess_max_velocity_m_s"))]
    pub max_velocity_m_s: f64,
}

impl Default for GuessBounds {
    fn default() -> Self {
        Self {
            min_altitude_m: default_guess_min_altitude_m(),
            max_altitude_m: default_guess_max_altitude_m(),
            max_velocity_m_s: default_guess_max_velocity_m_s(),
        }
    }
}

/// [Config] is shared read-only by every stage of the resolution
/// and is never modified once the [Solver](crate::prelude::Solver) is built.
#[derive(Default, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Reference [Ellipsoid]
    #[cfg_attr(feature = "serde", serde(default))]
    pub ellipsoid: Ellipsoid,
    /// [DopplerConvention] of the detections
    #[cfg_attr(feature = "serde", serde(default))]
    pub doppler: DopplerConvention,
    /// [BaselineConstraints] applied prior resolution
    #[cfg_attr(feature = "serde", serde(default))]
    pub baseline: BaselineConstraints,
    /// [GuessBounds] applied to caller-supplied initial guesses
    #[cfg_attr(feature = "serde", serde(default))]
    pub guess_bounds: GuessBounds,
    /// [SolverOpts] iterative solver settings
    #[cfg_attr(feature = "serde", serde(default))]
    pub solver: SolverOpts,
    /// Maximal time spread between the three detections.
    /// Not verified when undefined.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_timestamp_spread: Option<Duration>,
}

impl Config {
    /// Copies and returns [Config] with desired [BaselineConstraints]
    pub fn with_baseline_constraints(&self, baseline: BaselineConstraints) -> Self {
        let mut s = self.clone();
        s.baseline = baseline;
        s
    }

    /// Copies and returns [Config] with desired [SolverOpts]
    pub fn with_solver_opts(&self, solver: SolverOpts) -> Self {
        let mut s = self.clone();
        s.solver = solver;
        s
    }

    /// Copies and returns [Config] with desired [DopplerConvention]
    pub fn with_doppler_convention(&self, doppler: DopplerConvention) -> Self {
        let mut s = self.clone();
        s.doppler = doppler;
        s
    }

    /// Copies and returns [Config] with a maximal time spread between detections
    pub fn with_max_timestamp_spread(&self, spread: Duration) -> Self {
        let mut s = self.clone();
        s.max_timestamp_spread = Some(spread);
        s
    }

    /// Verifies this [Config] is coherent.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.baseline.min_angle_deg > 0.0 && self.baseline.min_angle_deg < 180.0) {
            return Err(Error::InvalidBaselineAngle);
        }
        if !(self.baseline.max_length_m > 0.0) {
            return Err(Error::InvalidBaselineLength);
        }

        let bounds = &self.guess_bounds;
        if !(bounds.min_altitude_m < bounds.max_altitude_m) {
            return Err(Error::InvalidAltitudeRange(
                bounds.min_altitude_m,
                bounds.max_altitude_m,
            ));
        }
        if !(bounds.max_velocity_m_s > 0.0) {
            return Err(Error::InvalidVelocityBound);
        }

        self.solver.validate()
    }
}
