#![doc = include_str!("../README.md")]
#![cfg_attr(docrs, feature(doc_cfg))]

// private modules
mod apriori;
mod baseline;
mod cfg;
mod constants;
mod coords;
mod detection;
mod error;
mod model;
mod solutions;
mod solver;
mod state;

#[cfg(feature = "serde")]
#[cfg_attr(docrs, doc(cfg(feature = "serde")))]
pub mod record;

pub mod retry;

#[cfg(test)]
mod tests;

// prelude
pub mod prelude {
    pub use crate::apriori::{AprioriSource, GuessRejection, InitialGuess, InitialGuessGenerator};
    pub use crate::baseline::{baseline_angle_deg, BaselineValidator, BaselineViolation};
    pub use crate::cfg::{BaselineConstraints, Config, DopplerConvention, GuessBounds, SolverOpts};
    pub use crate::constants::SPEED_OF_LIGHT_M_S;
    pub use crate::coords::{
        ecef_to_enu, enu_to_ecef, enu_to_ecef_rotation, wrap_longitude, Ellipsoid,
        GeographicPosition, LocalVelocity,
    };
    pub use crate::detection::{Detection, DetectionDefect, DetectionTriple, Site};
    pub use crate::error::Error;
    pub use crate::model::{BistaticLink, MeasurementModel, Prediction};
    pub use crate::solutions::SolveResult;
    pub use crate::solver::{ConvergenceFailure, Solver};
    pub use crate::state::TargetState;
    // re-export
    pub use hifitime::{Duration, Epoch};
    pub use nalgebra::Vector3;
}

// pub export
pub use cfg::Error as ConfigError;
pub use error::Error;
