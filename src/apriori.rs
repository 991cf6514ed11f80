//! Initial state of the iterative solver
use log::{debug, warn};
use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    cfg::{DopplerConvention, GuessBounds},
    constants::M_PER_KM,
    coords::{enu_to_ecef_rotation, Ellipsoid, GeographicPosition, LocalVelocity},
    detection::DetectionTriple,
    model::BistaticLink,
    prelude::{Config, Error},
    state::TargetState,
};

/// Number of cells per horizontal axis, on the first search pass
const COARSE_HORIZONTAL_STEPS: usize = 40;

/// Number of cells on the altitude axis, on the first search pass
const COARSE_VERTICAL_STEPS: usize = 10;

/// Number of cells per axis, on each refinement pass
const FINE_STEPS: usize = 10;

/// Number of refinement passes
const REFINEMENTS: usize = 6;

/// Caller-supplied starting point of the resolution
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InitialGuess {
    /// Guessed [GeographicPosition]
    pub position: GeographicPosition,
    /// Guessed [LocalVelocity]
    pub velocity: LocalVelocity,
}

impl InitialGuess {
    /// Builds a new [InitialGuess]
    pub fn new(position: GeographicPosition, velocity: LocalVelocity) -> Self {
        Self { position, velocity }
    }

    /// Verifies this [InitialGuess] lies within [GuessBounds]
    pub fn validate(&self, bounds: &GuessBounds) -> Result<(), GuessRejection> {
        let fields = [
            self.position.latitude_deg,
            self.position.longitude_deg,
            self.position.altitude_m,
            self.velocity.east,
            self.velocity.north,
            self.velocity.up,
        ];

        if fields.iter().any(|value| !value.is_finite()) {
            return Err(GuessRejection::NonFinite);
        }

        if !(-90.0..=90.0).contains(&self.position.latitude_deg) {
            return Err(GuessRejection::Latitude(self.position.latitude_deg));
        }

        if !(-180.0..=180.0).contains(&self.position.longitude_deg) {
            return Err(GuessRejection::Longitude(self.position.longitude_deg));
        }

        let altitude_m = self.position.altitude_m;
        if altitude_m < bounds.min_altitude_m || altitude_m > bounds.max_altitude_m {
            return Err(GuessRejection::Altitude {
                altitude_m,
                min_m: bounds.min_altitude_m,
                max_m: bounds.max_altitude_m,
            });
        }

        let component_m_s = self.velocity.max_component();
        if component_m_s > bounds.max_velocity_m_s {
            return Err(GuessRejection::Velocity {
                component_m_s,
                max_m_s: bounds.max_velocity_m_s,
            });
        }

        Ok(())
    }

    /// Converts this [InitialGuess] to [TargetState]
    pub fn to_state(&self, ellipsoid: &Ellipsoid) -> TargetState {
        TargetState::from_geographic(&self.position, &self.velocity, ellipsoid)
    }
}

/// Reasons a provided [InitialGuess] is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuessRejection {
    #[error("non finite field")]
    NonFinite,
    #[error("latitude out of range: {0}°")]
    Latitude(f64),
    #[error("longitude out of range: {0}°")]
    Longitude(f64),
    #[error("altitude {altitude_m} m out of [{min_m}, {max_m}] m")]
    Altitude {
        altitude_m: f64,
        min_m: f64,
        max_m: f64,
    },
    #[error("velocity component {component_m_s} m/s exceeds {max_m_s} m/s")]
    Velocity { component_m_s: f64, max_m_s: f64 },
}

/// Origin of the initial [TargetState]
#[derive(Debug, Default, Clone, PartialEq)]
pub enum AprioriSource {
    /// Derived from the detection geometry
    #[default]
    Automatic,
    /// Caller-supplied [InitialGuess]
    Provided,
    /// Caller-supplied [InitialGuess] was rejected,
    /// the state was derived from the detection geometry.
    Fallback(GuessRejection),
}

/// Local search frame: ENU axes anchored at the ground level sensor centroid.
struct SearchFrame {
    origin_ecef_m: Vector3<f64>,
    rotation: Matrix3<f64>,
}

impl SearchFrame {
    fn new(origin: &GeographicPosition, ellipsoid: &Ellipsoid) -> Self {
        Self {
            origin_ecef_m: origin.to_cartesian(ellipsoid),
            rotation: enu_to_ecef_rotation(origin.latitude_deg, origin.longitude_deg),
        }
    }

    fn to_ecef(&self, enu: &Vector3<f64>) -> Vector3<f64> {
        self.origin_ecef_m + self.rotation * enu
    }

    fn to_enu(&self, ecef: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * (ecef - self.origin_ecef_m)
    }
}

/// Axis aligned search box, in the [SearchFrame]
#[derive(Debug, Clone, Copy)]
struct SearchBox {
    center: Vector3<f64>,
    half_extent: Vector3<f64>,
    steps: [usize; 3],
}

impl SearchBox {
    fn cell(&self) -> Vector3<f64> {
        Vector3::new(
            2.0 * self.half_extent[0] / self.steps[0] as f64,
            2.0 * self.half_extent[1] / self.steps[1] as f64,
            2.0 * self.half_extent[2] / self.steps[2] as f64,
        )
    }

    fn nodes(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        let cell = self.cell();
        let corner = self.center - self.half_extent;
        let [nx, ny, nz] = self.steps;
        (0..=nx).flat_map(move |i| {
            (0..=ny).flat_map(move |j| {
                (0..=nz).map(move |k| {
                    corner + Vector3::new(i as f64 * cell[0], j as f64 * cell[1], k as f64 * cell[2])
                })
            })
        })
    }
}

/// [InitialGuessGenerator] provides the starting [TargetState] of the solver.
#[derive(Debug, Clone, Copy)]
pub struct InitialGuessGenerator {
    ellipsoid: Ellipsoid,
    doppler: DopplerConvention,
    /// [GuessBounds] narrowed to the solver altitude range
    bounds: GuessBounds,
}

impl InitialGuessGenerator {
    /// Builds a new [InitialGuessGenerator] from [Config] preset.
    /// Initial states are restricted to the altitudes both the
    /// [GuessBounds] and the [SolverOpts](crate::prelude::SolverOpts) admit.
    pub fn new(cfg: &Config) -> Self {
        let bounds = GuessBounds {
            min_altitude_m: cfg.guess_bounds.min_altitude_m.max(cfg.solver.min_altitude_m),
            max_altitude_m: cfg.guess_bounds.max_altitude_m.min(cfg.solver.max_altitude_m),
            ..cfg.guess_bounds
        };
        Self {
            ellipsoid: cfg.ellipsoid,
            doppler: cfg.doppler,
            bounds,
        }
    }

    /// [GuessBounds] a provided [InitialGuess] must respect
    pub fn bounds(&self) -> &GuessBounds {
        &self.bounds
    }

    /// Derives a [TargetState] from the detection geometry only.
    /// Velocity is initialized to zero.
    ///
    /// The mean of the three ellipse centers seeds a coarse to fine search,
    /// in the local tangent plane at the sensor centroid, of the point
    /// that best satisfies the three bistatic ranges.
    pub fn generate(&self, triple: &DetectionTriple) -> TargetState {
        let frame = SearchFrame::new(&triple.sensor_centroid(&self.ellipsoid), &self.ellipsoid);

        let links = triple
            .detections
            .map(|det| BistaticLink::from_detection(&det, &self.ellipsoid, self.doppler));

        let ranges_m = triple
            .detections
            .map(|det| det.bistatic_range_km * M_PER_KM);

        let centers =
            links.map(|link| frame.to_enu(&((link.sensor_ecef_m + link.illuminator_ecef_m) / 2.0)));

        let center = centers.iter().fold(Vector3::<f64>::zeros(), |sum, c| sum + c) / 3.0;

        // horizontally, the target lies within half a bistatic range of its ellipse center
        let radius_m = centers
            .iter()
            .zip(ranges_m.iter())
            .map(|(c, range_m)| range_m / 2.0 + (c - center).xy().norm())
            .fold(0.0_f64, f64::max);

        // vertically, it lies below the highest semi minor axis
        let semi_minor_m = links
            .iter()
            .zip(ranges_m.iter())
            .map(|(link, range_m)| {
                let half_baseline_m = (link.illuminator_ecef_m - link.sensor_ecef_m).norm() / 2.0;
                ((range_m / 2.0).powi(2) - half_baseline_m.powi(2))
                    .max(0.0)
                    .sqrt()
            })
            .fold(0.0_f64, f64::max);

        let min_altitude_m = self.bounds.min_altitude_m;
        let max_altitude_m = self.bounds.max_altitude_m.min(semi_minor_m).max(min_altitude_m);

        debug!(
            "initial guess search: radius={:.1}m altitude=[{:.1}, {:.1}]m",
            radius_m, min_altitude_m, max_altitude_m
        );

        let cost = |enu: &Vector3<f64>| -> f64 {
            let position = frame.to_ecef(enu);
            links
                .iter()
                .zip(ranges_m.iter())
                .map(|(link, range_m)| (link.bistatic_range_m(&position) - range_m).powi(2))
                .sum::<f64>()
        };

        let mut search = SearchBox {
            center: Vector3::new(
                center[0],
                center[1],
                (min_altitude_m + max_altitude_m) / 2.0,
            ),
            half_extent: Vector3::new(
                radius_m,
                radius_m,
                (max_altitude_m - min_altitude_m) / 2.0,
            ),
            steps: [
                COARSE_HORIZONTAL_STEPS,
                COARSE_HORIZONTAL_STEPS,
                COARSE_VERTICAL_STEPS,
            ],
        };

        let mut best = (search.center, f64::INFINITY);

        for pass in 0..=REFINEMENTS {
            for mut node in search.nodes() {
                node[2] = node[2].clamp(min_altitude_m, max_altitude_m);
                let value = cost(&node);
                if value < best.1 {
                    best = (node, value);
                }
            }

            debug!(
                "initial guess search pass #{}: rms={:.3}m",
                pass,
                (best.1 / 3.0).sqrt()
            );

            // zoom two cells around the best node
            search = SearchBox {
                center: best.0,
                half_extent: search.cell() * 2.0,
                steps: [FINE_STEPS; 3],
            };
        }

        TargetState::new(frame.to_ecef(&best.0), Vector3::zeros())
    }

    /// Validates a provided [InitialGuess] and converts it to [TargetState].
    pub fn validate_provided(&self, guess: &InitialGuess) -> Result<TargetState, Error> {
        guess
            .validate(&self.bounds)
            .map_err(Error::InitialGuessValidation)?;
        Ok(guess.to_state(&self.ellipsoid))
    }

    /// Selects the initial [TargetState] of this [DetectionTriple]: the provided
    /// [InitialGuess] when it is valid, the automatic one otherwise.
    pub fn initial_state(&self, triple: &DetectionTriple) -> (TargetState, AprioriSource) {
        let Some(guess) = &triple.initial_guess else {
            return (self.generate(triple), AprioriSource::Automatic);
        };

        match guess.validate(&self.bounds) {
            Ok(()) => (guess.to_state(&self.ellipsoid), AprioriSource::Provided),
            Err(rejection) => {
                warn!("initial guess rejected ({}): using automatic guess", rejection);
                (self.generate(triple), AprioriSource::Fallback(rejection))
            },
        }
    }
}
