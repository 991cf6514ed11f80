//! Bistatic range and Doppler measurement model
use nalgebra::{Matrix2x6, Matrix3, Vector3};

use crate::{
    cfg::DopplerConvention,
    constants::{M_PER_KM, SPEED_OF_LIGHT_M_S},
    coords::{Ellipsoid, GeographicPosition, LocalVelocity},
    detection::Detection,
    prelude::Config,
    state::TargetState,
};

/// Predicted measurements for one [Detection]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Illuminator -> target -> sensor path length (km)
    pub bistatic_range_km: f64,
    /// Doppler shift (Hz)
    pub doppler_hz: f64,
}

/// Earth-fixed geometry of one sensor / illuminator pair,
/// resolved once per resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BistaticLink {
    /// Sensor ECEF position (m)
    pub sensor_ecef_m: Vector3<f64>,
    /// Illuminator ECEF position (m)
    pub illuminator_ecef_m: Vector3<f64>,
    /// Carrier frequency (Hz)
    pub frequency_hz: f64,
    /// [DopplerConvention] of the measured shift
    pub convention: DopplerConvention,
}

/// Unit vectors and path lengths, for a given target position
struct Paths {
    /// illuminator -> target
    u_tx: Vector3<f64>,
    /// target -> sensor
    u_rx: Vector3<f64>,
    d_tx: f64,
    d_rx: f64,
}

fn unit(v: &Vector3<f64>, norm: f64) -> Vector3<f64> {
    if norm > 0.0 {
        v / norm
    } else {
        Vector3::zeros()
    }
}

impl BistaticLink {
    /// Resolves [BistaticLink] from a [Detection]
    pub fn from_detection(
        detection: &Detection,
        ellipsoid: &Ellipsoid,
        convention: DopplerConvention,
    ) -> Self {
        Self {
            sensor_ecef_m: detection.sensor.to_cartesian(ellipsoid),
            illuminator_ecef_m: detection.illuminator.to_cartesian(ellipsoid),
            frequency_hz: detection.frequency_hz(),
            convention,
        }
    }

    /// Signed Doppler shift (Hz) per m.s⁻¹ of v.(u₁ + u₂)
    pub fn doppler_scaling(&self) -> f64 {
        self.convention.sign() * self.frequency_hz / SPEED_OF_LIGHT_M_S
    }

    fn paths(&self, position_ecef_m: &Vector3<f64>) -> Paths {
        let tx = position_ecef_m - self.illuminator_ecef_m;
        let rx = self.sensor_ecef_m - position_ecef_m;
        let (d_tx, d_rx) = (tx.norm(), rx.norm());
        Paths {
            u_tx: unit(&tx, d_tx),
            u_rx: unit(&rx, d_rx),
            d_tx,
            d_rx,
        }
    }

    /// Bistatic path length (m), for given target position
    pub fn bistatic_range_m(&self, position_ecef_m: &Vector3<f64>) -> f64 {
        let paths = self.paths(position_ecef_m);
        paths.d_tx + paths.d_rx
    }

    /// Predicts the measurements, for given [TargetState]
    pub fn predict(&self, state: &TargetState) -> Prediction {
        let paths = self.paths(&state.position_ecef_m);
        let closing_m_s = state.velocity_ecef_m_s.dot(&(paths.u_tx + paths.u_rx));
        Prediction {
            bistatic_range_km: (paths.d_tx + paths.d_rx) / M_PER_KM,
            doppler_hz: self.doppler_scaling() * closing_m_s,
        }
    }

    /// Partial derivatives of (range (km), Doppler (Hz)) with respect to
    /// the six state components (x, y, z, vx, vy, vz).
    pub fn jacobian(&self, state: &TargetState) -> Matrix2x6<f64> {
        let paths = self.paths(&state.position_ecef_m);
        let v = state.velocity_ecef_m_s;
        let k = self.doppler_scaling();

        let mut h = Matrix2x6::<f64>::zeros();

        let d_range = (paths.u_tx - paths.u_rx) / M_PER_KM;

        // d(u)/dp = (I - u.uᵀ) / d, and the receive path is oriented towards the sensor
        let projection = |u: &Vector3<f64>, d: f64| -> Vector3<f64> {
            if d > 0.0 {
                (Matrix3::identity() - u * u.transpose()) * v / d
            } else {
                Vector3::zeros()
            }
        };
        let d_doppler_pos =
            (projection(&paths.u_tx, paths.d_tx) - projection(&paths.u_rx, paths.d_rx)) * k;
        let d_doppler_vel = (paths.u_tx + paths.u_rx) * k;

        for i in 0..3 {
            h[(0, i)] = d_range[i];
            h[(1, i)] = d_doppler_pos[i];
            h[(1, i + 3)] = d_doppler_vel[i];
        }

        h
    }
}

/// [MeasurementModel] predicts the bistatic measurements a target would produce.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeasurementModel {
    ellipsoid: Ellipsoid,
    convention: DopplerConvention,
}

impl MeasurementModel {
    /// Builds a new [MeasurementModel] on given [Ellipsoid]
    pub fn new(ellipsoid: Ellipsoid, convention: DopplerConvention) -> Self {
        Self {
            ellipsoid,
            convention,
        }
    }

    /// Builds a new [MeasurementModel] from [Config] preset
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.ellipsoid, cfg.doppler)
    }

    /// [Ellipsoid] in use
    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    /// [DopplerConvention] in use
    pub fn convention(&self) -> DopplerConvention {
        self.convention
    }

    /// Resolves the [BistaticLink] of a [Detection]
    pub fn link(&self, detection: &Detection) -> BistaticLink {
        BistaticLink::from_detection(detection, &self.ellipsoid, self.convention)
    }

    /// Predicts the bistatic range and Doppler shift a [TargetState] would produce.
    pub fn predict(&self, state: &TargetState, detection: &Detection) -> Prediction {
        self.link(detection).predict(state)
    }

    /// 1x6 range row and 1x6 Doppler row, see [BistaticLink::jacobian].
    pub fn jacobian(&self, state: &TargetState, detection: &Detection) -> Matrix2x6<f64> {
        self.link(detection).jacobian(state)
    }

    /// Predicts the measurements of a target whose velocity is known in
    /// its local tangent plane: the velocity is rotated to the Earth-fixed
    /// frame at the target position, prior projection.
    pub fn predict_local(
        &self,
        position_ecef_m: &Vector3<f64>,
        velocity: &LocalVelocity,
        detection: &Detection,
    ) -> Prediction {
        let reference = GeographicPosition::from_cartesian(position_ecef_m, &self.ellipsoid);
        let state = TargetState::new(*position_ecef_m, velocity.to_cartesian(&reference));
        self.predict(&state, detection)
    }
}
