//! Bistatic detections
use itertools::Itertools;
use nalgebra::Vector3;
use thiserror::Error;

use crate::{
    apriori::InitialGuess,
    constants::{HZ_PER_MHZ, M_PER_KM},
    coords::{Ellipsoid, GeographicPosition},
    prelude::{Config, Duration, Epoch, Error},
};

/// Site of a [Detection]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Sensor,
    Illuminator,
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Sensor => write!(f, "sensor"),
            Self::Illuminator => write!(f, "illuminator"),
        }
    }
}

/// Reasons a [Detection] is physically invalid
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionDefect {
    #[error("non finite field")]
    NonFinite,
    #[error("{0} latitude out of range: {1}°")]
    Latitude(Site, f64),
    #[error("{0} longitude out of range: {1}°")]
    Longitude(Site, f64),
    #[error("non positive carrier frequency: {0} MHz")]
    Frequency(f64),
    #[error("non positive bistatic range: {0} km")]
    BistaticRange(f64),
    #[error("sensor and illuminator are co-located")]
    CoLocated,
    #[error("bistatic range {range_km} km is shorter than its {baseline_km:.3} km baseline")]
    RangeShorterThanBaseline { range_km: f64, baseline_km: f64 },
}

/// One bistatic [Detection], produced by a sensor exploiting an illuminator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Receiver [GeographicPosition]
    pub sensor: GeographicPosition,
    /// Illuminator of opportunity [GeographicPosition]
    pub illuminator: GeographicPosition,
    /// Carrier frequency (MHz)
    pub frequency_mhz: f64,
    /// Sampling instant
    pub timestamp: Epoch,
    /// Measured illuminator -> target -> sensor path length (km)
    pub bistatic_range_km: f64,
    /// Measured Doppler shift (Hz)
    pub doppler_hz: f64,
}

impl Detection {
    /// Builds a new [Detection]
    pub fn new(
        sensor: GeographicPosition,
        illuminator: GeographicPosition,
        frequency_mhz: f64,
        timestamp: Epoch,
        bistatic_range_km: f64,
        doppler_hz: f64,
    ) -> Self {
        Self {
            sensor,
            illuminator,
            frequency_mhz,
            timestamp,
            bistatic_range_km,
            doppler_hz,
        }
    }

    /// Carrier frequency (Hz)
    pub fn frequency_hz(&self) -> f64 {
        self.frequency_mhz * HZ_PER_MHZ
    }

    /// Sensor to illuminator baseline vector, Earth-fixed (m)
    pub fn baseline_m(&self, ellipsoid: &Ellipsoid) -> Vector3<f64> {
        self.illuminator.to_cartesian(ellipsoid) - self.sensor.to_cartesian(ellipsoid)
    }

    /// Sensor to illuminator distance (m)
    pub fn baseline_length_m(&self, ellipsoid: &Ellipsoid) -> f64 {
        self.baseline_m(ellipsoid).norm()
    }

    /// Verifies this [Detection] is physically sensible.
    pub fn validate(&self, ellipsoid: &Ellipsoid) -> Result<(), DetectionDefect> {
        let fields = [
            self.sensor.latitude_deg,
            self.sensor.longitude_deg,
            self.sensor.altitude_m,
            self.illuminator.latitude_deg,
            self.illuminator.longitude_deg,
            self.illuminator.altitude_m,
            self.frequency_mhz,
            self.bistatic_range_km,
            self.doppler_hz,
        ];

        if fields.iter().any(|value| !value.is_finite()) {
            return Err(DetectionDefect::NonFinite);
        }

        for (site, position) in [
            (Site::Sensor, &self.sensor),
            (Site::Illuminator, &self.illuminator),
        ] {
            if !(-90.0..=90.0).contains(&position.latitude_deg) {
                return Err(DetectionDefect::Latitude(site, position.latitude_deg));
            }
            if !(-180.0..=180.0).contains(&position.longitude_deg) {
                return Err(DetectionDefect::Longitude(site, position.longitude_deg));
            }
        }

        if self.frequency_mhz <= 0.0 {
            return Err(DetectionDefect::Frequency(self.frequency_mhz));
        }

        if self.bistatic_range_km <= 0.0 {
            return Err(DetectionDefect::BistaticRange(self.bistatic_range_km));
        }

        let baseline_m = self.baseline_length_m(ellipsoid);
        if baseline_m == 0.0 {
            return Err(DetectionDefect::CoLocated);
        }

        if self.bistatic_range_km * M_PER_KM < baseline_m {
            return Err(DetectionDefect::RangeShorterThanBaseline {
                range_km: self.bistatic_range_km,
                baseline_km: baseline_m / M_PER_KM,
            });
        }

        Ok(())
    }
}

/// The three simultaneous [Detection]s a resolution requires,
/// and possible caller-supplied [InitialGuess].
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionTriple {
    /// [Detection]s, in boundary order (detection1, detection2, detection3)
    pub detections: [Detection; 3],
    /// Possible [InitialGuess]
    pub initial_guess: Option<InitialGuess>,
}

impl DetectionTriple {
    /// Builds a new [DetectionTriple] without [InitialGuess]
    pub fn new(detections: [Detection; 3]) -> Self {
        Self {
            detections,
            initial_guess: None,
        }
    }

    /// Copies and returns [DetectionTriple] with an [InitialGuess]
    pub fn with_initial_guess(&self, guess: InitialGuess) -> Self {
        let mut s = self.clone();
        s.initial_guess = Some(guess);
        s
    }

    /// Copies and returns [DetectionTriple] without [InitialGuess]
    pub fn without_initial_guess(&self) -> Self {
        let mut s = self.clone();
        s.initial_guess = None;
        s
    }

    /// Iterates over the [Detection]s
    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    /// Timestamp attached to the solution: that of the first [Detection]
    pub fn timestamp(&self) -> Epoch {
        self.detections[0].timestamp
    }

    /// Largest time difference between any two [Detection]s
    pub fn timestamp_spread(&self) -> Duration {
        self.iter()
            .tuple_combinations()
            .map(|(a, b)| (a.timestamp - b.timestamp).abs())
            .fold(Duration::ZERO, |max, dt| if dt > max { dt } else { max })
    }

    /// Ground level centroid of the three sensors.
    /// Averaged in the Earth-fixed frame, so it remains valid across the ±180° seam.
    pub fn sensor_centroid(&self, ellipsoid: &Ellipsoid) -> GeographicPosition {
        let sum = self
            .iter()
            .fold(Vector3::<f64>::zeros(), |sum, det| {
                sum + det.sensor.to_cartesian(ellipsoid)
            });
        GeographicPosition::from_cartesian(&(sum / 3.0), ellipsoid).with_altitude(0.0)
    }

    /// Verifies each [Detection] and, when configured, their simultaneity.
    pub fn validate(&self, cfg: &Config) -> Result<(), Error> {
        for (index, detection) in self.iter().enumerate() {
            detection
                .validate(&cfg.ellipsoid)
                .map_err(|cause| Error::DetectionValidation {
                    index: index + 1,
                    cause,
                })?;
        }

        if let Some(max) = cfg.max_timestamp_spread {
            let spread = self.timestamp_spread();
            if spread > max {
                return Err(Error::SimultaneityViolation { spread, max });
            }
        }

        Ok(())
    }
}
