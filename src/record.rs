//! Boundary records: detection requests and solution outputs
use serde::{Deserialize, Serialize};

use crate::{
    apriori::InitialGuess,
    coords::{GeographicPosition, LocalVelocity},
    detection::{Detection, DetectionTriple},
    prelude::{Epoch, Error},
    solutions::SolveResult,
};

/// One detection, as exchanged with a detection source.
/// Sites carry no altitude: they lie on the ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub sensor_lat: f64,
    pub sensor_lon: f64,
    pub ioo_lat: f64,
    pub ioo_lon: f64,
    pub freq_mhz: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub bistatic_range_km: f64,
    pub doppler_hz: f64,
}

impl From<&DetectionRecord> for Detection {
    fn from(record: &DetectionRecord) -> Self {
        Detection::new(
            GeographicPosition::ground(record.sensor_lat, record.sensor_lon),
            GeographicPosition::ground(record.ioo_lat, record.ioo_lon),
            record.freq_mhz,
            Epoch::from_unix_milliseconds(record.timestamp as f64),
            record.bistatic_range_km,
            record.doppler_hz,
        )
    }
}

impl From<&Detection> for DetectionRecord {
    fn from(detection: &Detection) -> Self {
        Self {
            sensor_lat: detection.sensor.latitude_deg,
            sensor_lon: detection.sensor.longitude_deg,
            ioo_lat: detection.illuminator.latitude_deg,
            ioo_lon: detection.illuminator.longitude_deg,
            freq_mhz: detection.frequency_mhz,
            timestamp: detection.timestamp.to_unix_milliseconds().round() as i64,
            bistatic_range_km: detection.bistatic_range_km,
            doppler_hz: detection.doppler_hz,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LlaRecord {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnuRecord {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

/// Optional starting point of a [SolveRequest]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialGuessRecord {
    pub position_lla: LlaRecord,
    pub velocity_enu: EnuRecord,
}

impl From<&InitialGuessRecord> for InitialGuess {
    fn from(record: &InitialGuessRecord) -> Self {
        let (p, v) = (&record.position_lla, &record.velocity_enu);
        InitialGuess::new(
            GeographicPosition::new(p.lat, p.lon, p.alt),
            LocalVelocity::new(v.east, v.north, v.up),
        )
    }
}

/// Three labelled detections and possible initial guess
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub detection1: DetectionRecord,
    pub detection2: DetectionRecord,
    pub detection3: DetectionRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_guess: Option<InitialGuessRecord>,
}

impl From<&SolveRequest> for DetectionTriple {
    fn from(request: &SolveRequest) -> Self {
        let triple = DetectionTriple::new([
            Detection::from(&request.detection1),
            Detection::from(&request.detection2),
            Detection::from(&request.detection3),
        ]);
        match &request.initial_guess {
            Some(guess) => triple.with_initial_guess(guess.into()),
            None => triple,
        }
    }
}

/// Flat success record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
    /// Milliseconds since the Unix epoch, of the first detection
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub velocity_east: f64,
    pub velocity_north: f64,
    pub velocity_up: f64,
    pub convergence_metric: f64,
    /// Three range residuals (km) then three Doppler residuals (Hz)
    pub residuals: [f64; 6],
}

impl From<&SolveResult> for SolutionRecord {
    fn from(solution: &SolveResult) -> Self {
        Self {
            timestamp: solution.timestamp.to_unix_milliseconds().round() as i64,
            latitude: solution.position.latitude_deg,
            longitude: solution.position.longitude_deg,
            altitude: solution.position.altitude_m,
            velocity_east: solution.velocity.east,
            velocity_north: solution.velocity.north,
            velocity_up: solution.velocity.up,
            convergence_metric: solution.convergence_metric,
            residuals: solution.residuals,
        }
    }
}

/// Structured failure record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Human readable description
    pub error: String,
    /// Error kind, see [Error::kind]
    pub kind: String,
}

impl From<&Error> for FailureRecord {
    fn from(e: &Error) -> Self {
        Self {
            error: e.to_string(),
            kind: e.kind().to_string(),
        }
    }
}

/// Either a [SolutionRecord] or a [FailureRecord], never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputRecord {
    Solution(SolutionRecord),
    Failure(FailureRecord),
}

impl From<&Result<SolveResult, Error>> for OutputRecord {
    fn from(result: &Result<SolveResult, Error>) -> Self {
        match result {
            Ok(solution) => Self::Solution(solution.into()),
            Err(e) => Self::Failure(e.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{apriori::AprioriSource, detection::DetectionDefect, prelude::Duration};

    const REQUEST: &str = r#"{
        "detection1": {
            "sensor_lat": 40.7128, "sensor_lon": -74.006,
            "ioo_lat": 40.7589, "ioo_lon": -73.9851,
            "freq_mhz": 1090.0, "timestamp": 1700000000000,
            "bistatic_range_km": 35.2, "doppler_hz": 152.4
        },
        "detection2": {
            "sensor_lat": 40.65, "sensor_lon": -73.95,
            "ioo_lat": 40.70, "ioo_lon": -73.85,
            "freq_mhz": 1090.0, "timestamp": 1700000000000,
            "bistatic_range_km": 41.0, "doppler_hz": -87.1
        },
        "detection3": {
            "sensor_lat": 40.80, "sensor_lon": -74.10,
            "ioo_lat": 40.72, "ioo_lon": -74.20,
            "freq_mhz": 1090.0, "timestamp": 1700000000250,
            "bistatic_range_km": 28.7, "doppler_hz": 12.0
        }
    }"#;

    #[test]
    fn request_parsing() {
        let request: SolveRequest = serde_json::from_str(REQUEST).unwrap();
        assert!(request.initial_guess.is_none());

        let triple = DetectionTriple::from(&request);
        assert!(triple.initial_guess.is_none());

        let first = &triple.detections[0];
        assert_eq!(first.sensor, GeographicPosition::ground(40.7128, -74.006));
        assert_eq!(first.illuminator, GeographicPosition::ground(40.7589, -73.9851));
        assert_eq!(first.frequency_hz(), 1090.0E6);
        assert_eq!(first.bistatic_range_km, 35.2);
        assert_eq!(first.doppler_hz, 152.4);

        assert_eq!(
            triple.timestamp(),
            Epoch::from_unix_milliseconds(1_700_000_000_000.0)
        );
        let spread = triple.timestamp_spread() - Duration::from_milliseconds(250.0);
        assert!(spread.abs() < Duration::from_microseconds(1.0));
        assert_eq!(triple.detections[1].doppler_hz, -87.1);
    }

    #[test]
    fn request_with_initial_guess() {
        let mut value: serde_json::Value = serde_json::from_str(REQUEST).unwrap();
        value["initial_guess"] = serde_json::json!({
            "position_lla": { "lat": 40.75, "lon": -74.0, "alt": 5000.0 },
            "velocity_enu": { "east": 100.0, "north": -50.0, "up": 0.0 }
        });

        let request: SolveRequest = serde_json::from_value(value).unwrap();
        let triple = DetectionTriple::from(&request);

        assert_eq!(
            triple.initial_guess,
            Some(InitialGuess::new(
                GeographicPosition::new(40.75, -74.0, 5000.0),
                LocalVelocity::new(100.0, -50.0, 0.0),
            ))
        );

        // round trip preserves the optional field
        let serialized = serde_json::to_string(&request).unwrap();
        assert!(serialized.contains("initial_guess"));

        let request: SolveRequest = serde_json::from_str(REQUEST).unwrap();
        let serialized = serde_json::to_string(&request).unwrap();
        assert!(!serialized.contains("initial_guess"));
    }

    #[test]
    fn missing_detection_is_rejected() {
        let mut value: serde_json::Value = serde_json::from_str(REQUEST).unwrap();
        if let Some(map) = value.as_object_mut() {
            map.remove("detection3");
        }
        assert!(serde_json::from_value::<SolveRequest>(value).is_err());
    }

    #[test]
    fn output_records() {
        let solution = SolveResult {
            timestamp: Epoch::from_unix_milliseconds(1_700_000_000_000.0),
            position: GeographicPosition::new(40.9, -73.8, 5012.5),
            velocity: LocalVelocity::new(150.0, -80.0, 5.0),
            convergence_metric: 1.0E-6,
            residuals: [1.0E-9, -2.0E-9, 0.0, 1.0E-7, 0.0, -1.0E-7],
            iterations: 4,
            initial_guess: AprioriSource::Automatic,
        };

        let result: Result<SolveResult, Error> = Ok(solution);
        let output = OutputRecord::from(&result);
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(value["latitude"], 40.9);
        assert_eq!(value["velocity_north"], -80.0);
        assert_eq!(value["residuals"].as_array().map(|r| r.len()), Some(6));
        assert!(value.get("error").is_none());

        let failure = Error::DetectionValidation {
            index: 2,
            cause: DetectionDefect::Frequency(0.0),
        };

        let result: Result<SolveResult, Error> = Err(failure);
        let output = OutputRecord::from(&result);
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(value["kind"], "DetectionValidationError");
        assert!(value["error"]
            .as_str()
            .is_some_and(|e| e.contains("detection 2")));
        assert!(value.get("latitude").is_none());

        // untagged records parse back to the right variant
        let parsed: OutputRecord = serde_json::from_value(value).unwrap();
        assert!(matches!(parsed, OutputRecord::Failure(_)));
    }
}
