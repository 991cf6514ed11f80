//! Sensor / illuminator baseline conditioning
use itertools::Itertools;
use log::debug;
use nalgebra::Vector3;
use thiserror::Error;

use crate::{
    cfg::BaselineConstraints,
    coords::{Ellipsoid, GeographicPosition},
    detection::DetectionTriple,
    prelude::Config,
};

/// Baselines are numbered from 1, in pairing order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BaselineViolation {
    #[error("baseline #{baseline} (sensor[{sensor}], illuminator[{illuminator}]) is too long: {length_m:.1} m > {max_m:.1} m")]
    Length {
        baseline: usize,
        sensor: usize,
        illuminator: usize,
        length_m: f64,
        max_m: f64,
    },
    #[error("baselines #{first} and #{second} are too close to parallel: {angle_deg:.1}° < {min_deg:.1}°")]
    Angle {
        first: usize,
        second: usize,
        angle_deg: f64,
        min_deg: f64,
    },
    #[error("baseline #{0} refers to an unknown sensor or illuminator")]
    UnknownSite(usize),
    #[error("baseline #{0} has zero length")]
    Degenerate(usize),
}

/// Angle between two baseline vectors, in degrees within [0°, 180°].
/// Returns None when either baseline has zero length.
pub fn baseline_angle_deg(lhs: &Vector3<f64>, rhs: &Vector3<f64>) -> Option<f64> {
    let (lhs_norm, rhs_norm) = (lhs.norm(), rhs.norm());
    if lhs_norm == 0.0 || rhs_norm == 0.0 {
        return None;
    }
    let cos = (lhs / lhs_norm).dot(&(rhs / rhs_norm)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// [BaselineValidator] verifies a sensor/illuminator layout is well conditioned.
/// It is a pure predicate: the geometry is never modified.
#[derive(Debug, Clone, Copy)]
pub struct BaselineValidator {
    constraints: BaselineConstraints,
    ellipsoid: Ellipsoid,
}

impl BaselineValidator {
    /// Builds a [BaselineValidator] from [Config] preset
    pub fn new(cfg: &Config) -> Self {
        Self {
            constraints: cfg.baseline,
            ellipsoid: cfg.ellipsoid,
        }
    }

    /// Builds a [BaselineValidator] from custom [BaselineConstraints]
    pub fn from_constraints(constraints: BaselineConstraints, ellipsoid: Ellipsoid) -> Self {
        Self {
            constraints,
            ellipsoid,
        }
    }

    /// Validates the baselines formed by each (sensor index, illuminator index) pair.
    /// Lengths are all verified first, then every pairwise angle.
    pub fn validate(
        &self,
        sensors: &[GeographicPosition],
        illuminators: &[GeographicPosition],
        pairing: &[(usize, usize)],
    ) -> Result<(), BaselineViolation> {
        let mut baselines = Vec::with_capacity(pairing.len());

        for (index, (sensor, illuminator)) in pairing.iter().copied().enumerate() {
            let (Some(rx), Some(tx)) = (sensors.get(sensor), illuminators.get(illuminator)) else {
                return Err(BaselineViolation::UnknownSite(index + 1));
            };

            let baseline = tx.to_cartesian(&self.ellipsoid) - rx.to_cartesian(&self.ellipsoid);
            let length_m = baseline.norm();

            debug!("baseline #{}: {:.1} m", index + 1, length_m);

            if length_m == 0.0 {
                return Err(BaselineViolation::Degenerate(index + 1));
            }

            if length_m > self.constraints.max_length_m {
                return Err(BaselineViolation::Length {
                    baseline: index + 1,
                    sensor,
                    illuminator,
                    length_m,
                    max_m: self.constraints.max_length_m,
                });
            }

            baselines.push(baseline);
        }

        for ((i, lhs), (j, rhs)) in baselines.iter().enumerate().tuple_combinations() {
            // zero lengths were rejected above
            let angle_deg = baseline_angle_deg(lhs, rhs).unwrap_or_default();

            debug!("baselines #{}/#{}: {:.2}°", i + 1, j + 1, angle_deg);

            if angle_deg < self.constraints.min_angle_deg {
                return Err(BaselineViolation::Angle {
                    first: i + 1,
                    second: j + 1,
                    angle_deg,
                    min_deg: self.constraints.min_angle_deg,
                });
            }
        }

        Ok(())
    }

    /// Validates the baselines of a [DetectionTriple]: one per [Detection](crate::prelude::Detection).
    pub fn validate_detections(&self, triple: &DetectionTriple) -> Result<(), BaselineViolation> {
        let sensors = triple.detections.map(|det| det.sensor);
        let illuminators = triple.detections.map(|det| det.illuminator);
        self.validate(&sensors, &illuminators, &[(0, 0), (1, 1), (2, 2)])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::offset;

    use rand::{rngs::SmallRng, Rng, SeedableRng};

    fn validator() -> BaselineValidator {
        BaselineValidator::new(&Config::default())
    }

    #[test]
    fn well_conditioned_layout() {
        let center = GeographicPosition::ground(45.0, 5.0);
        let sensors = [
            offset(&center, 0.0, 0.0),
            offset(&center, 3000.0, 0.0),
            offset(&center, 0.0, 3000.0),
        ];
        let illuminators = [
            offset(&center, 10_000.0, 0.0),  // east
            offset(&center, 3000.0, 10_000.0), // north
            offset(&center, -7000.0, -4000.0), // south west
        ];
        let pairing = [(0, 0), (1, 1), (2, 2)];
        assert_eq!(
            validator().validate(&sensors, &illuminators, &pairing),
            Ok(())
        );
    }

    #[test]
    fn shared_illuminator_layout() {
        let center = GeographicPosition::ground(-20.0, 40.0);
        let sensors = [
            offset(&center, -8000.0, 0.0),
            offset(&center, 0.0, -8000.0),
            offset(&center, 6000.0, 6000.0),
        ];
        let illuminators = [offset(&center, 0.0, 0.0)];
        let pairing = [(0, 0), (1, 0), (2, 0)];
        assert!(validator()
            .validate(&sensors, &illuminators, &pairing)
            .is_ok());
    }

    #[test]
    fn too_long_baseline() {
        let center = GeographicPosition::ground(10.0, 10.0);
        let sensors = [offset(&center, 0.0, 0.0), offset(&center, 0.0, 1000.0)];
        let illuminators = [offset(&center, 35_000.0, 0.0), offset(&center, 0.0, 9000.0)];

        match validator().validate(&sensors, &illuminators, &[(0, 0), (1, 1)]) {
            Err(BaselineViolation::Length {
                baseline,
                sensor,
                illuminator,
                length_m,
                max_m,
            }) => {
                assert_eq!((baseline, sensor, illuminator), (1, 0, 0));
                assert!(length_m > 34_000.0 && length_m < 36_000.0);
                assert_eq!(max_m, 30_000.0);
            },
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn nearly_parallel_baselines() {
        let center = GeographicPosition::ground(52.0, 13.0);
        let sensors = [
            offset(&center, 0.0, 0.0),
            offset(&center, 0.0, 2000.0),
            offset(&center, -5000.0, -5000.0),
        ];
        // baselines #1 and #2 both point east, ~5° apart
        let illuminators = [
            offset(&center, 10_000.0, 0.0),
            offset(&center, 10_000.0, 2000.0 + 875.0),
            offset(&center, -5000.0, 5000.0),
        ];

        let result = validator().validate(&sensors, &illuminators, &[(0, 0), (1, 1), (2, 2)]);

        if let Err(violation) = &result {
            let message = violation.to_string();
            assert!(message.contains("#1") && message.contains("#2"), "{}", message);
        }

        match result {
            Err(BaselineViolation::Angle {
                first,
                second,
                angle_deg,
                min_deg,
            }) => {
                assert_eq!((first, second), (1, 2), "wrong offending pair");
                assert!(angle_deg < 10.0, "angle={}", angle_deg);
                assert_eq!(min_deg, 30.0);
            },
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn unknown_site_and_degenerate() {
        let center = GeographicPosition::ground(0.0, 0.0);
        let sensors = [center];
        let illuminators = [center, offset(&center, 1000.0, 0.0)];

        assert_eq!(
            validator().validate(&sensors, &illuminators, &[(0, 1), (1, 0)]),
            Err(BaselineViolation::UnknownSite(2))
        );
        assert_eq!(
            validator().validate(&sensors, &illuminators, &[(0, 0)]),
            Err(BaselineViolation::Degenerate(1))
        );
    }

    #[test]
    fn angle_symmetry() {
        let mut rng = SmallRng::seed_from_u64(0x5EED);

        for _ in 0..200 {
            let lhs = Vector3::new(
                rng.random_range(-1.0E4..1.0E4),
                rng.random_range(-1.0E4..1.0E4),
                rng.random_range(-1.0E4..1.0E4),
            );
            let rhs = Vector3::new(
                rng.random_range(-1.0E4..1.0E4),
                rng.random_range(-1.0E4..1.0E4),
                rng.random_range(-1.0E4..1.0E4),
            );

            let ab = baseline_angle_deg(&lhs, &rhs).unwrap();
            let ba = baseline_angle_deg(&rhs, &lhs).unwrap();
            assert_eq!(ab, ba, "asymmetric baseline angle");
            assert!((0.0..=180.0).contains(&ab));
        }

        let v = Vector3::new(1.0, 2.0, 3.0);
        assert!(baseline_angle_deg(&v, &(v * 2.0)).unwrap() < 1.0E-6);
        assert!((baseline_angle_deg(&v, &(-v)).unwrap() - 180.0).abs() < 1.0E-9);
        assert_eq!(baseline_angle_deg(&v, &Vector3::zeros()), None);
    }

    #[test]
    fn shrinking_a_baseline_preserves_validity() {
        let mut rng = SmallRng::seed_from_u64(42);
        let center = GeographicPosition::ground(30.0, -100.0);

        let sensors = [
            offset(&center, 0.0, 0.0),
            offset(&center, 4000.0, 0.0),
            offset(&center, 0.0, -4000.0),
        ];

        let mut tested = 0;

        for _ in 0..100 {
            let directions: [f64; 3] = [
                rng.random_range(0.0..60.0),
                rng.random_range(120.0..180.0),
                rng.random_range(240.0..300.0),
            ];
            let lengths: [f64; 3] = [
                rng.random_range(5000.0..29_000.0),
                rng.random_range(5000.0..29_000.0),
                rng.random_range(5000.0..29_000.0),
            ];

            let illuminators = |lengths: &[f64; 3]| -> Vec<GeographicPosition> {
                (0..3)
                    .map(|i| {
                        let (sin, cos) = directions[i].to_radians().sin_cos();
                        let s = &sensors[i];
                        offset(s, lengths[i] * sin, lengths[i] * cos)
                    })
                    .collect()
            };

            let pairing = [(0, 0), (1, 1), (2, 2)];
            if validator()
                .validate(&sensors, &illuminators(&lengths), &pairing)
                .is_err()
            {
                continue;
            }

            tested += 1;

            // shrink one baseline, preserving its direction
            let mut shrunk = lengths;
            let index = rng.random_range(0..3);
            shrunk[index] *= rng.random_range(0.5..1.0);

            assert!(
                validator()
                    .validate(&sensors, &illuminators(&shrunk), &pairing)
                    .is_ok(),
                "shrinking baseline #{} invalidated the layout",
                index + 1
            );
        }

        assert!(tested > 50, "too few valid layouts generated");
    }

    #[test]
    fn widening_baseline_angles_preserves_validity() {
        let mut rng = SmallRng::seed_from_u64(7);
        let ellipsoid = Ellipsoid::WGS84;
        let center = GeographicPosition::ground(-35.0, 150.0);

        let sensors = [
            offset(&center, 0.0, 0.0),
            offset(&center, -3000.0, 2000.0),
            offset(&center, 2500.0, 3000.0),
        ];
        let pairing = [(0, 0), (1, 1), (2, 2)];

        let illuminators = |bearings: &[f64; 3], lengths: &[f64; 3]| -> Vec<GeographicPosition> {
            (0..3)
                .map(|i| {
                    let (sin, cos) = bearings[i].to_radians().sin_cos();
                    offset(&sensors[i], lengths[i] * sin, lengths[i] * cos)
                })
                .collect()
        };

        let angles = |illuminators: &[GeographicPosition]| -> [[f64; 3]; 3] {
            let baselines: Vec<_> = (0..3)
                .map(|i| {
                    illuminators[i].to_cartesian(&ellipsoid) - sensors[i].to_cartesian(&ellipsoid)
                })
                .collect();
            let mut angles = [[0.0; 3]; 3];
            for (i, j) in (0..3).tuple_combinations() {
                let angle = baseline_angle_deg(&baselines[i], &baselines[j]).unwrap();
                angles[i][j] = angle;
                angles[j][i] = angle;
            }
            angles
        };

        let mut tested = 0;

        for _ in 0..500 {
            let bearings: [f64; 3] = [
                rng.random_range(0.0..360.0),
                rng.random_range(0.0..360.0),
                rng.random_range(0.0..360.0),
            ];
            let lengths: [f64; 3] = [
                rng.random_range(5000.0..25_000.0),
                rng.random_range(5000.0..25_000.0),
                rng.random_range(5000.0..25_000.0),
            ];

            let initial = illuminators(&bearings, &lengths);
            if validator().validate(&sensors, &initial, &pairing).is_err() {
                continue;
            }

            // rotate one baseline, preserving its length
            let index = rng.random_range(0..3);
            let mut rotated = bearings;
            rotated[index] += rng.random_range(-30.0..30.0);

            let widened = illuminators(&rotated, &lengths);

            let (before, after) = (angles(&initial), angles(&widened));
            let widens = (0..3)
                .filter(|other| *other != index)
                .all(|other| after[index][other] >= before[index][other]);

            if !widens {
                continue;
            }

            tested += 1;

            assert!(
                validator().validate(&sensors, &widened, &pairing).is_ok(),
                "widening baseline #{} angles invalidated the layout",
                index + 1
            );
        }

        assert!(tested > 20, "too few widening rotations generated");
    }
}
