use nalgebra::{Vector3, Vector6};

use crate::coords::{Ellipsoid, GeographicPosition, LocalVelocity};

/// [TargetState] is the optimization variable: position and velocity,
/// both expressed in the Earth-fixed frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TargetState {
    /// ECEF position (m)
    pub position_ecef_m: Vector3<f64>,
    /// ECEF velocity (m.s⁻¹)
    pub velocity_ecef_m_s: Vector3<f64>,
}

impl std::fmt::Display for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (p, v) = (self.position_ecef_m, self.velocity_ecef_m_s);
        write!(
            f,
            "x={:.3}m y={:.3}m z={:.3}m vx={:.3}m/s vy={:.3}m/s vz={:.3}m/s",
            p[0], p[1], p[2], v[0], v[1], v[2],
        )
    }
}

impl TargetState {
    /// Builds a new [TargetState] from ECEF position (m) and velocity (m.s⁻¹)
    pub fn new(position_ecef_m: Vector3<f64>, velocity_ecef_m_s: Vector3<f64>) -> Self {
        Self {
            position_ecef_m,
            velocity_ecef_m_s,
        }
    }

    /// Builds a new [TargetState] from [GeographicPosition] and [LocalVelocity].
    /// The velocity is rotated from the tangent plane at said position.
    pub fn from_geographic(
        position: &GeographicPosition,
        velocity: &LocalVelocity,
        ellipsoid: &Ellipsoid,
    ) -> Self {
        Self {
            position_ecef_m: position.to_cartesian(ellipsoid),
            velocity_ecef_m_s: velocity.to_cartesian(position),
        }
    }

    /// Builds a new [TargetState] from a 6D vector (x, y, z, vx, vy, vz)
    pub fn from_vector(x: &Vector6<f64>) -> Self {
        Self {
            position_ecef_m: Vector3::new(x[0], x[1], x[2]),
            velocity_ecef_m_s: Vector3::new(x[3], x[4], x[5]),
        }
    }

    /// Returns this [TargetState] as 6D vector (x, y, z, vx, vy, vz)
    pub fn to_vector(&self) -> Vector6<f64> {
        let (p, v) = (self.position_ecef_m, self.velocity_ecef_m_s);
        Vector6::new(p[0], p[1], p[2], v[0], v[1], v[2])
    }

    /// Returns corrected [TargetState]
    pub fn correct(&self, dx: &Vector6<f64>) -> Self {
        Self::from_vector(&(self.to_vector() + dx))
    }

    /// Geodetic position of this [TargetState]
    pub fn geographic(&self, ellipsoid: &Ellipsoid) -> GeographicPosition {
        GeographicPosition::from_cartesian(&self.position_ecef_m, ellipsoid)
    }

    /// Velocity of this [TargetState], in the tangent plane at its own position
    pub fn local_velocity(&self, ellipsoid: &Ellipsoid) -> LocalVelocity {
        LocalVelocity::from_cartesian(&self.velocity_ecef_m_s, &self.geographic(ellipsoid))
    }

    /// True if all components are finite
    pub fn is_finite(&self) -> bool {
        self.to_vector().iter().all(|x| x.is_finite())
    }
}
