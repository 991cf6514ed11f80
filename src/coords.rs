//! Geographic, Earth-fixed and local tangent plane coordinates
use map_3d::{
    deg2rad, ecef2enu, ecef2geodetic, enu2ecef, enu2uvw, geodetic2ecef, rad2deg, uvw2enu,
};

use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reference [Ellipsoid] of revolution
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Ellipsoid {
    #[default]
    WGS84,
    WGS72,
    GRS80,
}

impl Ellipsoid {
    /// Matching [map_3d::Ellipsoid]
    pub(crate) fn to_map_3d(self) -> map_3d::Ellipsoid {
        match self {
            Self::WGS84 => map_3d::Ellipsoid::WGS84,
            Self::WGS72 => map_3d::Ellipsoid::WGS72,
            Self::GRS80 => map_3d::Ellipsoid::GRS80,
        }
    }
}

/// Geodetic position: decimal degrees and meters above the [Ellipsoid].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeographicPosition {
    /// Latitude (ddeg)
    pub latitude_deg: f64,
    /// Longitude (ddeg)
    pub longitude_deg: f64,
    /// Altitude (m)
    pub altitude_m: f64,
}

impl std::fmt::Display for GeographicPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lat={:.6}° lon={:.6}° alt={:.1}m",
            self.latitude_deg, self.longitude_deg, self.altitude_m
        )
    }
}

impl GeographicPosition {
    /// Builds a new [GeographicPosition]
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }

    /// Builds a ground level [GeographicPosition]
    pub fn ground(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self::new(latitude_deg, longitude_deg, 0.0)
    }

    /// Copies this [GeographicPosition] with a new altitude (m)
    pub fn with_altitude(&self, altitude_m: f64) -> Self {
        Self {
            altitude_m,
            ..*self
        }
    }

    /// (latitude, longitude) in radians
    fn radians(&self) -> (f64, f64) {
        (deg2rad(self.latitude_deg), deg2rad(self.longitude_deg))
    }

    /// Converts to Earth-fixed cartesian coordinates (m)
    pub fn to_cartesian(&self, ellipsoid: &Ellipsoid) -> Vector3<f64> {
        let (lat, lon) = self.radians();
        let (x, y, z) = geodetic2ecef(lat, lon, self.altitude_m, ellipsoid.to_map_3d());
        Vector3::new(x, y, z)
    }

    /// Builds [GeographicPosition] from Earth-fixed cartesian coordinates (m).
    /// Longitude is expressed in ]-180°, 180°].
    pub fn from_cartesian(ecef: &Vector3<f64>, ellipsoid: &Ellipsoid) -> Self {
        let (lat, lon, altitude_m) =
            ecef2geodetic(ecef[0], ecef[1], ecef[2], ellipsoid.to_map_3d());

        Self {
            latitude_deg: rad2deg(lat),
            longitude_deg: wrap_longitude(rad2deg(lon)),
            altitude_m,
        }
    }

    /// Converts to local East-North-Up coordinates (m), with respect to given origin
    pub fn to_enu(&self, origin: &GeographicPosition, ellipsoid: &Ellipsoid) -> Vector3<f64> {
        ecef_to_enu(&self.to_cartesian(ellipsoid), origin, ellipsoid)
    }
}

/// Wraps a longitude (ddeg) into ]-180°, 180°]
pub fn wrap_longitude(longitude_deg: f64) -> f64 {
    let wrapped = (longitude_deg + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

/// Velocity expressed in the local East-North-Up frame (m.s⁻¹)
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalVelocity {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

impl LocalVelocity {
    /// Builds a new [LocalVelocity]
    pub fn new(east: f64, north: f64, up: f64) -> Self {
        Self { east, north, up }
    }

    /// [LocalVelocity] as [Vector3] (east, north, up)
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.east, self.north, self.up)
    }

    /// Rotates this local velocity into the Earth-fixed frame,
    /// at the reference point where the tangent plane is defined.
    pub fn to_cartesian(&self, reference: &GeographicPosition) -> Vector3<f64> {
        let (lat, lon) = reference.radians();
        let (u, v, w) = enu2uvw(self.east, self.north, self.up, lat, lon);
        Vector3::new(u, v, w)
    }

    /// Rotates an Earth-fixed velocity into the tangent plane at the reference point.
    pub fn from_cartesian(velocity_ecef: &Vector3<f64>, reference: &GeographicPosition) -> Self {
        let (lat, lon) = reference.radians();
        let (east, north, up) = uvw2enu(
            velocity_ecef[0],
            velocity_ecef[1],
            velocity_ecef[2],
            lat,
            lon,
        );
        Self::new(east, north, up)
    }

    /// Magnitude of the largest component (m.s⁻¹)
    pub fn max_component(&self) -> f64 {
        self.east.abs().max(self.north.abs()).max(self.up.abs())
    }
}

/// Rotation matrix from local East-North-Up to Earth-fixed axes,
/// at given latitude and longitude (ddeg). Columns are the
/// east, north and up unit vectors.
pub fn enu_to_ecef_rotation(latitude_deg: f64, longitude_deg: f64) -> Matrix3<f64> {
    let reference = GeographicPosition::ground(latitude_deg, longitude_deg);
    Matrix3::from_columns(&[
        LocalVelocity::new(1.0, 0.0, 0.0).to_cartesian(&reference),
        LocalVelocity::new(0.0, 1.0, 0.0).to_cartesian(&reference),
        LocalVelocity::new(0.0, 0.0, 1.0).to_cartesian(&reference),
    ])
}

/// Expresses an Earth-fixed point (m) in the ENU frame anchored at origin.
pub fn ecef_to_enu(
    point: &Vector3<f64>,
    origin: &GeographicPosition,
    ellipsoid: &Ellipsoid,
) -> Vector3<f64> {
    let (lat0, lon0) = origin.radians();
    let (e, n, u) = ecef2enu(
        point[0],
        point[1],
        point[2],
        lat0,
        lon0,
        origin.altitude_m,
        ellipsoid.to_map_3d(),
    );
    Vector3::new(e, n, u)
}

/// Expresses a local ENU point (m), anchored at origin, in Earth-fixed coordinates.
pub fn enu_to_ecef(
    enu: &Vector3<f64>,
    origin: &GeographicPosition,
    ellipsoid: &Ellipsoid,
) -> Vector3<f64> {
    let (lat0, lon0) = origin.radians();
    let (x, y, z) = enu2ecef(
        enu[0],
        enu[1],
        enu[2],
        lat0,
        lon0,
        origin.altitude_m,
        ellipsoid.to_map_3d(),
    );
    Vector3::new(x, y, z)
}
