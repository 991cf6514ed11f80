/// Speed of light in m.s⁻¹
pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;

/// Hz per MHz
pub const HZ_PER_MHZ: f64 = 1.0E6;

/// Meters per kilometer
pub const M_PER_KM: f64 = 1.0E3;
