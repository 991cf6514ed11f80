use crate::{
    apriori::AprioriSource,
    coords::{GeographicPosition, LocalVelocity},
    prelude::Epoch,
};

/// [SolveResult] is the outcome of a converged resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    /// Timestamp of the first detection
    pub timestamp: Epoch,
    /// Target [GeographicPosition]
    pub position: GeographicPosition,
    /// Target velocity, in the tangent plane at [Self::position]
    pub velocity: LocalVelocity,
    /// Final residual norm, range residuals in meters
    /// and Doppler residuals in m.s⁻¹ of bistatic rate.
    pub convergence_metric: f64,
    /// Measured minus predicted values:
    /// three bistatic ranges (km) then three Doppler shifts (Hz), in detection order.
    pub residuals: [f64; 6],
    /// Number of Levenberg-Marquardt iterations
    pub iterations: usize,
    /// Origin of the initial state
    pub initial_guess: AprioriSource,
}

impl SolveResult {
    /// Bistatic range residuals (km)
    pub fn range_residuals_km(&self) -> [f64; 3] {
        [self.residuals[0], self.residuals[1], self.residuals[2]]
    }

    /// Doppler residuals (Hz)
    pub fn doppler_residuals_hz(&self) -> [f64; 3] {
        [self.residuals[3], self.residuals[4], self.residuals[5]]
    }
}
