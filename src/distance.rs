/// Distance estimation from RSSI signal strength
///
/// Uses the Log-Distance Path Loss Model:
/// distance = d0 * 10 ^ ((-L - rssi) / (10 * n))
///
/// Where:
/// - L: reference path loss at `d0` (dB)
/// - rssi: signal strength (dBm), raw or denoised
/// - n: path loss exponent (environment dependent)
/// - d0: reference distance (meters)
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathLossModel {
    /// Reference path loss at the reference distance (dB)
    pub reference_loss: f64,
    /// Path loss exponent: 2.0 = free space, ~1.6-6.0 indoors depending on obstruction
    pub path_loss_exponent: f64,
    /// Reference distance (meters), almost always 1.0
    pub reference_distance: f64,
}

impl Default for PathLossModel {
    fn default() -> Self {
        PathLossModel {
            reference_loss: 50.0, // Feasy beacon at 0dBm tx power, ~1 meter
            path_loss_exponent: exponents::FREE_SPACE,
            reference_distance: 1.0,
        }
    }
}

/// Estimate distance in meters from an RSSI value.
///
/// Pure function of its inputs: defined, finite and strictly positive for
/// every finite RSSI, and strictly decreasing as RSSI increases.
pub fn estimate_distance(rssi_dbm: f64, model: &PathLossModel) -> f64 {
    let exponent =
        (-model.reference_loss - rssi_dbm) / (10.0 * model.path_loss_exponent);
    model.reference_distance * 10.0_f64.powf(exponent)
}

/// Typical path loss exponents for different environments
pub mod exponents {
    pub const FREE_SPACE: f64 = 2.0;
    pub const INDOOR_LINE_OF_SIGHT: f64 = 1.6;
    pub const OFFICE: f64 = 2.5;
    pub const URBAN: f64 = 3.0;
    pub const OBSTRUCTED_BUILDING: f64 = 6.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_loss_maps_to_reference_distance() {
        // At rssi == -L the exponent is zero, so distance == d0 exactly
        let model = PathLossModel::default();
        assert_eq!(estimate_distance(-50.0, &model), 1.0);
    }

    #[test]
    fn test_stronger_signal_means_shorter_distance() {
        let model = PathLossModel::default();
        let mut previous = estimate_distance(-100.0, &model);
        for rssi in (-99..=-20).map(f64::from) {
            let d = estimate_distance(rssi, &model);
            assert!(d < previous, "distance must decrease as RSSI rises");
            previous = d;
        }
    }

    #[test]
    fn test_always_positive() {
        let model = PathLossModel {
            reference_loss: 66.0,
            path_loss_exponent: exponents::OBSTRUCTED_BUILDING,
            reference_distance: 1.0,
        };
        for rssi in [-127.0, -80.0, -30.0, 0.0, 20.0] {
            let d = estimate_distance(rssi, &model);
            assert!(d.is_finite() && d > 0.0);
        }
    }

    #[test]
    fn test_idempotent() {
        let model = PathLossModel {
            reference_loss: 50.0,
            path_loss_exponent: exponents::URBAN,
            reference_distance: 1.0,
        };
        let a = estimate_distance(-73.0, &model);
        let b = estimate_distance(-73.0, &model);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_exponent_scales_estimate() {
        let free_space = PathLossModel::default();
        let obstructed = PathLossModel {
            path_loss_exponent: exponents::OBSTRUCTED_BUILDING,
            ..PathLossModel::default()
        };

        // The same weak signal reads as much closer in a lossy environment
        let rssi = -80.0;
        assert!(estimate_distance(rssi, &obstructed) < estimate_distance(rssi, &free_space));
    }
}
