/// Recursive scalar Kalman filter over a single RSSI stream.
///
/// Models the beacon's true signal strength as one slowly drifting value
/// observed through measurement noise. The first sample seeds the estimate;
/// every later sample is blended in through the Kalman gain.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    q: f64, // process noise variance
    r: f64, // measurement noise variance
    p: f64, // estimation error covariance
    x: f64, // state estimate
    initialized: bool,
}

/// Error covariance before the first measurement arrives.
const INITIAL_COVARIANCE: f64 = 1.0;

impl KalmanFilter {
    /// Create a filter with the given noise variances.
    ///
    /// Positivity of `process_noise` and `measurement_noise` is the caller's
    /// responsibility; the configuration layer rejects non-positive values
    /// before a filter is ever built.
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        KalmanFilter {
            q: process_noise,
            r: measurement_noise,
            p: INITIAL_COVARIANCE,
            x: 0.0,
            initialized: false,
        }
    }

    /// Incorporate a new measurement and return the updated estimate.
    pub fn update(&mut self, measurement: f64) -> f64 {
        if !self.initialized {
            self.x = measurement;
            self.initialized = true;
            return self.x;
        }

        // Predict
        self.p += self.q;

        // Correct
        let k = self.p / (self.p + self.r);
        self.x += k * (measurement - self.x);
        self.p = (1.0 - k) * self.p;

        self.x
    }

    /// Retune the process noise without resetting estimate or covariance.
    pub fn set_process_noise(&mut self, q: f64) {
        self.q = q;
    }

    /// Retune the measurement noise without resetting estimate or covariance.
    pub fn set_measurement_noise(&mut self, r: f64) {
        self.r = r;
    }

    pub fn process_noise(&self) -> f64 {
        self.q
    }

    pub fn measurement_noise(&self) -> f64 {
        self.r
    }

    /// Current estimate without updating.
    pub fn estimate(&self) -> f64 {
        self.x
    }

    /// Current estimation error covariance. Never negative.
    pub fn error_covariance(&self) -> f64 {
        self.p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tuning from a Feasy beacon at 100ms advertising interval
    const Q: f64 = 0.33;
    const R: f64 = 2.847171;

    #[test]
    fn test_first_sample_seeds_estimate() {
        let mut filter = KalmanFilter::new(Q, R);
        assert_eq!(filter.update(-65.0), -65.0);
        assert_eq!(filter.estimate(), -65.0);
    }

    #[test]
    fn test_repeated_measurement_is_fixed_point() {
        let mut filter = KalmanFilter::new(Q, R);
        filter.update(-65.0);
        let p_before = filter.error_covariance();

        let estimate = filter.update(-65.0);
        assert_eq!(estimate, -65.0);
        assert!(filter.error_covariance() <= p_before + Q);
    }

    #[test]
    fn test_filtered_value_between_estimate_and_sample() {
        // Three sightings: -65, -65, -70
        let mut filter = KalmanFilter::new(Q, R);
        filter.update(-65.0);
        filter.update(-65.0);

        let filtered = filter.update(-70.0);
        assert!(filtered < -65.0 && filtered > -70.0);
    }

    #[test]
    fn test_converges_toward_repeated_measurement() {
        let mut filter = KalmanFilter::new(Q, R);
        filter.update(0.0);

        let mut previous = 0.0;
        for _ in 0..50 {
            let estimate = filter.update(10.0);
            assert!(estimate > previous);
            assert!(estimate < 10.0);
            previous = estimate;
        }
        assert!((previous - 10.0).abs() < 0.5);
    }

    #[test]
    fn test_covariance_never_negative() {
        let mut filter = KalmanFilter::new(Q, R);
        for rssi in [-60.0, -90.0, -40.0, -72.0, -65.0, -100.0, -30.0] {
            filter.update(rssi);
            assert!(filter.error_covariance() >= 0.0);
        }
    }

    #[test]
    fn test_retune_preserves_state() {
        let mut filter = KalmanFilter::new(Q, R);
        filter.update(-65.0);
        filter.update(-68.0);
        let estimate = filter.estimate();
        let covariance = filter.error_covariance();

        filter.set_process_noise(1.5);
        filter.set_measurement_noise(4.0);

        assert_eq!(filter.estimate(), estimate);
        assert_eq!(filter.error_covariance(), covariance);
        assert_eq!(filter.process_noise(), 1.5);
        assert_eq!(filter.measurement_noise(), 4.0);
    }

    #[test]
    fn test_smooths_outlier() {
        let mut filter = KalmanFilter::new(Q, R);
        filter.update(-60.0);
        filter.update(-60.0);
        filter.update(-60.0);

        // A single spike should be pulled well back toward the estimate
        let filtered = filter.update(-90.0);
        assert!(filtered > -75.0);
    }
}
