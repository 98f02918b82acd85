use crate::config::{FilterConfig, FilterStrategy};
use crate::distance::{estimate_distance, PathLossModel};
use crate::histogram::ModeWindow;
use crate::kalman::KalmanFilter;
use crate::sighting::Sighting;
use log::debug;
use macaddr::MacAddr6;
use std::collections::HashMap;

/// One pipeline output: the denoised strength and distance for a sighting.
#[derive(Debug, Clone)]
pub struct ObservationRecord {
    pub address: MacAddr6,
    pub name: Option<String>,
    /// The raw sample that completed this record
    pub raw_rssi: i32,
    /// Denoised value fed into the distance conversion
    pub rssi: f64,
    pub distance_m: f64,
}

impl ObservationRecord {
    /// `<address>,<rssi>,<distance>` - the export file line format
    pub fn csv_line(&self) -> String {
        format!("{},{},{}", self.address, self.rssi, self.distance_m)
    }

    /// Human-readable log line with both the raw and the filtered reading
    pub fn display_line(&self) -> String {
        format!(
            "Name: {} --- Current RSSI: {} --- filtered RSSI: {} --- distance: {:.2}",
            self.name.as_deref().unwrap_or("<unknown>"),
            self.raw_rssi,
            self.rssi,
            self.distance_m
        )
    }
}

#[derive(Debug, Clone)]
enum Denoiser {
    Kalman(KalmanFilter),
    Mode(ModeWindow),
}

impl Denoiser {
    fn observe(&mut self, rssi: i32) -> Option<f64> {
        match self {
            Denoiser::Kalman(filter) => Some(filter.update(rssi as f64)),
            Denoiser::Mode(window) => window.observe(rssi).map(f64::from),
        }
    }
}

/// Turns raw sighting batches into observation records.
///
/// Denoiser state is keyed by beacon address and created lazily on the first
/// sighting of each stream, so distinct beacons never share filter state.
/// All transient state dies with the pipeline when the session stops.
pub struct ObservationPipeline {
    strategy: FilterStrategy,
    process_noise: f64,
    measurement_noise: f64,
    window_size: usize,
    model: PathLossModel,
    streams: HashMap<MacAddr6, Denoiser>,
}

impl ObservationPipeline {
    pub fn new(filter: &FilterConfig, model: PathLossModel) -> Self {
        ObservationPipeline {
            strategy: filter.strategy,
            process_noise: filter.process_noise,
            measurement_noise: filter.measurement_noise,
            window_size: filter.window_size,
            model,
            streams: HashMap::new(),
        }
    }

    /// Process one delivered batch, in arrival order.
    ///
    /// A sighting whose mode window is still filling produces no record.
    pub fn process_batch(&mut self, batch: &[Sighting]) -> Vec<ObservationRecord> {
        let mut records = Vec::new();
        for sighting in batch {
            if let Some(record) = self.process(sighting) {
                records.push(record);
            }
        }
        records
    }

    fn process(&mut self, sighting: &Sighting) -> Option<ObservationRecord> {
        let strategy = self.strategy;
        let (q, r) = (self.process_noise, self.measurement_noise);
        let window_size = self.window_size;

        let denoiser = self
            .streams
            .entry(sighting.address)
            .or_insert_with(|| match strategy {
                FilterStrategy::Kalman => Denoiser::Kalman(KalmanFilter::new(q, r)),
                FilterStrategy::Mode => Denoiser::Mode(ModeWindow::new(window_size)),
            });

        let rssi = denoiser.observe(sighting.rssi)?;
        let distance_m = estimate_distance(rssi, &self.model);

        debug!(
            "{}: raw={}dBm denoised={:.2}dBm distance={:.2}m",
            sighting.address, sighting.rssi, rssi, distance_m
        );

        Some(ObservationRecord {
            address: sighting.address,
            name: sighting.name.clone(),
            raw_rssi: sighting.rssi,
            rssi,
            distance_m,
        })
    }

    /// Retune Q for every live Kalman stream and for streams created later.
    pub fn set_process_noise(&mut self, q: f64) {
        self.process_noise = q;
        for denoiser in self.streams.values_mut() {
            if let Denoiser::Kalman(filter) = denoiser {
                filter.set_process_noise(q);
            }
        }
    }

    /// Retune R for every live Kalman stream and for streams created later.
    pub fn set_measurement_noise(&mut self, r: f64) {
        self.measurement_noise = r;
        for denoiser in self.streams.values_mut() {
            if let Denoiser::Kalman(filter) = denoiser {
                filter.set_measurement_noise(r);
            }
        }
    }

    pub fn strategy(&self) -> FilterStrategy {
        self.strategy
    }

    /// Number of beacon streams with live denoiser state.
    pub fn tracked_beacons(&self) -> usize {
        self.streams.len()
    }
}
