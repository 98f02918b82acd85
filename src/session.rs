use crate::config::{Config, FilterStrategy};
use crate::pipeline::{ObservationPipeline, ObservationRecord};
use crate::sighting::ScanEvent;
use anyhow::Result;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Rendering of observation records into log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// `<address>,<rssi>,<distance>`
    Csv,
    /// `Name: ... --- Current RSSI: ... --- filtered RSSI: ... --- distance: ...`
    Human,
}

impl LineFormat {
    /// The log-line convention of each observed pipeline variant.
    pub fn for_strategy(strategy: FilterStrategy) -> Self {
        match strategy {
            FilterStrategy::Kalman => LineFormat::Human,
            FilterStrategy::Mode => LineFormat::Csv,
        }
    }
}

/// What a finished session leaves behind for reporting and export.
#[derive(Debug, Default)]
pub struct SessionLog {
    /// Formatted record lines, in arrival order
    pub lines: Vec<String>,
    pub batches: u64,
    pub sightings: u64,
    pub records: u64,
    /// Distinct beacons that had live denoiser state at session stop
    pub beacons: usize,
}

/// Drives one scan session over a stream of delivered batches.
///
/// The engine is Idle until `run` is called; all estimator and histogram
/// state lives in the pipeline constructed there and is dropped when the
/// session ends, so a stopped session loses partial window state.
pub struct ScanEngine {
    config: Config,
    format: LineFormat,
    running: Arc<AtomicBool>,
}

impl ScanEngine {
    pub fn new(config: Config, format: LineFormat, running: Arc<AtomicBool>) -> Self {
        ScanEngine {
            config,
            format,
            running,
        }
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Consume events until the input ends or the running flag clears.
    ///
    /// The session loop is the only owner of pipeline state, so filter
    /// updates are never interleaved; retunes land between batches.
    pub async fn run(&self, mut rx: mpsc::Receiver<ScanEvent>) -> Result<SessionLog> {
        self.running.store(true, Ordering::SeqCst);

        let mut pipeline =
            ObservationPipeline::new(&self.config.filter, self.config.distance.clone());
        let mut log = SessionLog::default();

        info!(
            "Scan session started ({:?} filter, Q={}, R={})",
            self.config.filter.strategy,
            self.config.filter.process_noise,
            self.config.filter.measurement_noise
        );

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let event = tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = tokio::time::sleep(Duration::from_millis(200)) => continue,
            };

            match event {
                ScanEvent::Batch(batch) => {
                    log.batches += 1;
                    log.sightings += batch.len() as u64;

                    for record in pipeline.process_batch(&batch) {
                        let line = self.render(&record);
                        println!("{}", line);
                        log.lines.push(line);
                        log.records += 1;
                    }
                }
                ScanEvent::Retune(retune) => {
                    if let Some(q) = retune.process_noise {
                        if q > 0.0 {
                            pipeline.set_process_noise(q);
                            info!("Retuned process noise: Q={}", q);
                        } else {
                            warn!("Ignoring non-positive process noise: {}", q);
                        }
                    }
                    if let Some(r) = retune.measurement_noise {
                        if r > 0.0 {
                            pipeline.set_measurement_noise(r);
                            info!("Retuned measurement noise: R={}", r);
                        } else {
                            warn!("Ignoring non-positive measurement noise: {}", r);
                        }
                    }
                }
            }
        }

        log.beacons = pipeline.tracked_beacons();
        info!(
            "Scan session stopped. Batches: {}, sightings: {}, records: {}",
            log.batches, log.sightings, log.records
        );

        Ok(log)
    }

    fn render(&self, record: &ObservationRecord) -> String {
        match self.format {
            LineFormat::Csv => record.csv_line(),
            LineFormat::Human => record.display_line(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sighting::{Retune, Sighting};

    fn sighting(rssi: i32) -> Sighting {
        Sighting {
            address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
            name: Some("Feasy".to_string()),
            rssi,
        }
    }

    #[tokio::test]
    async fn test_session_end_to_end() {
        let config = Config::default();
        let running = Arc::new(AtomicBool::new(true));
        let engine = ScanEngine::new(config, LineFormat::Human, running);

        let (tx, rx) = mpsc::channel(8);
        tx.send(ScanEvent::Batch(vec![sighting(-65), sighting(-65)]))
            .await
            .unwrap();
        tx.send(ScanEvent::Batch(vec![sighting(-70)])).await.unwrap();
        drop(tx);

        let log = engine.run(rx).await.unwrap();

        assert_eq!(log.batches, 2);
        assert_eq!(log.sightings, 3);
        assert_eq!(log.records, 3);
        assert_eq!(log.beacons, 1);
        assert_eq!(
            log.lines[0],
            "Name: Feasy --- Current RSSI: -65 --- filtered RSSI: -65 --- distance: 5.62"
        );
    }

    #[tokio::test]
    async fn test_retune_between_batches() {
        let config = Config::default();
        let running = Arc::new(AtomicBool::new(true));
        let engine = ScanEngine::new(config, LineFormat::Csv, running);

        let (tx, rx) = mpsc::channel(8);
        tx.send(ScanEvent::Batch(vec![sighting(-65)])).await.unwrap();
        tx.send(ScanEvent::Retune(Retune {
            process_noise: None,
            measurement_noise: Some(1e9),
        }))
        .await
        .unwrap();
        tx.send(ScanEvent::Batch(vec![sighting(-90)])).await.unwrap();
        drop(tx);

        let log = engine.run(rx).await.unwrap();
        assert_eq!(log.records, 2);

        // Near-infinite R pins the estimate at the seeded value
        assert!(log.lines[1].starts_with("AA:BB:CC:DD:EE:FF,-6"));
    }

    #[tokio::test]
    async fn test_mode_session_holds_back_partial_window() {
        let mut config = Config::default();
        config.filter.strategy = FilterStrategy::Mode;
        let running = Arc::new(AtomicBool::new(true));
        let engine = ScanEngine::new(config, LineFormat::Csv, running);

        let (tx, rx) = mpsc::channel(8);
        tx.send(ScanEvent::Batch((0..7).map(|_| sighting(-60)).collect()))
            .await
            .unwrap();
        drop(tx);

        let log = engine.run(rx).await.unwrap();
        assert_eq!(log.sightings, 7);
        assert_eq!(log.records, 0);
    }
}
