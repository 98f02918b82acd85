use crate::sighting::{parse_line, ScanEvent};
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

/// Feeds sighting batches into a scan session, standing in for the external
/// scan notifier: one JSON line per delivered batch, read from a file or
/// stdin.
pub struct ReplaySource {
    input: Option<PathBuf>,
    pace_ms: u64,
}

impl ReplaySource {
    pub fn new(input: Option<PathBuf>, pace_ms: u64) -> Self {
        ReplaySource { input, pace_ms }
    }

    /// Read lines until the input ends or the running flag clears.
    ///
    /// Blocking; run on a blocking task. Malformed lines are skipped with a
    /// warning, blank lines are ignored. Dropping the sender on return ends
    /// the session cleanly.
    pub fn run(&self, tx: mpsc::Sender<ScanEvent>, running: Arc<AtomicBool>) -> Result<()> {
        let reader: Box<dyn BufRead> = match &self.input {
            Some(path) => {
                info!("Replaying sightings from {:?}", path);
                let file = File::open(path)
                    .with_context(|| format!("Failed to open input file: {:?}", path))?;
                Box::new(BufReader::new(file))
            }
            None => {
                info!("Reading sightings from stdin");
                Box::new(BufReader::new(io::stdin()))
            }
        };

        for line in reader.lines() {
            if !running.load(Ordering::SeqCst) {
                break;
            }

            let line = line.context("Failed to read replay input")?;
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line) {
                Ok(event) => {
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Skipping malformed input line: {}", e);
                    continue;
                }
            }

            if self.pace_ms > 0 {
                thread::sleep(Duration::from_millis(self.pace_ms));
            }
        }

        info!("Replay input finished");
        Ok(())
    }
}
