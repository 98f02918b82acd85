use crate::session::SessionLog;
use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

pub struct ReportGenerator;

impl ReportGenerator {
    /// Write the observation log to `<dir>/<yyyy-MM-dd-HH-mm-ss>.csv`,
    /// one record per line, newline-terminated, verbatim.
    pub fn export_csv(log: &SessionLog, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory: {:?}", dir))?;

        let stamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
        let path = dir.join(format!("{}.csv", stamp));
        Self::export_to(log, &path)?;

        Ok(path)
    }

    /// Write the observation log to an explicit file path.
    pub fn export_to(log: &SessionLog, path: &Path) -> Result<()> {
        let mut content = String::new();
        for line in &log.lines {
            content.push_str(line);
            content.push('\n');
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write export file: {:?}", path))?;

        Ok(())
    }

    pub fn print_summary(log: &SessionLog) {
        println!();
        println!("Session Summary");
        println!("---------------");
        println!("Batches:   {}", log.batches);
        println!("Sightings: {}", log.sightings);
        println!("Records:   {}", log.records);
        println!("Beacons:   {}", log.beacons);

        if log.sightings > 0 && log.records < log.sightings {
            println!(
                "Held back: {} (samples still inside a mode window)",
                log.sightings - log.records
            );
        }
    }
}
