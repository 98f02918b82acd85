use macaddr::MacAddr6;
use serde::Deserialize;

/// One observed beacon event as delivered by the external scanner.
#[derive(Debug, Clone, Deserialize)]
pub struct Sighting {
    /// Beacon hardware address
    pub address: MacAddr6,
    /// Advertised device name, if any
    #[serde(default)]
    pub name: Option<String>,
    /// Raw received signal strength (dBm)
    pub rssi: i32,
}

/// Runtime adjustment of the Kalman noise parameters.
///
/// Applied between batches; the next `update` call sees the new values
/// without the estimate or covariance being reset.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Retune {
    pub process_noise: Option<f64>,
    pub measurement_noise: Option<f64>,
}

/// One unit of work delivered to a scan session.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A batch of sightings from one scan cycle
    Batch(Vec<Sighting>),
    /// Operator retune of the filter noise parameters
    Retune(Retune),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputLine {
    Retune { retune: Retune },
    Batch(Vec<Sighting>),
    Single(Sighting),
}

/// Parse one line of replay input.
///
/// A line holds either a JSON array of sightings (one delivered batch), a
/// single sighting object, or a `{"retune": ...}` control object.
pub fn parse_line(line: &str) -> serde_json::Result<ScanEvent> {
    let event = match serde_json::from_str::<InputLine>(line)? {
        InputLine::Retune { retune } => ScanEvent::Retune(retune),
        InputLine::Batch(batch) => ScanEvent::Batch(batch),
        InputLine::Single(sighting) => ScanEvent::Batch(vec![sighting]),
    };
    Ok(event)
}
