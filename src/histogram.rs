use std::collections::BTreeMap;

/// Samples per window when not configured otherwise.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Windowed mode filter over raw RSSI samples.
///
/// Accumulates a fixed-size window of samples into a frequency table and
/// emits the most frequent value as the representative for that window.
/// Ties resolve to the smallest RSSI value, so the result is independent of
/// insertion order.
#[derive(Debug, Clone)]
pub struct ModeWindow {
    window_size: usize,
    samples: usize,
    counts: BTreeMap<i32, u32>,
}

impl ModeWindow {
    pub fn new(window_size: usize) -> Self {
        ModeWindow {
            window_size,
            samples: 0,
            counts: BTreeMap::new(),
        }
    }

    /// Record one sample; on the call that fills the window, return the
    /// window's mode and start a fresh window.
    pub fn observe(&mut self, rssi: i32) -> Option<i32> {
        self.samples += 1;
        *self.counts.entry(rssi).or_insert(0) += 1;

        if self.samples < self.window_size {
            return None;
        }

        let mut mode = rssi;
        let mut max_count = 0;
        for (&value, &count) in &self.counts {
            if count > max_count {
                max_count = count;
                mode = value;
            }
        }

        self.samples = 0;
        self.counts.clear();

        Some(mode)
    }

    /// Samples recorded in the current window. Always below the window size.
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

impl Default for ModeWindow {
    fn default() -> Self {
        ModeWindow::new(DEFAULT_WINDOW_SIZE)
    }
}
