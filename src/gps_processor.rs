use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single fix reported by the location source. Never mutated after it is
/// created.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSample {
    pub latitude: f64,
    pub longitude: f64,
    /// epoch milliseconds
    pub timestamp: i64,
}

impl CoordinateSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        CoordinateSample {
            latitude,
            longitude,
            timestamp,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProcessResult {
    Append,
    // Older than the newest sample seen so far. Still stored, in arrival
    // order. Sorting is left to whoever displays the history.
    OutOfOrder,
    // Not a usable coordinate, never stored.
    Ignore,
}

pub struct GpsProcessor {
    last_data: Option<CoordinateSample>,
}

impl GpsProcessor {
    pub fn new() -> Self {
        GpsProcessor { last_data: None }
    }

    pub fn last_data(&self) -> Option<&CoordinateSample> {
        self.last_data.as_ref()
    }

    pub fn reset(&mut self) {
        self.last_data = None;
    }

    pub fn preprocess(&mut self, curr_data: &CoordinateSample) -> ProcessResult {
        if !curr_data.is_valid() {
            return ProcessResult::Ignore;
        }
        let result = match &self.last_data {
            None => ProcessResult::Append,
            Some(last_data) => {
                if curr_data.timestamp < last_data.timestamp {
                    // NOTE: clock skew or a stale cached fix. Dropping these
                    // would lose data the user actually recorded, so we keep
                    // them and only remember the newest timestamp.
                    ProcessResult::OutOfOrder
                } else {
                    ProcessResult::Append
                }
            }
        };
        if result == ProcessResult::Append {
            self.last_data = Some(*curr_data);
        }
        result
    }
}
