use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::gps_processor::CoordinateSample;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
pub enum Accuracy {
    Lowest,
    Low,
    Balanced,
    High,
    Highest,
    BestForNavigation,
}

/// Hints for the platform. The source is free to return a stale or
/// approximate fix anyway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationOptions {
    pub accuracy: Accuracy,
    pub time_interval_ms: u64,
    pub distance_interval_m: f64,
}

impl LocationOptions {
    pub fn time_interval(&self) -> Duration {
        Duration::from_millis(self.time_interval_ms)
    }
}

impl Default for LocationOptions {
    fn default() -> Self {
        LocationOptions {
            accuracy: Accuracy::Balanced,
            time_interval_ms: 5000,
            distance_interval_m: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("permission to access location was denied")]
    PermissionDenied,
    #[error("location is unavailable: {0}")]
    Unavailable(String),
    #[error("timed out waiting for a location fix")]
    Timeout,
    #[error("location source returned an invalid fix ({latitude}, {longitude})")]
    InvalidFix { latitude: f64, longitude: f64 },
}

#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn read_once(&self, options: &LocationOptions)
        -> Result<CoordinateSample, LocationError>;
}
