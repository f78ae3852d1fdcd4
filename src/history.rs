use chrono::{DateTime, Local, TimeZone};
use std::fmt;

use crate::gps_processor::CoordinateSample;
use crate::route_log::{Route, RouteLogStore};

pub const EMPTY_HISTORY_TEXT: &str = "No locations recorded.";

/// One row of the history list.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub sample: CoordinateSample,
}

impl HistoryEntry {
    pub fn latitude_text(&self) -> String {
        format!("{:.6}", self.sample.latitude)
    }

    pub fn longitude_text(&self) -> String {
        format!("{:.6}", self.sample.longitude)
    }

    pub fn time_text_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: fmt::Display,
    {
        match self.sample.datetime() {
            Some(utc) => utc.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format!("invalid timestamp ({})", self.sample.timestamp),
        }
    }

    pub fn time_text(&self) -> String {
        self.time_text_in(&Local)
    }

    pub fn local_datetime(&self) -> Option<DateTime<Local>> {
        self.sample.datetime().map(|x| x.with_timezone(&Local))
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Latitude: {}\nLongitude: {}\nDate: {}",
            self.latitude_text(),
            self.longitude_text(),
            self.time_text()
        )
    }
}

// Newest first. The sort is stable, so samples sharing a timestamp keep
// their storage order.
pub fn sort_newest_first(route: &mut Route) {
    route.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Reads the whole route log for display. Unreadable history shows up as an
/// empty list.
pub async fn load(route_log: &dyn RouteLogStore) -> Vec<HistoryEntry> {
    let mut route = route_log.read_all().await;
    sort_newest_first(&mut route);
    route
        .into_iter()
        .map(|sample| HistoryEntry { sample })
        .collect()
}
