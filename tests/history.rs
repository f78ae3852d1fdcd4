pub mod test_utils;

use chrono::FixedOffset;
use routelog_core::{
    history::{self, HistoryEntry, EMPTY_HISTORY_TEXT},
    route_log::{MemoryRouteLog, RouteLogStore},
};
use test_utils::sample;

#[tokio::test]
async fn newest_first_without_touching_storage_order() {
    let store = MemoryRouteLog::new();
    store.append(sample(1.0, 1.0, 2000)).await.unwrap();
    store.append(sample(2.0, 2.0, 1000)).await.unwrap();
    store.append(sample(3.0, 3.0, 3000)).await.unwrap();
    store.append(sample(4.0, 4.0, 3000)).await.unwrap();

    let entries = history::load(&store).await;
    let latitudes: Vec<f64> = entries.iter().map(|x| x.sample.latitude).collect();
    // ties keep storage order
    assert_eq!(latitudes, vec![3.0, 4.0, 1.0, 2.0]);

    let stored: Vec<i64> = store.read_all().await.iter().map(|x| x.timestamp).collect();
    assert_eq!(stored, vec![2000, 1000, 3000, 3000]);
}

#[tokio::test]
async fn unreadable_history_is_empty() {
    let store = MemoryRouteLog::new();
    assert!(history::load(&store).await.is_empty());
    store.put_raw("garbage");
    assert!(history::load(&store).await.is_empty());
    assert_eq!(EMPTY_HISTORY_TEXT, "No locations recorded.");
}

#[test]
fn formatting() {
    let entry = HistoryEntry {
        sample: sample(-23.55052, -46.633308123, 1_700_000_000_000),
    };
    assert_eq!(entry.latitude_text(), "-23.550520");
    assert_eq!(entry.longitude_text(), "-46.633308");

    let utc_minus_3 = FixedOffset::west_opt(3 * 3600).unwrap();
    assert_eq!(entry.time_text_in(&utc_minus_3), "2023-11-14 19:13:20");
    assert_eq!(
        entry.local_datetime().unwrap().timestamp_millis(),
        1_700_000_000_000
    );

    let text = entry.to_string();
    assert!(text.starts_with("Latitude: -23.550520\nLongitude: -46.633308\nDate: "));
}

#[test]
fn invalid_timestamp() {
    let entry = HistoryEntry {
        sample: sample(0.0, 0.0, i64::MAX),
    };
    assert_eq!(entry.time_text(), format!("invalid timestamp ({})", i64::MAX));
}
