pub mod test_utils;

use routelog_core::gps_processor::{GpsProcessor, ProcessResult};
use test_utils::sample;

#[test]
fn first_data() {
    let mut gps_processor = GpsProcessor::new();
    assert!(gps_processor.last_data().is_none());
    assert_eq!(
        gps_processor.preprocess(&sample(-23.5505, -46.6333, 1697349116449)),
        ProcessResult::Append
    );
    assert_eq!(gps_processor.last_data().unwrap().timestamp, 1697349116449);
}

#[test]
fn ignore_out_of_range() {
    let mut gps_processor = GpsProcessor::new();
    assert_eq!(
        gps_processor.preprocess(&sample(120.163856, 30.2719716, 1697349116449)),
        ProcessResult::Ignore
    );
    assert!(gps_processor.last_data().is_none());
}

#[test]
fn time_order() {
    let mut gps_processor = GpsProcessor::new();

    gps_processor.preprocess(&sample(30.2719716, 120.163856, 1697349116449));
    let result = gps_processor.preprocess(&sample(30.271981, 120.1639266, 1697349117449));
    assert_eq!(ProcessResult::Append, result);

    // same timestamp is still in order
    let result = gps_processor.preprocess(&sample(30.271981, 120.1639266, 1697349117449));
    assert_eq!(ProcessResult::Append, result);

    let result = gps_processor.preprocess(&sample(30.2719716, 120.163856, 1697349116000));
    assert_eq!(ProcessResult::OutOfOrder, result);
    // the newest one is remembered
    assert_eq!(gps_processor.last_data().unwrap().timestamp, 1697349117449);

    gps_processor.reset();
    let result = gps_processor.preprocess(&sample(30.2719716, 120.163856, 1697349116000));
    assert_eq!(ProcessResult::Append, result);
}
