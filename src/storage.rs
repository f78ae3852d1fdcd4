use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::location_source::{Accuracy, LocationOptions};
use crate::main_db::{MainDb, Setting};
use crate::route_log::{DbRouteLog, RouteLogStore};
use crate::session::SessionConfig;

/// Owns the main database and hands out the pieces that live in it: the
/// route log shared by the map and the history view, and the persisted
/// session settings.
pub struct Storage {
    support_dir: String,
    main_db: Arc<Mutex<MainDb>>,
    route_log: Arc<DbRouteLog>,
}

impl Storage {
    pub fn init(support_dir: String) -> Result<Self> {
        let main_db = Arc::new(Mutex::new(MainDb::open(&support_dir)?));
        let route_log = Arc::new(DbRouteLog::new(main_db.clone()));
        info!("[storage] initialized, support_dir={}", support_dir);
        Ok(Storage {
            support_dir,
            main_db,
            route_log,
        })
    }

    pub fn support_dir(&self) -> &str {
        &self.support_dir
    }

    pub fn route_log(&self) -> Arc<dyn RouteLogStore> {
        self.route_log.clone()
    }

    pub fn session_config(&self) -> SessionConfig {
        let default = SessionConfig::default();
        let mut main_db = self.main_db.lock().unwrap();
        SessionConfig {
            sample_interval_ms: main_db
                .get_setting_with_default(Setting::SampleIntervalMs, default.sample_interval_ms),
            throttle_interval_ms: main_db.get_setting_with_default(
                Setting::ThrottleIntervalMs,
                default.throttle_interval_ms,
            ),
            location_options: LocationOptions {
                accuracy: main_db.get_setting_with_default(
                    Setting::LocationAccuracy,
                    default.location_options.accuracy,
                ),
                ..default.location_options
            },
            stop_clears_history: main_db
                .get_setting_with_default(Setting::StopClearsHistory, default.stop_clears_history),
            recenter_delta: default.recenter_delta,
        }
        .sanitized()
    }

    pub fn set_sample_interval(&self, interval: Duration) -> Result<()> {
        if interval.as_millis() == 0 {
            bail!("sample interval must be positive");
        }
        let mut main_db = self.main_db.lock().unwrap();
        main_db.set_setting(Setting::SampleIntervalMs, interval.as_millis())
    }

    pub fn set_throttle_interval(&self, interval: Duration) -> Result<()> {
        let mut main_db = self.main_db.lock().unwrap();
        main_db.set_setting(Setting::ThrottleIntervalMs, interval.as_millis())
    }

    pub fn set_location_accuracy(&self, accuracy: Accuracy) -> Result<()> {
        let mut main_db = self.main_db.lock().unwrap();
        main_db.set_setting(Setting::LocationAccuracy, accuracy)
    }

    pub fn set_stop_clears_history(&self, enable: bool) -> Result<()> {
        debug!("[storage] stop_clears_history={}", enable);
        let mut main_db = self.main_db.lock().unwrap();
        main_db.set_setting(Setting::StopClearsHistory, enable)
    }

    pub fn flush(&self) -> Result<()> {
        debug!("[storage] flushing");
        let main_db = self.main_db.lock().unwrap();
        main_db.flush()
    }
}
