use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::gps_processor::CoordinateSample;
use crate::main_db::MainDb;

/* The route log is the single durable list of fixes, shared by the live map
(writer, through the sampling session) and the history view (reader).

It is stored as one value under a fixed key of a key-value record, so every
`append` is a read-modify-write. Implementations hold a lock for the whole
cycle so a concurrent `read_all` sees the sample or not, never half of it.
*/

pub type Route = Vec<CoordinateSample>;

pub const ROUTE_HISTORY_KEY: &str = "locationHistory";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage operation failed: {0}")]
    Io(String),
    #[error("stored route history is corrupt: {0}")]
    Corrupt(String),
    #[error("unsupported route history version: {0}")]
    UnsupportedVersion(u64),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(error: rusqlite::Error) -> Self {
        PersistenceError::Io(error.to_string())
    }
}

impl From<anyhow::Error> for PersistenceError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<PersistenceError>() {
            Ok(error) => error,
            Err(error) => PersistenceError::Io(format!("{:#}", error)),
        }
    }
}

pub mod codec {
    use serde::Serialize;
    use serde_json::Value;

    use super::{PersistenceError, Route};
    use crate::gps_processor::CoordinateSample;

    pub const CURRENT_VERSION: u64 = 1;

    #[derive(Serialize)]
    struct Envelope<'a> {
        version: u64,
        samples: &'a [CoordinateSample],
    }

    pub fn encode(samples: &[CoordinateSample]) -> Result<String, PersistenceError> {
        serde_json::to_string(&Envelope {
            version: CURRENT_VERSION,
            samples,
        })
        .map_err(|e| PersistenceError::Io(e.to_string()))
    }

    // Also accepts a bare array of samples, which is how the history was
    // written before the envelope existed.
    pub fn decode(text: &str) -> Result<Route, PersistenceError> {
        let corrupt = |e: serde_json::Error| PersistenceError::Corrupt(e.to_string());
        let samples = match serde_json::from_str::<Value>(text).map_err(corrupt)? {
            legacy @ Value::Array(_) => legacy,
            Value::Object(mut envelope) => {
                match envelope.get("version").and_then(Value::as_u64) {
                    Some(CURRENT_VERSION) => (),
                    Some(version) => return Err(PersistenceError::UnsupportedVersion(version)),
                    None => {
                        return Err(PersistenceError::Corrupt(
                            "missing `version` field".to_string(),
                        ))
                    }
                }
                envelope
                    .remove("samples")
                    .ok_or_else(|| PersistenceError::Corrupt("missing `samples` field".into()))?
            }
            _ => {
                return Err(PersistenceError::Corrupt(
                    "expected an object or an array".to_string(),
                ))
            }
        };
        serde_json::from_value(samples).map_err(corrupt)
    }

    pub fn append(
        existing: Option<&str>,
        sample: CoordinateSample,
    ) -> Result<String, PersistenceError> {
        let mut samples = match existing {
            None => Vec::new(),
            Some(text) => decode(text)?,
        };
        samples.push(sample);
        encode(&samples)
    }
}

#[async_trait]
pub trait RouteLogStore: Send + Sync {
    async fn append(&self, sample: CoordinateSample) -> Result<(), PersistenceError>;

    /// All samples in insertion order, or the reason they cannot be read.
    async fn try_read_all(&self) -> Result<Route, PersistenceError>;

    /// Like `try_read_all`, but unreadable history comes back as an empty
    /// route (with a warning in the log).
    async fn read_all(&self) -> Route {
        match self.try_read_all().await {
            Ok(route) => route,
            Err(error) => {
                warn!("[route_log] unreadable history, using empty route: {}", error);
                Vec::new()
            }
        }
    }

    async fn clear(&self) -> Result<(), PersistenceError>;
}

/// Keeps the record in process memory. Nothing survives a restart.
pub struct MemoryRouteLog {
    key: String,
    kv: Mutex<HashMap<String, String>>,
}

impl MemoryRouteLog {
    pub fn new() -> Self {
        MemoryRouteLog {
            key: ROUTE_HISTORY_KEY.to_string(),
            kv: Mutex::new(HashMap::new()),
        }
    }

    /// Overwrites the stored value as-is, bypassing the codec.
    pub fn put_raw(&self, value: &str) {
        let mut kv = self.kv.lock().unwrap();
        kv.insert(self.key.clone(), value.to_string());
    }
}

#[async_trait]
impl RouteLogStore for MemoryRouteLog {
    async fn append(&self, sample: CoordinateSample) -> Result<(), PersistenceError> {
        let mut kv = self.kv.lock().unwrap();
        let value = codec::append(kv.get(&self.key).map(String::as_str), sample)?;
        kv.insert(self.key.clone(), value);
        Ok(())
    }

    async fn try_read_all(&self) -> Result<Route, PersistenceError> {
        let kv = self.kv.lock().unwrap();
        match kv.get(&self.key) {
            None => Ok(Vec::new()),
            Some(text) => codec::decode(text),
        }
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        let mut kv = self.kv.lock().unwrap();
        kv.remove(&self.key);
        Ok(())
    }
}

/// Backed by the `kv_store` table of the main database.
pub struct DbRouteLog {
    key: String,
    main_db: Arc<Mutex<MainDb>>,
}

impl DbRouteLog {
    pub fn new(main_db: Arc<Mutex<MainDb>>) -> Self {
        DbRouteLog {
            key: ROUTE_HISTORY_KEY.to_string(),
            main_db,
        }
    }
}

#[async_trait]
impl RouteLogStore for DbRouteLog {
    async fn append(&self, sample: CoordinateSample) -> Result<(), PersistenceError> {
        let mut main_db = self.main_db.lock().unwrap();
        // A failed decode aborts the transaction, so corrupt bytes stay as
        // they are instead of being replaced by a one-sample history.
        main_db.with_txn(|txn| {
            let existing = txn.get_value(&self.key)?;
            let value = codec::append(existing.as_deref(), sample)?;
            txn.set_value(&self.key, &value)
        })?;
        Ok(())
    }

    async fn try_read_all(&self) -> Result<Route, PersistenceError> {
        let mut main_db = self.main_db.lock().unwrap();
        let value = main_db.with_txn(|txn| txn.get_value(&self.key))?;
        match value {
            None => Ok(Vec::new()),
            Some(text) => codec::decode(&text),
        }
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        let mut main_db = self.main_db.lock().unwrap();
        let removed = main_db.with_txn(|txn| txn.remove_value(&self.key))?;
        debug!("[route_log] history cleared, existed={}", removed);
        Ok(())
    }
}
