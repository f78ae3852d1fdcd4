#![allow(dead_code)]

use async_trait::async_trait;
use routelog_core::{
    connectivity::ConnectivityGuard,
    gps_processor::CoordinateSample,
    location_source::{LocationError, LocationOptions, LocationSource},
    permission::{PermissionGate, PermissionProvider},
    route_log::{MemoryRouteLog, RouteLogStore},
    session::{Collaborators, SamplingSession, SessionConfig},
};
use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempdir::TempDir;
use tokio::sync::Notify;

pub fn sample(latitude: f64, longitude: f64, timestamp: i64) -> CoordinateSample {
    CoordinateSample::new(latitude, longitude, timestamp)
}

pub fn sub_folder(temp_dir: &TempDir, sub: &str) -> String {
    let path = temp_dir.path().join(sub);
    fs::create_dir_all(&path).unwrap();
    path.into_os_string().into_string().unwrap()
}

/// Replays a script of results, one per read. Once the script runs out it
/// keeps producing fixes moving north, one second apart.
pub struct ScriptedLocationSource {
    script: Mutex<VecDeque<Result<CoordinateSample, LocationError>>>,
    reads: AtomicUsize,
    // when set, every read waits for `release` before answering
    gate: Option<Arc<Notify>>,
    entered: Notify,
}

impl ScriptedLocationSource {
    pub fn new(script: Vec<Result<CoordinateSample, LocationError>>) -> Self {
        ScriptedLocationSource {
            script: Mutex::new(script.into()),
            reads: AtomicUsize::new(0),
            gate: None,
            entered: Notify::new(),
        }
    }

    pub fn gated(script: Vec<Result<CoordinateSample, LocationError>>, gate: Arc<Notify>) -> Self {
        ScriptedLocationSource {
            gate: Some(gate),
            ..Self::new(script)
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Resolves once a read is waiting on the gate.
    pub async fn wait_for_read(&self) {
        self.entered.notified().await
    }
}

#[async_trait]
impl LocationSource for ScriptedLocationSource {
    async fn read_once(
        &self,
        _options: &LocationOptions,
    ) -> Result<CoordinateSample, LocationError> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        if let Some(gate) = &self.gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        next.unwrap_or_else(|| Ok(sample(10.0 + n as f64 * 0.001, 20.0, 1000 + n as i64 * 1000)))
    }
}

pub struct FixedPermission {
    granted: bool,
    prompts: AtomicUsize,
}

impl FixedPermission {
    pub fn new(granted: bool) -> Self {
        FixedPermission {
            granted,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionProvider for FixedPermission {
    async fn request_foreground_access(&self) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.granted
    }
}

pub struct SwitchableConnectivity {
    connected: AtomicBool,
}

impl SwitchableConnectivity {
    pub fn new(connected: bool) -> Self {
        SwitchableConnectivity {
            connected: AtomicBool::new(connected),
        }
    }

    pub fn set(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityGuard for SwitchableConnectivity {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

pub struct Harness {
    pub session: SamplingSession,
    pub source: Arc<ScriptedLocationSource>,
    pub permission: Arc<FixedPermission>,
    pub connectivity: Arc<SwitchableConnectivity>,
    pub route_log: Arc<MemoryRouteLog>,
}

pub struct HarnessBuilder {
    config: SessionConfig,
    granted: bool,
    connected: bool,
    source: Option<ScriptedLocationSource>,
    route_log: Option<Arc<MemoryRouteLog>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        HarnessBuilder {
            config: SessionConfig::default(),
            granted: true,
            connected: true,
            source: None,
            route_log: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn granted(mut self, granted: bool) -> Self {
        self.granted = granted;
        self
    }

    pub fn connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }

    pub fn script(mut self, script: Vec<Result<CoordinateSample, LocationError>>) -> Self {
        self.source = Some(ScriptedLocationSource::new(script));
        self
    }

    pub fn source(mut self, source: ScriptedLocationSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn route_log(mut self, route_log: Arc<MemoryRouteLog>) -> Self {
        self.route_log = Some(route_log);
        self
    }

    pub fn build(self) -> Harness {
        let _ = env_logger::builder().is_test(true).try_init();
        let source = Arc::new(
            self.source
                .unwrap_or_else(|| ScriptedLocationSource::new(vec![])),
        );
        let permission = Arc::new(FixedPermission::new(self.granted));
        let connectivity = Arc::new(SwitchableConnectivity::new(self.connected));
        let route_log = self
            .route_log
            .unwrap_or_else(|| Arc::new(MemoryRouteLog::new()));
        let route_log_store: Arc<dyn RouteLogStore> = route_log.clone();
        let session = SamplingSession::new(
            self.config,
            Collaborators {
                permission: Arc::new(PermissionGate::new(permission.clone())),
                location_source: source.clone(),
                connectivity: connectivity.clone(),
                route_log: route_log_store,
            },
        );
        Harness {
            session,
            source,
            permission,
            connectivity,
            route_log,
        }
    }
}
