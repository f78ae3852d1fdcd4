use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum PermissionState {
    Unknown,
    Granted,
    Denied,
}

/// The platform side of the permission check, e.g. the foreground location
/// prompt on a phone.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn request_foreground_access(&self) -> bool;
}

/// Caches the first answer for the lifetime of the gate. Concurrent callers
/// share a single prompt.
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    state: OnceCell<PermissionState>,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        PermissionGate {
            provider,
            state: OnceCell::new(),
        }
    }

    pub async fn request_access(&self) -> PermissionState {
        *self
            .state
            .get_or_init(|| async {
                let state = if self.provider.request_foreground_access().await {
                    PermissionState::Granted
                } else {
                    PermissionState::Denied
                };
                info!("[permission] location access: {}", state);
                state
            })
            .await
    }

    pub fn state(&self) -> PermissionState {
        self.state
            .get()
            .copied()
            .unwrap_or(PermissionState::Unknown)
    }
}
