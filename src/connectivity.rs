use async_trait::async_trait;

/// Point-in-time network check, consulted when a session starts.
#[async_trait]
pub trait ConnectivityGuard: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// For hosts that record without a map and so have no reason to require a
/// network.
pub struct AlwaysConnected;

#[async_trait]
impl ConnectivityGuard for AlwaysConnected {
    async fn is_connected(&self) -> bool {
        true
    }
}
