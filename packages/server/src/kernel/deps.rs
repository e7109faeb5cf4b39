//! Central dependency container. External capabilities sit behind traits so
//! tests can inject scripted implementations.

use std::sync::Arc;

use telegram_auth::{AuthConnector, ProxyConfig};

use crate::domains::login::models::SessionRecordStore;

#[derive(Clone)]
pub struct ServerDeps {
    /// Factory for remote auth sessions (bridge-backed in production,
    /// scripted mocks in tests).
    pub connector: Arc<dyn AuthConnector>,
    pub sessions: Arc<SessionRecordStore>,
    /// Proxy applied to every outbound auth session, if configured.
    pub proxy: Option<ProxyConfig>,
}
