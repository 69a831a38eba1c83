use std::time::Duration;

use url::Url;

#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub rpc_url: Url,
    pub receipt_poll_interval: Duration,
    /// Upper bound on a single transaction wait.
    pub receipt_timeout: Duration,
}

impl RpcSettings {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            receipt_poll_interval: Duration::from_millis(1_000),
            receipt_timeout: Duration::from_secs(120),
        }
    }
}
