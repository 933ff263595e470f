use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::trace;

/// Answers whether the remote service is reachable right now.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Online when a TCP connection to `address` opens within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                trace!(address = %self.address, error = %err, "connectivity probe failed");
                false
            }
            Err(_) => {
                trace!(address = %self.address, "connectivity probe timed out");
                false
            }
        }
    }
}

/// Always reports the same answer; used by `--offline`.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub bool);

#[async_trait]
impl ConnectivityProbe for FixedProbe {
    async fn is_online(&self) -> bool {
        self.0
    }
}
