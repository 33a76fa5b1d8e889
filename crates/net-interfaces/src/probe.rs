//! Post-configuration reachability probe

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

/// Advisory check that a freshly assigned address answers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, address: Ipv4Addr) -> bool;
}

/// Result of the probe step of a creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reachability {
    Reachable,
    Unreachable,
    /// Nothing to probe: DHCP-assigned ports and pools
    Skipped,
}

/// Sends one ICMP echo through the system `ping` binary.
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl ReachabilityProbe for PingProbe {
    async fn probe(&self, address: Ipv4Addr) -> bool {
        let wait = self.timeout.as_secs().max(1).to_string();
        let status = tokio::process::Command::new("ping")
            .args(["-c", "1", "-W", &wait])
            .arg(address.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                log::warn!("Could not run ping for {}: {}", address, e);
                false
            }
        }
    }
}
