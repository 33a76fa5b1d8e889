//! Dialect-aware transport selection

use std::time::Duration;

use async_trait::async_trait;

use netprov_core::DeviceProfile;

use crate::telnet::TelnetConnector;
use crate::transport::{Transport, TransportConnector, TransportError};

#[cfg(feature = "ssh")]
use crate::ssh::SshConnector;

/// Routes telnet dialects to [`TelnetConnector`] and everything else to SSH.
#[derive(Debug, Clone)]
pub struct DialectConnector {
    telnet: TelnetConnector,
    #[cfg(feature = "ssh")]
    ssh: SshConnector,
}

impl DialectConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            telnet: TelnetConnector::new(connect_timeout),
            #[cfg(feature = "ssh")]
            ssh: SshConnector::new(connect_timeout),
        }
    }
}

impl Default for DialectConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl TransportConnector for DialectConnector {
    async fn connect(&self, profile: &DeviceProfile) -> Result<Box<dyn Transport>, TransportError> {
        if profile.dialect.is_telnet() {
            return self.telnet.connect(profile).await;
        }

        #[cfg(feature = "ssh")]
        {
            self.ssh.connect(profile).await
        }
        #[cfg(not(feature = "ssh"))]
        {
            Err(TransportError::Unsupported(format!(
                "{} requires SSH support (build with the `ssh` feature)",
                profile.dialect
            )))
        }
    }
}
