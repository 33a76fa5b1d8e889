//! Device-wide read commands

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use netprov_core::Dialect;
use netprov_session::DeviceSession;

use crate::context::AppContext;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub host: String,
    pub port: u16,
    pub dialect: Dialect,
    pub hostname: Option<String>,
}

/// Identify the connected device
pub struct InfoCommand;

impl InfoCommand {
    pub fn new() -> Self {
        Self
    }

    pub async fn gather(&self, session: &mut DeviceSession) -> Result<DeviceInfo> {
        let hostname = session
            .hostname()
            .await
            .context("Failed to read the running configuration")?;
        Ok(DeviceInfo {
            host: session.host().to_string(),
            port: session.profile().port,
            dialect: session.dialect(),
            hostname,
        })
    }

    pub async fn execute(&self, session: &mut DeviceSession) -> Result<()> {
        let info = self.gather(session).await?;
        println!("{:<12} {}:{}", "Device", info.host, info.port);
        println!("{:<12} {}", "Dialect", info.dialect);
        println!(
            "{:<12} {}",
            "Hostname",
            info.hostname.as_deref().unwrap_or("-")
        );
        Ok(())
    }
}

impl Default for InfoCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Print the full running configuration
pub struct ShowRunCommand {
    context: Arc<AppContext>,
}

impl ShowRunCommand {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Returns the configuration text; with `write` it is also appended to
    /// the output log
    pub async fn execute(&self, session: &mut DeviceSession, write: bool) -> Result<String> {
        let config = session
            .full_config(false)
            .await
            .context("Failed to read the running configuration")?;
        let text = config.as_text().unwrap_or_default().to_string();
        println!("{}", text);

        if write {
            self.context.output.append(&text).await.with_context(|| {
                format!(
                    "Failed to write {}",
                    self.context.output.path().display()
                )
            })?;
            log::info!(
                "Running configuration of {} written to {}",
                session.host(),
                self.context.output.path().display()
            );
        }
        Ok(text)
    }
}
