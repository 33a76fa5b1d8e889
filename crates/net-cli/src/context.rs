//! Shared collaborators of one `netprov` invocation

use std::sync::Arc;

use anyhow::{Context, Result};

use netprov_core::{DeviceProfile, InterfaceFamily};
use netprov_interfaces::{HandlerContext, InterfaceHandler, OutputSink, PingProbe, ReachabilityProbe};
use netprov_ledger::{AddressLedger, JsonFileStore, LedgerStore};
use netprov_session::{DeviceSession, DialectConnector, TransportConnector};
use netprov_template::TemplateEngine;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub ledger: Arc<AddressLedger>,
    pub templates: Arc<TemplateEngine>,
    pub probe: Arc<dyn ReachabilityProbe>,
    pub output: Arc<OutputSink>,
}

impl AppContext {
    /// Open the ledger file and load the templates named by `config`
    pub async fn bootstrap(config: AppConfig) -> Result<Arc<Self>> {
        let store: Arc<dyn LedgerStore> = Arc::new(JsonFileStore::new(&config.ledger_path));
        let ledger = AddressLedger::open(store)
            .await
            .with_context(|| format!("Failed to open ledger {}", config.ledger_path.display()))?;

        let templates = TemplateEngine::with_overrides(config.templates_dir.as_deref())
            .context("Failed to load command templates")?;
        log::debug!("Templates available: {}", templates.names().join(", "));

        let probe: Arc<dyn ReachabilityProbe> = Arc::new(PingProbe::new(config.probe_timeout()));
        let output = Arc::new(OutputSink::new(&config.output_path));

        Ok(Arc::new(Self::assemble(config, Arc::new(ledger), Arc::new(templates), probe, output)))
    }

    /// Build a context from already-constructed collaborators
    pub fn assemble(
        config: AppConfig,
        ledger: Arc<AddressLedger>,
        templates: Arc<TemplateEngine>,
        probe: Arc<dyn ReachabilityProbe>,
        output: Arc<OutputSink>,
    ) -> Self {
        Self {
            config,
            ledger,
            templates,
            probe,
            output,
        }
    }

    pub fn handler_context(&self) -> HandlerContext {
        HandlerContext {
            ledger: self.ledger.clone(),
            templates: self.templates.clone(),
            probe: self.probe.clone(),
            output: Some(self.output.clone()),
        }
    }

    pub fn handler(&self, family: InterfaceFamily) -> InterfaceHandler {
        InterfaceHandler::new(family, self.handler_context())
    }

    /// Open a device session over SSH or telnet
    pub async fn connect(&self, profile: DeviceProfile) -> Result<DeviceSession> {
        let connector: Arc<dyn TransportConnector> =
            Arc::new(DialectConnector::new(self.config.connect_timeout()));
        self.connect_via(connector, profile).await
    }

    pub async fn connect_via(
        &self,
        connector: Arc<dyn TransportConnector>,
        profile: DeviceProfile,
    ) -> Result<DeviceSession> {
        let host = profile.host.clone();
        DeviceSession::connect_with(connector, profile, self.config.session_options())
            .await
            .with_context(|| format!("Failed to connect to {}", host))
    }
}
