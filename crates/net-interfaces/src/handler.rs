//! Create/view/delete workflow shared by every interface family

use std::net::Ipv4Addr;
use std::sync::Arc;

use serde::Serialize;

use netprov_core::naming::normalize_interface_name;
use netprov_core::{
    AddressReservation, CommandSet, InterfaceDescriptor, InterfaceFamily, InterfaceParameters,
    LedgerError, NetworkError, Result,
};
use netprov_ledger::AddressLedger;
use netprov_session::DeviceSession;
use netprov_template::TemplateEngine;

use crate::catalog::{list_of_type, pool_stanza};
use crate::family::{strategy_for, FamilyStrategy};
use crate::input::ParameterSource;
use crate::output::OutputSink;
use crate::probe::{Reachability, ReachabilityProbe};
use crate::selector::Selector;

/// Collaborators shared by every handler of one operator session
#[derive(Clone)]
pub struct HandlerContext {
    pub ledger: Arc<AddressLedger>,
    pub templates: Arc<TemplateEngine>,
    pub probe: Arc<dyn ReachabilityProbe>,
    pub output: Option<Arc<OutputSink>>,
}

/// Result of a view request
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    /// Non-interactive listing
    Listed(Vec<InterfaceDescriptor>),
    /// One interface's configuration was retrieved
    Shown {
        name: String,
        configuration: String,
        written: bool,
    },
    Deleted(DeleteReport),
    /// Operator backed out of the selection
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateReport {
    pub parameters: InterfaceParameters,
    pub commands: CommandSet,
    pub reservations: Vec<AddressReservation>,
    pub reachability: Reachability,
    /// The new interface shows up when the device is listed again
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteReport {
    pub name: String,
    /// Configuration as it was before the delete
    pub configuration: String,
    pub commands: CommandSet,
    pub released: Vec<AddressReservation>,
}

/// Drives the create/view/delete protocol for one interface family.
///
/// The device session is passed into every call; a handler never keeps one.
pub struct InterfaceHandler {
    strategy: Box<dyn FamilyStrategy>,
    context: HandlerContext,
}

impl InterfaceHandler {
    pub fn new(family: InterfaceFamily, context: HandlerContext) -> Self {
        Self::with_strategy(strategy_for(family), context)
    }

    pub fn with_strategy(strategy: Box<dyn FamilyStrategy>, context: HandlerContext) -> Self {
        Self { strategy, context }
    }

    pub fn family(&self) -> InterfaceFamily {
        self.strategy.family()
    }

    pub async fn list(&self, session: &mut DeviceSession) -> Result<Vec<InterfaceDescriptor>> {
        list_of_type(session, self.family()).await
    }

    /// Current configuration text of one interface or pool
    pub async fn configuration(&self, session: &mut DeviceSession, name: &str) -> Result<String> {
        if self.family() == InterfaceFamily::DhcpPool {
            let config = session.full_config(false).await?;
            return pool_stanza(config.as_text().unwrap_or_default(), name)
                .ok_or_else(|| NetworkError::not_found(format!("DHCP pool {}", name)));
        }
        session.interface_config(name).await
    }

    /// List the family; when interactive, let the operator pick one entry
    /// and show it or, with `for_delete`, delete it.
    pub async fn view(
        &self,
        session: &mut DeviceSession,
        selector: &mut dyn Selector,
        interactive: bool,
        for_delete: bool,
    ) -> Result<ViewOutcome> {
        let current = self.list(session).await?;
        if !interactive || current.is_empty() {
            if current.is_empty() {
                log::info!("No {} found on {}", self.family(), session.host());
            }
            return Ok(ViewOutcome::Listed(current));
        }

        let names: Vec<String> = current.iter().map(|d| d.name.clone()).collect();
        let heading = format!("These are the {} on the device", self.family());
        let Some(name) = selector
            .select(&heading, &names)
            .and_then(|index| names.get(index).cloned())
        else {
            log::debug!("{} selection cancelled", self.family());
            return Ok(ViewOutcome::Cancelled);
        };
        let configuration = self.configuration(session, &name).await?;

        if for_delete {
            let report = self.delete_stanza(session, &name, configuration).await?;
            self.offer_write(selector, "Write the old configuration to the output file?", &report.configuration)
                .await?;
            return Ok(ViewOutcome::Deleted(report));
        }

        let written = self
            .offer_write(selector, "Write the configuration to the output file?", &configuration)
            .await?;
        Ok(ViewOutcome::Shown {
            name,
            configuration,
            written,
        })
    }

    async fn offer_write(&self, selector: &mut dyn Selector, question: &str, text: &str) -> Result<bool> {
        let Some(output) = self.context.output.as_ref() else {
            return Ok(false);
        };
        if !selector.confirm(question) {
            return Ok(false);
        }
        output.append(text).await?;
        Ok(true)
    }

    /// Validate, claim addresses, render, push, probe and confirm.
    ///
    /// Addresses are claimed before any command is sent and handed back if
    /// rendering or the push fails. The device is never rolled back.
    pub async fn create(&self, session: &mut DeviceSession, source: ParameterSource) -> Result<CreateReport> {
        let family = self.family();
        let request = source.request_for(family)?;
        let params = self.strategy.build_parameters(&request)?;
        log::info!("Creating {} {} on {}", family, params.name, session.host());

        self.strategy.validate_unique(session, &params).await?;

        let owner = self.strategy.owner_tag(&params);
        let claims: Vec<_> = params
            .reservations()
            .into_iter()
            .map(|network| (network, owner.clone()))
            .collect();
        let reservations = if claims.is_empty() {
            Vec::new()
        } else {
            self.context.ledger.try_reserve_all(&claims).await?
        };

        let commands = match self.push(session, &params).await {
            Ok(commands) => commands,
            Err(e) => {
                log::error!("Creating {} failed: {}", params.name, e);
                self.give_back(&reservations).await;
                return Err(e);
            }
        };

        let reachability = self.probe(&params).await;

        let confirmed = match self.list(session).await {
            Ok(current) => current.iter().any(|d| d.name == params.name),
            Err(e) => {
                log::warn!("Could not list {} after creating {}: {}", family, params.name, e);
                false
            }
        };
        if !confirmed {
            log::warn!("{} does not show up on {} yet", params.name, session.host());
        }

        Ok(CreateReport {
            parameters: params,
            commands,
            reservations,
            reachability,
            confirmed,
        })
    }

    async fn push(&self, session: &mut DeviceSession, params: &InterfaceParameters) -> Result<CommandSet> {
        let commands = self.context.templates.render_for(
            session.dialect(),
            params,
            self.family().template_name(),
        )?;
        session.run_config(&commands).await?;
        Ok(commands)
    }

    async fn give_back(&self, reservations: &[AddressReservation]) {
        for reservation in reservations {
            if let Err(e) = self.context.ledger.release(reservation.network.network()).await {
                log::warn!("Could not hand back {}: {}", reservation, e);
            }
        }
    }

    async fn probe(&self, params: &InterfaceParameters) -> Reachability {
        if params.dhcp || self.family() == InterfaceFamily::DhcpPool {
            return Reachability::Skipped;
        }
        let Ok(address) = params.ip.parse::<Ipv4Addr>() else {
            return Reachability::Skipped;
        };

        if self.context.probe.probe(address).await {
            log::info!("Creation of {} successful, {} answers", params.name, address);
            Reachability::Reachable
        } else {
            log::warn!("{} does not answer after creating {}", address, params.name);
            Reachability::Unreachable
        }
    }

    /// Delete `name`: release its addresses, then remove it from the device
    pub async fn delete(&self, session: &mut DeviceSession, name: &str) -> Result<DeleteReport> {
        let name = match self.family() {
            InterfaceFamily::DhcpPool => name.trim().to_string(),
            _ => normalize_interface_name(name),
        };
        let configuration = self.configuration(session, &name).await?;
        self.delete_stanza(session, &name, configuration).await
    }

    async fn delete_stanza(
        &self,
        session: &mut DeviceSession,
        name: &str,
        configuration: String,
    ) -> Result<DeleteReport> {
        let plan = self.strategy.delete_plan(name, &configuration);
        log::info!("Deleting {} {} from {}", self.family(), name, session.host());

        let mut released = Vec::with_capacity(plan.releases.len());
        for address in &plan.releases {
            match self.context.ledger.release(*address).await {
                Ok(reservation) => released.push(reservation),
                Err(NetworkError::Ledger(LedgerError::NotFound { .. })) => {
                    log::warn!("{} of {} was not in the address ledger", address, name);
                }
                Err(e) => return Err(e),
            }
        }

        session.run_config(&plan.commands).await?;
        log::info!("The {} {} has been deleted", self.family(), name);

        Ok(DeleteReport {
            name: name.to_string(),
            configuration,
            commands: plan.commands,
            released,
        })
    }
}
