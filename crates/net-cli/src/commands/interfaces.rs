//! View, create and delete commands for one interface family

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use netprov_core::{InterfaceDescriptor, InterfaceFamily, InterfaceRequest};
use netprov_interfaces::{
    CreateReport, DeleteReport, InputDocument, InterfaceHandler, ParameterSource, Reachability,
    Selector, ViewOutcome,
};
use netprov_session::DeviceSession;

use crate::context::AppContext;

/// Creation parameters given on the command line
#[derive(Debug, Clone, Default, Args)]
pub struct CreateArgs {
    /// Read the parameters from the structured input document
    #[arg(long)]
    pub from_file: bool,

    /// Input document to use instead of the configured one
    #[arg(long, value_name = "PATH", requires = "from_file")]
    pub input: Option<PathBuf>,

    /// Interface name, or pool number for DHCP pools
    #[arg(long)]
    pub name: Option<String>,

    /// Network in CIDR notation, or "dhcp" for physical ports
    #[arg(long)]
    pub ip: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub vlan_id: Option<u16>,

    /// Physical port carrying the VLAN
    #[arg(long)]
    pub parent: Option<String>,

    #[arg(long)]
    pub pool_id: Option<u32>,

    /// DHCP pool range; repeat for secondary subnets
    #[arg(long = "subnet", value_name = "CIDR")]
    pub subnets: Vec<String>,
}

impl CreateArgs {
    pub fn to_request(&self) -> InterfaceRequest {
        InterfaceRequest {
            name: self.name.clone(),
            ip: self.ip.clone(),
            description: self.description.clone(),
            vlan_id: self.vlan_id,
            parent: self.parent.clone(),
            pool_id: self.pool_id,
            subnets: self.subnets.clone(),
        }
    }
}

pub struct InterfaceCommand {
    context: Arc<AppContext>,
    handler: InterfaceHandler,
}

impl InterfaceCommand {
    pub fn new(context: Arc<AppContext>, family: InterfaceFamily) -> Self {
        let handler = context.handler(family);
        Self { context, handler }
    }

    pub fn family(&self) -> InterfaceFamily {
        self.handler.family()
    }

    pub async fn view(
        &self,
        session: &mut DeviceSession,
        selector: &mut dyn Selector,
        interactive: bool,
    ) -> Result<ViewOutcome> {
        let outcome = self
            .handler
            .view(session, selector, interactive, false)
            .await
            .with_context(|| format!("Failed to view {}", self.family()))?;

        match &outcome {
            ViewOutcome::Listed(found) => print_descriptors(self.family(), found),
            ViewOutcome::Shown {
                configuration,
                written,
                ..
            } => {
                println!("{}", configuration);
                if *written {
                    println!("Written to {}", self.context.output.path().display());
                }
            }
            ViewOutcome::Deleted(report) => print_delete(report),
            ViewOutcome::Cancelled => println!("Back to the main menu"),
        }
        Ok(outcome)
    }

    /// Create from the command line or the input document. A physical port
    /// without a name is picked from the device; `None` when the operator
    /// backs out of that choice.
    pub async fn create(
        &self,
        session: &mut DeviceSession,
        selector: &mut dyn Selector,
        args: &CreateArgs,
    ) -> Result<Option<CreateReport>> {
        let source = if args.from_file {
            let path = args
                .input
                .clone()
                .unwrap_or_else(|| self.context.config.input_path.clone());
            let document = InputDocument::load(&path)
                .await
                .with_context(|| format!("Failed to read input document {}", path.display()))?;
            ParameterSource::Document(document)
        } else {
            let mut request = args.to_request();
            if request.name.is_none() && self.family() == InterfaceFamily::Physical {
                match self.pick(session, selector).await? {
                    Some(name) => request.name = Some(name),
                    None => {
                        println!("Back to the main menu");
                        return Ok(None);
                    }
                }
            }
            ParameterSource::Direct(request)
        };

        let report = self
            .handler
            .create(session, source)
            .await
            .with_context(|| format!("Failed to create {}", self.family()))?;
        print_create(&report);
        Ok(Some(report))
    }

    async fn pick(&self, session: &mut DeviceSession, selector: &mut dyn Selector) -> Result<Option<String>> {
        let ports = self.handler.list(session).await?;
        let names: Vec<String> = ports.into_iter().map(|port| port.name).collect();
        if names.is_empty() {
            anyhow::bail!("No physical ports found on {}", session.host());
        }
        let heading = format!("Choose the {} to configure", self.family());
        Ok(selector
            .select(&heading, &names)
            .and_then(|index| names.get(index).cloned()))
    }

    /// Delete `name`, or let the operator pick one when no name is given
    pub async fn delete(
        &self,
        session: &mut DeviceSession,
        selector: &mut dyn Selector,
        name: Option<&str>,
    ) -> Result<Option<DeleteReport>> {
        let report = match name {
            Some(name) => self
                .handler
                .delete(session, name)
                .await
                .with_context(|| format!("Failed to delete {} {}", self.family(), name))?,
            None => {
                let outcome = self
                    .handler
                    .view(session, selector, true, true)
                    .await
                    .with_context(|| format!("Failed to delete {}", self.family()))?;
                match outcome {
                    ViewOutcome::Deleted(report) => report,
                    ViewOutcome::Listed(found) if found.is_empty() => {
                        println!("No {} to delete", self.family());
                        return Ok(None);
                    }
                    _ => {
                        println!("Back to the main menu");
                        return Ok(None);
                    }
                }
            }
        };
        print_delete(&report);
        Ok(Some(report))
    }
}

fn print_descriptors(family: InterfaceFamily, found: &[InterfaceDescriptor]) {
    if found.is_empty() {
        println!("No {} configured", family);
        return;
    }

    if family == InterfaceFamily::DhcpPool {
        println!("{:<10} {}", "Pool", "Networks");
        println!("{}", "-".repeat(60));
        for pool in found {
            println!("{:<10} {}", pool.name, pool.attribute("networks").unwrap_or("-"));
        }
        return;
    }

    println!(
        "{:<24} {:<12} {:<12} {}",
        "Interface", "Link", "Protocol", "Address"
    );
    println!("{}", "-".repeat(70));
    for iface in found {
        println!(
            "{:<24} {:<12} {:<12} {}",
            iface.name,
            iface.attribute("link_status").unwrap_or("-"),
            iface.attribute("protocol_status").unwrap_or("-"),
            iface.attribute("ip_address").unwrap_or("-"),
        );
    }
}

fn print_create(report: &CreateReport) {
    println!("Sent to the device:");
    for line in report.commands.executable() {
        println!("  {}", line);
    }
    for reservation in &report.reservations {
        println!("Reserved {}", reservation);
    }
    match report.reachability {
        Reachability::Reachable => println!("{} answers", report.parameters.ip),
        Reachability::Unreachable => println!("Warning: {} does not answer", report.parameters.ip),
        Reachability::Skipped => {}
    }
    if report.confirmed {
        println!("{} created", report.parameters.name);
    } else {
        println!("Warning: {} is not listed by the device yet", report.parameters.name);
    }
}

fn print_delete(report: &DeleteReport) {
    println!("Removed configuration:");
    println!("{}", report.configuration);
    for reservation in &report.released {
        println!("Released {}", reservation);
    }
    println!("{} deleted", report.name);
}
