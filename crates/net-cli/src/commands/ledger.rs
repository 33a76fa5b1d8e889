//! Offline address ledger inspection

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;

use netprov_core::AddressReservation;
use netprov_ledger::AddressLedger;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub struct LedgerCommand {
    ledger: Arc<AddressLedger>,
}

impl LedgerCommand {
    pub fn new(ledger: Arc<AddressLedger>) -> Self {
        Self { ledger }
    }

    pub async fn list(&self, format: OutputFormat) -> Result<()> {
        let reservations = self.ledger.reservations().await;
        println!("{}", render_reservations(&reservations, format)?);
        Ok(())
    }

    /// Report whether `candidate` could be handed out; an unavailable
    /// candidate is an error carrying the reason
    pub async fn check(&self, candidate: &str) -> Result<()> {
        let network = self
            .ledger
            .check(candidate)
            .await
            .with_context(|| format!("{} is not available", candidate))?;
        println!("{} is available", network);
        Ok(())
    }

    pub async fn release(&self, address: &str) -> Result<AddressReservation> {
        let released = self
            .ledger
            .release_str(address)
            .await
            .with_context(|| format!("Failed to release {}", address))?;
        println!("Released {}", released);
        Ok(released)
    }
}

pub fn render_reservations(reservations: &[AddressReservation], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(reservations).context("Failed to serialize the ledger")
        }
        OutputFormat::Text => {
            if reservations.is_empty() {
                return Ok("The address ledger is empty".to_string());
            }
            let mut lines = vec![
                format!("{:<20} {}", "Network", "Owner"),
                "-".repeat(40),
            ];
            lines.extend(
                reservations
                    .iter()
                    .map(|reservation| format!("{:<20} {}", reservation.network.to_string(), reservation.owner)),
            );
            Ok(lines.join("\n"))
        }
    }
}
