//! CLI commands

pub mod device;
pub mod interfaces;
pub mod ledger;

pub use device::{InfoCommand, ShowRunCommand};
pub use interfaces::{CreateArgs, InterfaceCommand};
pub use ledger::{LedgerCommand, OutputFormat};
