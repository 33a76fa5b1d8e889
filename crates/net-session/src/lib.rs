//! netprov device session
//!
//! Establishes a command channel to a router whose command dialect is not
//! known in advance and runs show and configuration commands over it.

pub mod connector;
pub mod parser;
mod prompt;
pub mod session;
pub mod telnet;
pub mod transport;

#[cfg(feature = "ssh")]
pub mod ssh;

#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use connector::DialectConnector;
pub use parser::{ShowParser, TextParser};
pub use session::{DeviceSession, SessionOptions, ShowOutput, NEXUS_SIGNATURE};
pub use telnet::TelnetConnector;
pub use transport::{Transport, TransportConnector, TransportError};

#[cfg(feature = "ssh")]
pub use ssh::SshConnector;

#[cfg(any(test, feature = "test-util"))]
pub use scripted::{Journal, JournalEntry, ScriptedConnector, ScriptedFailure};

#[cfg(test)]
mod tests;
