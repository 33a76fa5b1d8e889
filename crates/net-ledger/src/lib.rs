//! netprov address ledger
//!
//! Single source of truth for which IPv4 ranges have been handed out to
//! interfaces and DHCP pools, backed by a pluggable record store.

pub mod ledger;
pub mod store;

pub use ledger::AddressLedger;
pub use store::{JsonFileStore, LedgerStore, MemoryStore};

#[cfg(test)]
mod tests;
