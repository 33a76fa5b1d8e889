//! netprov CLI
//!
//! Command-line front end for provisioning interfaces on remote routers.
//! Settings come from an optional TOML file layered with `NETPROV_*`
//! environment variables; device commands run over one session per
//! invocation while ledger commands work offline.

pub mod commands;
pub mod config;
pub mod console;
pub mod context;
