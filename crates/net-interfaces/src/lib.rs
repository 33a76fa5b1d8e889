//! netprov interface handlers
//!
//! Reads the interface catalog of a device and runs the create, view and
//! delete workflows for loopback, physical, VLAN and DHCP pool families on
//! top of the address ledger, the command templates and a device session.

pub mod catalog;
pub mod family;
pub mod handler;
pub mod input;
pub mod output;
pub mod probe;
pub mod selector;

pub use family::{
    strategy_for, BasicStrategy, DeletePlan, DhcpPoolStrategy, FamilyStrategy, PhysicalStrategy,
    VlanStrategy,
};
pub use handler::{CreateReport, DeleteReport, HandlerContext, InterfaceHandler, ViewOutcome};
pub use input::{InputDocument, ParameterSource};
pub use output::OutputSink;
pub use probe::{PingProbe, Reachability, ReachabilityProbe};
pub use selector::{FixedSelector, Selector};
