pub mod command;
pub mod device;
pub mod error;
pub mod interface;
pub mod ledger;

pub use command::{CommandSet, ShowRow};
pub use device::{DeviceProfile, Dialect};
pub use error::{SharedResult, SharedTypeError};
pub use interface::{
    AddressSpec, InterfaceDescriptor, InterfaceFamily, InterfaceParameters, InterfaceRequest,
    PoolSubnet, DHCP_SENTINEL,
};
pub use ledger::AddressReservation;
