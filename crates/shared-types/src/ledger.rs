use std::fmt;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

/// A network range handed out to one interface or pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressReservation {
    pub network: Ipv4Net,
    pub owner: String,
}

impl AddressReservation {
    pub fn new(network: Ipv4Net, owner: impl Into<String>) -> Self {
        Self {
            network: network.trunc(),
            owner: owner.into(),
        }
    }
}

impl fmt::Display for AddressReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.network, self.owner)
    }
}
