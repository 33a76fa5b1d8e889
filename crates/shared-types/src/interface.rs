use std::fmt;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::command::ShowRow;
use crate::error::SharedTypeError;

/// Sentinel accepted in the address field instead of a CIDR
pub const DHCP_SENTINEL: &str = "dhcp";

/// Interface category that selects validation rules and the template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InterfaceFamily {
    Loopback,
    Physical,
    Vlan,
    #[serde(rename = "DHCP")]
    DhcpPool,
}

impl InterfaceFamily {
    pub const ALL: [InterfaceFamily; 4] = [
        InterfaceFamily::Loopback,
        InterfaceFamily::Physical,
        InterfaceFamily::Vlan,
        InterfaceFamily::DhcpPool,
    ];

    /// Key used in input documents and the substring used to classify
    /// basic interfaces.
    pub fn label(&self) -> &'static str {
        match self {
            InterfaceFamily::Loopback => "Loopback",
            InterfaceFamily::Physical => "Physical",
            InterfaceFamily::Vlan => "Vlan",
            InterfaceFamily::DhcpPool => "DHCP",
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            InterfaceFamily::Loopback => "loopback",
            InterfaceFamily::Physical => "Base",
            InterfaceFamily::Vlan => "Vlan",
            InterfaceFamily::DhcpPool => "DHCP",
        }
    }
}

impl fmt::Display for InterfaceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for InterfaceFamily {
    type Err = SharedTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loopback" | "basic" => Ok(InterfaceFamily::Loopback),
            "physical" => Ok(InterfaceFamily::Physical),
            "vlan" => Ok(InterfaceFamily::Vlan),
            "dhcp" | "dhcp-pool" | "dhcp_pool" | "pool" => Ok(InterfaceFamily::DhcpPool),
            other => Err(SharedTypeError::Unsupported(other.to_string())),
        }
    }
}

/// Address field of a creation request: a network or the DHCP sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AddressSpec {
    Network(Ipv4Net),
    Dhcp,
}

impl AddressSpec {
    pub fn network(&self) -> Option<Ipv4Net> {
        match self {
            AddressSpec::Network(net) => Some(*net),
            AddressSpec::Dhcp => None,
        }
    }

    pub fn is_dhcp(&self) -> bool {
        matches!(self, AddressSpec::Dhcp)
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::Network(net) => write!(f, "{}", net),
            AddressSpec::Dhcp => f.write_str(DHCP_SENTINEL),
        }
    }
}

impl FromStr for AddressSpec {
    type Err = SharedTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(DHCP_SENTINEL) {
            return Ok(AddressSpec::Dhcp);
        }
        trimmed
            .parse::<Ipv4Net>()
            .map(AddressSpec::Network)
            .map_err(|_| SharedTypeError::InvalidValue {
                field: "ip",
                value: s.to_string(),
            })
    }
}

impl From<AddressSpec> for String {
    fn from(spec: AddressSpec) -> Self {
        spec.to_string()
    }
}

impl TryFrom<String> for AddressSpec {
    type Error = SharedTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Raw creation input, typed or read from a structured document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
    #[serde(default, alias = "vlan")]
    pub vlan_id: Option<u16>,
    #[serde(default, alias = "interface")]
    pub parent: Option<String>,
    #[serde(default, alias = "pool")]
    pub pool_id: Option<u32>,
    #[serde(default)]
    pub subnets: Vec<String>,
}

/// One address range of a DHCP pool as rendered into commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSubnet {
    pub network: String,
    pub mask: String,
    pub secondary: bool,
    #[serde(skip)]
    pub cidr: Option<Ipv4Net>,
}

/// Validated parameters; serialised as the template context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceParameters {
    pub family: InterfaceFamily,
    pub name: String,
    /// First usable host of the network, or `dhcp`
    pub ip: String,
    pub mask: String,
    pub description: Option<String>,
    pub vlan_id: Option<u16>,
    pub parent: Option<String>,
    pub pool_id: Option<u32>,
    #[serde(default)]
    pub subnets: Vec<PoolSubnet>,
    pub dhcp: bool,
    /// Network as supplied by the operator
    pub network: Option<Ipv4Net>,
}

impl InterfaceParameters {
    pub fn new(family: InterfaceFamily, name: impl Into<String>) -> Self {
        Self {
            family,
            name: name.into(),
            ip: String::new(),
            mask: String::new(),
            description: None,
            vlan_id: None,
            parent: None,
            pool_id: None,
            subnets: Vec::new(),
            dhcp: false,
            network: None,
        }
    }

    /// Networks that must be claimed in the address ledger
    pub fn reservations(&self) -> Vec<Ipv4Net> {
        if !self.subnets.is_empty() {
            return self.subnets.iter().filter_map(|subnet| subnet.cidr).collect();
        }
        self.network.into_iter().collect()
    }
}

/// Interface as reported by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub family: InterfaceFamily,
    #[serde(default)]
    pub attributes: ShowRow,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>, family: InterfaceFamily) -> Self {
        Self {
            name: name.into(),
            family,
            attributes: ShowRow::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parsing() {
        assert_eq!("loopback".parse::<InterfaceFamily>().unwrap(), InterfaceFamily::Loopback);
        assert_eq!("DHCP".parse::<InterfaceFamily>().unwrap(), InterfaceFamily::DhcpPool);
        assert_eq!(InterfaceFamily::Physical.template_name(), "Base");
        assert!("tunnel".parse::<InterfaceFamily>().is_err());
    }

    #[test]
    fn test_address_spec_sentinel() {
        assert_eq!("DHCP".parse::<AddressSpec>().unwrap(), AddressSpec::Dhcp);
        let spec: AddressSpec = "10.0.0.0/24".parse().unwrap();
        assert_eq!(spec.network(), Some("10.0.0.0/24".parse().unwrap()));
        assert!("10.0.0/24".parse::<AddressSpec>().is_err());
    }

    #[test]
    fn test_request_from_document_aliases() {
        let yaml = "name: Loopback5\nip: 10.1.1.0/24\ndesc: uplink\n";
        let request: InterfaceRequest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(request.name.as_deref(), Some("Loopback5"));
        assert_eq!(request.description.as_deref(), Some("uplink"));
        assert!(request.subnets.is_empty());
    }

    #[test]
    fn test_parameters_reservations() {
        let mut params = InterfaceParameters::new(InterfaceFamily::Loopback, "Loopback1");
        params.network = Some("10.0.0.0/30".parse().unwrap());
        assert_eq!(params.reservations().len(), 1);

        let mut pool = InterfaceParameters::new(InterfaceFamily::DhcpPool, "7");
        pool.subnets = vec![
            PoolSubnet {
                network: "10.1.0.0".into(),
                mask: "255.255.255.0".into(),
                secondary: false,
                cidr: Some("10.1.0.0/24".parse().unwrap()),
            },
            PoolSubnet {
                network: "10.2.0.0".into(),
                mask: "255.255.255.0".into(),
                secondary: true,
                cidr: Some("10.2.0.0/24".parse().unwrap()),
            },
        ];
        assert_eq!(pool.reservations().len(), 2);
    }
}
