//! Per-family validation, parameter building and delete rules

use std::net::Ipv4Addr;
use std::sync::OnceLock;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use regex::Regex;

use netprov_core::addressing::{
    configured_address, dotted_mask, first_usable_host, ipv4_literals, is_dhcp_assigned,
    network_from_mask, overlaps, require_candidate,
};
use netprov_core::naming::{is_physical_port, is_serial, normalize_interface_name};
use netprov_core::{
    AddressSpec, CommandSet, InterfaceFamily, InterfaceParameters, InterfaceRequest,
    NetworkError, PoolSubnet, Result, ValidationError, DHCP_SENTINEL,
};
use netprov_session::DeviceSession;

use crate::catalog::{list_of_type, list_pools, name_is_free};

const MAX_VLAN_ID: u16 = 4094;

/// What deleting one interface or pool takes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePlan {
    /// Addresses to release from the ledger, before `commands` are sent
    pub releases: Vec<Ipv4Addr>,
    pub commands: CommandSet,
}

/// Family-specific steps of the shared create/view/delete workflow.
#[async_trait]
pub trait FamilyStrategy: Send + Sync {
    fn family(&self) -> InterfaceFamily;

    /// Check the request's shape and derive the template parameters
    fn build_parameters(&self, request: &InterfaceRequest) -> Result<InterfaceParameters>;

    /// Device-side uniqueness checks before anything is configured
    async fn validate_unique(
        &self,
        session: &mut DeviceSession,
        params: &InterfaceParameters,
    ) -> Result<()>;

    /// Ledger releases and commands removing `name`, given its stanza
    fn delete_plan(&self, name: &str, stanza: &str) -> DeletePlan;

    /// Owner tag recorded with the ledger reservations
    fn owner_tag(&self, params: &InterfaceParameters) -> String {
        params.name.clone()
    }
}

pub fn strategy_for(family: InterfaceFamily) -> Box<dyn FamilyStrategy> {
    match family {
        InterfaceFamily::Loopback => Box::new(BasicStrategy),
        InterfaceFamily::Physical => Box::new(PhysicalStrategy),
        InterfaceFamily::Vlan => Box::new(VlanStrategy),
        InterfaceFamily::DhcpPool => Box::new(DhcpPoolStrategy),
    }
}

fn missing(field: &str) -> NetworkError {
    ValidationError::MissingField {
        field: field.to_string(),
    }
    .into()
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| missing(field))
}

/// Trimmed description; control characters would split it into extra
/// configuration lines and are refused
fn description(request: &InterfaceRequest) -> Result<Option<String>> {
    let Some(text) = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
    else {
        return Ok(None);
    };
    if text.chars().any(char::is_control) {
        return Err(ValidationError::InvalidValue {
            field: "description".to_string(),
            value: text.escape_debug().to_string(),
        }
        .into());
    }
    Ok(Some(text.to_string()))
}

/// Interface name with a type prefix and a non-empty unit number
fn interface_name(raw: &str) -> Result<String> {
    let name = normalize_interface_name(raw);
    let has_unit = name.chars().any(|c| c.is_ascii_digit());
    if name.is_empty() || !has_unit {
        return Err(ValidationError::InvalidName {
            name: raw.to_string(),
            reason: "expected a type followed by a unit number".to_string(),
        }
        .into());
    }
    Ok(name)
}

/// Address fields for a routed network: first usable host and dotted mask
fn apply_network(params: &mut InterfaceParameters, text: &str) -> Result<()> {
    let network = require_candidate(text)?;
    let host = first_usable_host(&network)?;
    params.ip = host.to_string();
    params.mask = dotted_mask(&network);
    params.network = Some(network);
    Ok(())
}

/// `no <first line>` negation of a stanza
fn negation(stanza: &str) -> CommandSet {
    let first = stanza.lines().next().unwrap_or_default().trim();
    CommandSet::single(format!("no {}", first))
}

fn address_releases(stanza: &str) -> Vec<Ipv4Addr> {
    configured_address(stanza).into_iter().collect()
}

/// Loopback and other purely logical routed interfaces
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicStrategy;

#[async_trait]
impl FamilyStrategy for BasicStrategy {
    fn family(&self) -> InterfaceFamily {
        InterfaceFamily::Loopback
    }

    fn build_parameters(&self, request: &InterfaceRequest) -> Result<InterfaceParameters> {
        let name = interface_name(required(&request.name, "name")?)?;
        if !name.starts_with(InterfaceFamily::Loopback.label()) {
            return Err(ValidationError::InvalidName {
                name,
                reason: "not a loopback interface".to_string(),
            }
            .into());
        }

        let ip = required(&request.ip, "ip")?;
        if ip.eq_ignore_ascii_case(DHCP_SENTINEL) {
            return Err(ValidationError::InvalidValue {
                field: "ip".to_string(),
                value: ip.to_string(),
            }
            .into());
        }

        let mut params = InterfaceParameters::new(self.family(), name);
        apply_network(&mut params, ip)?;
        params.description = description(request)?;
        Ok(params)
    }

    async fn validate_unique(
        &self,
        session: &mut DeviceSession,
        params: &InterfaceParameters,
    ) -> Result<()> {
        if name_is_free(session, self.family(), &params.name).await? {
            Ok(())
        } else {
            Err(ValidationError::DuplicateName {
                name: params.name.clone(),
            }
            .into())
        }
    }

    fn delete_plan(&self, _name: &str, stanza: &str) -> DeletePlan {
        DeletePlan {
            releases: address_releases(stanza),
            commands: negation(stanza),
        }
    }
}

/// Ports that exist in hardware; addresses are assigned, never created
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicalStrategy;

impl PhysicalStrategy {
    /// An interface carrying any address or DHCP marker is in use
    pub async fn check_in_use(&self, session: &mut DeviceSession, name: &str) -> Result<bool> {
        let stanza = session.interface_config(name).await?;
        Ok(stanza_in_use(&stanza))
    }
}

fn stanza_in_use(stanza: &str) -> bool {
    is_dhcp_assigned(stanza) || !ipv4_literals(stanza).is_empty()
}

#[async_trait]
impl FamilyStrategy for PhysicalStrategy {
    fn family(&self) -> InterfaceFamily {
        InterfaceFamily::Physical
    }

    fn build_parameters(&self, request: &InterfaceRequest) -> Result<InterfaceParameters> {
        let name = interface_name(required(&request.name, "name")?)?;
        if !is_physical_port(&name) {
            return Err(ValidationError::InvalidName {
                name,
                reason: "not a physical port".to_string(),
            }
            .into());
        }

        let ip = required(&request.ip, "ip")?;
        let mut params = InterfaceParameters::new(self.family(), name);
        let spec: AddressSpec = ip.parse().map_err(|_| ValidationError::MalformedAddress {
            value: ip.to_string(),
        })?;
        if spec.is_dhcp() {
            params.ip = DHCP_SENTINEL.to_string();
            params.dhcp = true;
        } else {
            apply_network(&mut params, ip)?;
        }
        params.description = description(request)?;
        Ok(params)
    }

    async fn validate_unique(
        &self,
        session: &mut DeviceSession,
        params: &InterfaceParameters,
    ) -> Result<()> {
        let ports = list_of_type(session, self.family()).await?;
        if !ports.iter().any(|port| port.name == params.name) {
            return Err(NetworkError::not_found(format!("interface {}", params.name)));
        }
        if self.check_in_use(session, &params.name).await? {
            log::warn!("{} already carries an address", params.name);
            return Err(ValidationError::InUse {
                name: params.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn delete_plan(&self, name: &str, stanza: &str) -> DeletePlan {
        let releases = address_releases(stanza);
        if !is_serial(name) {
            return DeletePlan {
                releases,
                commands: negation(stanza),
            };
        }

        // serial encapsulation survives; clear only what was assigned
        DeletePlan {
            releases,
            commands: CommandSet::new(vec![
                format!("interface {}", name),
                "no description".to_string(),
                "no ip address".to_string(),
                "shutdown".to_string(),
            ]),
        }
    }
}

/// 802.1Q sub-interfaces named `<port>.<vlan-id>`
#[derive(Debug, Default, Clone, Copy)]
pub struct VlanStrategy;

#[async_trait]
impl FamilyStrategy for VlanStrategy {
    fn family(&self) -> InterfaceFamily {
        InterfaceFamily::Vlan
    }

    fn build_parameters(&self, request: &InterfaceRequest) -> Result<InterfaceParameters> {
        let parent = interface_name(required(&request.parent, "parent")?)?;
        if !is_physical_port(&parent) {
            return Err(ValidationError::InvalidName {
                name: parent,
                reason: "VLANs can only be added to physical ports".to_string(),
            }
            .into());
        }

        let vlan_id = request.vlan_id.ok_or_else(|| missing("vlan_id"))?;
        if !(1..=MAX_VLAN_ID).contains(&vlan_id) {
            return Err(ValidationError::InvalidValue {
                field: "vlan_id".to_string(),
                value: vlan_id.to_string(),
            }
            .into());
        }

        let name = format!("{}.{}", parent, vlan_id);
        if let Some(requested) = request.name.as_deref() {
            if normalize_interface_name(requested) != name {
                log::warn!("Ignoring requested name {}, VLAN interface is {}", requested, name);
            }
        }

        let mut params = InterfaceParameters::new(self.family(), name);
        apply_network(&mut params, required(&request.ip, "ip")?)?;
        params.description = description(request)?;
        params.vlan_id = Some(vlan_id);
        params.parent = Some(parent);
        Ok(params)
    }

    async fn validate_unique(
        &self,
        session: &mut DeviceSession,
        params: &InterfaceParameters,
    ) -> Result<()> {
        let parent = params.parent.clone().unwrap_or_default();
        let vlan_id = params.vlan_id.unwrap_or_default();

        let ports = list_of_type(session, InterfaceFamily::Physical).await?;
        if !ports.iter().any(|port| port.name == parent) {
            return Err(NetworkError::not_found(format!("interface {}", parent)));
        }

        let prefix = format!("{}.", parent);
        let existing = list_of_type(session, self.family()).await?;
        let taken = existing.iter().any(|sub| {
            sub.name
                .strip_prefix(&prefix)
                .and_then(|suffix| suffix.parse::<u16>().ok())
                == Some(vlan_id)
        });
        if taken {
            return Err(ValidationError::DuplicateVlan { parent, vlan_id }.into());
        }
        Ok(())
    }

    fn delete_plan(&self, _name: &str, stanza: &str) -> DeletePlan {
        DeletePlan {
            releases: address_releases(stanza),
            commands: negation(stanza),
        }
    }
}

fn pool_network_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*network\s+(\d{1,3}(?:\.\d{1,3}){3})\s+(\d{1,3}(?:\.\d{1,3}){3})")
            .expect("valid pool network regex")
    })
}

/// Networks of a pool stanza, in configuration order
pub fn pool_networks(stanza: &str) -> Vec<Ipv4Net> {
    pool_network_regex()
        .captures_iter(stanza)
        .filter_map(|caps| {
            let addr = caps[1].parse().ok()?;
            let mask = caps[2].parse().ok()?;
            network_from_mask(addr, mask)
        })
        .collect()
}

/// Address-only DHCP pools named by a number
#[derive(Debug, Default, Clone, Copy)]
pub struct DhcpPoolStrategy;

impl DhcpPoolStrategy {
    fn pool_id(request: &InterfaceRequest) -> Result<u32> {
        if let Some(id) = request.pool_id {
            return Ok(id);
        }
        let name = required(&request.name, "pool_id")?;
        name.parse().map_err(|_| {
            ValidationError::InvalidValue {
                field: "pool_id".to_string(),
                value: name.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl FamilyStrategy for DhcpPoolStrategy {
    fn family(&self) -> InterfaceFamily {
        InterfaceFamily::DhcpPool
    }

    fn build_parameters(&self, request: &InterfaceRequest) -> Result<InterfaceParameters> {
        let pool_id = Self::pool_id(request)?;

        let ranges: Vec<&str> = if request.subnets.is_empty() {
            request.ip.as_deref().into_iter().collect()
        } else {
            request.subnets.iter().map(String::as_str).collect()
        };
        if ranges.is_empty() {
            return Err(missing("subnets"));
        }

        let mut subnets: Vec<PoolSubnet> = Vec::with_capacity(ranges.len());
        for (index, range) in ranges.iter().enumerate() {
            let network = require_candidate(range)?;
            if network.addr() != network.network() {
                return Err(ValidationError::NotNetworkAddress {
                    value: range.trim().to_string(),
                }
                .into());
            }
            if let Some(clash) = subnets
                .iter()
                .filter_map(|subnet| subnet.cidr)
                .find(|other| overlaps(other, &network))
            {
                return Err(ValidationError::InvalidValue {
                    field: "subnets".to_string(),
                    value: format!("{} overlaps {}", network, clash),
                }
                .into());
            }
            subnets.push(PoolSubnet {
                network: network.network().to_string(),
                mask: dotted_mask(&network),
                secondary: index > 0,
                cidr: Some(network),
            });
        }

        let mut params = InterfaceParameters::new(self.family(), pool_id.to_string());
        params.pool_id = Some(pool_id);
        params.ip = subnets[0].network.clone();
        params.mask = subnets[0].mask.clone();
        params.network = subnets[0].cidr;
        params.description = description(request)?;
        params.subnets = subnets;
        Ok(params)
    }

    async fn validate_unique(
        &self,
        session: &mut DeviceSession,
        params: &InterfaceParameters,
    ) -> Result<()> {
        let pools = list_pools(session).await?;
        if pools.iter().any(|pool| pool.name == params.name) {
            return Err(ValidationError::DuplicatePool {
                pool_id: params.pool_id.unwrap_or_default(),
            }
            .into());
        }
        Ok(())
    }

    fn delete_plan(&self, name: &str, stanza: &str) -> DeletePlan {
        DeletePlan {
            releases: pool_networks(stanza)
                .iter()
                .map(|network| network.network())
                .collect(),
            commands: CommandSet::single(format!("no ip dhcp pool {}", name)),
        }
    }

    fn owner_tag(&self, params: &InterfaceParameters) -> String {
        format!("dhcp-pool-{}", params.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, ip: &str) -> InterfaceRequest {
        InterfaceRequest {
            name: Some(name.to_string()),
            ip: Some(ip.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_basic_parameters() {
        let mut req = request(" loopback 5", "10.1.1.0/30");
        req.description = Some("test".to_string());
        let params = BasicStrategy.build_parameters(&req).unwrap();

        assert_eq!(params.name, "Loopback5");
        assert_eq!(params.ip, "10.1.1.1");
        assert_eq!(params.mask, "255.255.255.252");
        assert_eq!(params.description.as_deref(), Some("test"));
        assert_eq!(params.reservations(), vec!["10.1.1.0/30".parse::<Ipv4Net>().unwrap()]);
    }

    #[test]
    fn test_basic_rejects_bad_input() {
        let misaligned = BasicStrategy.build_parameters(&request("Loopback5", "10.1.1.5/24"));
        assert!(matches!(
            misaligned,
            Err(NetworkError::Validation(ValidationError::NotNetworkAddress { .. }))
        ));

        let malformed = BasicStrategy.build_parameters(&request("Loopback5", "10.1.1/24"));
        assert!(matches!(
            malformed,
            Err(NetworkError::Validation(ValidationError::MalformedAddress { .. }))
        ));

        let dhcp = BasicStrategy.build_parameters(&request("Loopback5", "dhcp"));
        assert!(dhcp.is_err());

        let mut multiline = request("Loopback5", "10.1.1.0/30");
        multiline.description = Some("lab\r\nshutdown".to_string());
        assert!(matches!(
            BasicStrategy.build_parameters(&multiline),
            Err(NetworkError::Validation(ValidationError::InvalidValue { ref field, .. })) if field == "description"
        ));

        let not_loopback = BasicStrategy.build_parameters(&request("Ethernet0/0", "10.0.0.0/24"));
        assert!(matches!(
            not_loopback,
            Err(NetworkError::Validation(ValidationError::InvalidName { .. }))
        ));

        let unnamed = BasicStrategy.build_parameters(&InterfaceRequest {
            ip: Some("10.0.0.0/24".into()),
            ..Default::default()
        });
        assert!(matches!(
            unnamed,
            Err(NetworkError::Validation(ValidationError::MissingField { .. }))
        ));
    }

    #[test]
    fn test_physical_accepts_dhcp_sentinel() {
        let params = PhysicalStrategy
            .build_parameters(&request("ethernet0/1", "DHCP"))
            .unwrap();
        assert_eq!(params.name, "Ethernet0/1");
        assert!(params.dhcp);
        assert_eq!(params.ip, "dhcp");
        assert!(params.reservations().is_empty());

        assert!(PhysicalStrategy
            .build_parameters(&request("Ethernet0/1.5", "10.0.0.0/24"))
            .is_err());
    }

    #[test]
    fn test_stanza_in_use() {
        assert!(stanza_in_use("interface Ethernet0/1\n ip address 10.0.0.1 255.255.255.0"));
        assert!(stanza_in_use("interface Ethernet0/1\n ip address dhcp"));
        assert!(!stanza_in_use("interface Ethernet0/1\n no ip address\n shutdown"));
    }

    #[test]
    fn test_serial_delete_plan() {
        let stanza = "interface Serial1/0\n description wan\n ip address 172.16.0.1 255.255.255.252\n encapsulation ppp";
        let plan = PhysicalStrategy.delete_plan("Serial1/0", stanza);
        assert_eq!(plan.releases, vec![Ipv4Addr::new(172, 16, 0, 1)]);
        assert_eq!(
            plan.commands.lines(),
            ["interface Serial1/0", "no description", "no ip address", "shutdown"]
        );

        let ethernet = PhysicalStrategy.delete_plan(
            "Ethernet0/1",
            "interface Ethernet0/1\n ip address dhcp",
        );
        assert!(ethernet.releases.is_empty());
        assert_eq!(ethernet.commands.lines(), ["no interface Ethernet0/1"]);
    }

    #[test]
    fn test_vlan_parameters() {
        let req = InterfaceRequest {
            parent: Some("ethernet0/0".into()),
            vlan_id: Some(10),
            ip: Some("192.168.10.0/24".into()),
            ..Default::default()
        };
        let params = VlanStrategy.build_parameters(&req).unwrap();
        assert_eq!(params.name, "Ethernet0/0.10");
        assert_eq!(params.ip, "192.168.10.1");
        assert_eq!(params.parent.as_deref(), Some("Ethernet0/0"));

        let out_of_range = InterfaceRequest {
            vlan_id: Some(4095),
            ..req.clone()
        };
        assert!(VlanStrategy.build_parameters(&out_of_range).is_err());

        let on_loopback = InterfaceRequest {
            parent: Some("Loopback0".into()),
            ..req
        };
        assert!(VlanStrategy.build_parameters(&on_loopback).is_err());
    }

    #[test]
    fn test_pool_parameters() {
        let req = InterfaceRequest {
            pool_id: Some(7),
            subnets: vec!["10.1.0.0/24".into(), "10.2.0.0/24".into()],
            ..Default::default()
        };
        let params = DhcpPoolStrategy.build_parameters(&req).unwrap();
        assert_eq!(params.name, "7");
        assert!(!params.subnets[0].secondary);
        assert!(params.subnets[1].secondary);
        assert_eq!(params.reservations().len(), 2);
        assert_eq!(DhcpPoolStrategy.owner_tag(&params), "dhcp-pool-7");

        let overlapping = InterfaceRequest {
            pool_id: Some(8),
            subnets: vec!["10.1.0.0/16".into(), "10.1.5.0/24".into()],
            ..Default::default()
        };
        assert!(DhcpPoolStrategy.build_parameters(&overlapping).is_err());

        let by_name = InterfaceRequest {
            name: Some("9".into()),
            ip: Some("10.9.0.0/24".into()),
            ..Default::default()
        };
        assert_eq!(
            DhcpPoolStrategy.build_parameters(&by_name).unwrap().pool_id,
            Some(9)
        );
    }

    #[test]
    fn test_pool_delete_plan() {
        let stanza = "ip dhcp pool 7\n network 10.1.0.0 255.255.255.0\n network 10.2.0.0 255.255.255.0 secondary\n default-router 10.1.0.1";
        let plan = DhcpPoolStrategy.delete_plan("7", stanza);
        assert_eq!(
            plan.releases,
            vec![Ipv4Addr::new(10, 1, 0, 0), Ipv4Addr::new(10, 2, 0, 0)]
        );
        assert_eq!(plan.commands.lines(), ["no ip dhcp pool 7"]);
    }
}
