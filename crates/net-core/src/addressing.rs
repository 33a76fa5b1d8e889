//! IPv4 address arithmetic shared by the ledger and the handlers

use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::OnceLock;

use ipnet::Ipv4Net;
use regex::Regex;

use crate::error::ValidationError;

/// Regex for dotted-quad literals embedded in device output
pub const IPV4_LITERAL_REGEX: &str = r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b";

/// Parse `a.b.c.d/len` or a bare address (treated as /32).
/// Host bits are kept so callers can still see the typed address.
pub fn parse_candidate(text: &str) -> Option<Ipv4Net> {
    let text = text.trim();
    if text.contains('/') {
        return Ipv4Net::from_str(text).ok();
    }
    let addr = Ipv4Addr::from_str(text).ok()?;
    Ipv4Net::new(addr, 32).ok()
}

/// Parse a candidate or report it as malformed
pub fn require_candidate(text: &str) -> Result<Ipv4Net, ValidationError> {
    parse_candidate(text).ok_or_else(|| ValidationError::MalformedAddress {
        value: text.to_string(),
    })
}

/// First usable host of `net`. The supplied address must be the network
/// address itself; `10.0.0.5/24` is rejected.
pub fn first_usable_host(net: &Ipv4Net) -> Result<Ipv4Addr, ValidationError> {
    if net.addr() != net.network() {
        return Err(ValidationError::NotNetworkAddress {
            value: net.to_string(),
        });
    }
    net.hosts()
        .next()
        .ok_or_else(|| ValidationError::MalformedAddress {
            value: net.to_string(),
        })
}

pub fn dotted_mask(net: &Ipv4Net) -> String {
    net.netmask().to_string()
}

/// Build a network from an address and a dotted mask as printed in
/// running configuration (`network 10.0.0.0 255.255.255.0`).
pub fn network_from_mask(addr: Ipv4Addr, mask: Ipv4Addr) -> Option<Ipv4Net> {
    let prefix = ipnet::ipv4_mask_to_prefix(mask).ok()?;
    Ipv4Net::new(addr, prefix).ok().map(|net| net.trunc())
}

/// All IPv4 literals in `text`, in order of appearance
pub fn ipv4_literals(text: &str) -> Vec<Ipv4Addr> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(IPV4_LITERAL_REGEX).expect("valid IPv4 literal regex"));
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<Ipv4Addr>().ok())
        .collect()
}

/// Whether an interface stanza takes its address from DHCP
pub fn is_dhcp_assigned(stanza: &str) -> bool {
    stanza
        .lines()
        .any(|line| line.trim().eq_ignore_ascii_case("ip address dhcp"))
}

/// Address an interface stanza is configured with. The `ip address` line
/// wins over literals elsewhere (descriptions may contain addresses).
pub fn configured_address(stanza: &str) -> Option<Ipv4Addr> {
    if is_dhcp_assigned(stanza) {
        return None;
    }
    stanza
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("ip address "))
        .find_map(|line| ipv4_literals(line).into_iter().next())
        .or_else(|| ipv4_literals(stanza).into_iter().next())
}

/// Two networks share at least one address
pub fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}
