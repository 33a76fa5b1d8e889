//! Interface name handling

/// Interface type prefixes in the casing devices report them
pub const KNOWN_PREFIXES: &[&str] = &[
    "Loopback",
    "Ethernet",
    "FastEthernet",
    "GigabitEthernet",
    "TenGigabitEthernet",
    "Serial",
    "BRI",
    "Vlan",
    "Tunnel",
    "Port-channel",
];

/// Prefixes of ports that exist in hardware
pub const PHYSICAL_PORT_PREFIXES: &[&str] = &[
    "Ethernet",
    "FastEthernet",
    "GigabitEthernet",
    "TenGigabitEthernet",
    "Serial",
    "BRI",
];

/// Trim, drop inner whitespace and restore the canonical casing of a known
/// type prefix: ` loopback 5` becomes `Loopback5`.
pub fn normalize_interface_name(name: &str) -> String {
    let compact: String = name.split_whitespace().collect();
    let split = compact
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-'))
        .unwrap_or(compact.len());
    let (prefix, rest) = compact.split_at(split);

    match KNOWN_PREFIXES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(prefix))
    {
        Some(known) => format!("{}{}", known, rest),
        None => compact.clone(),
    }
}

/// Port on physical hardware without a sub-interface suffix
pub fn is_physical_port(name: &str) -> bool {
    !is_subinterface(name)
        && PHYSICAL_PORT_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

pub fn is_subinterface(name: &str) -> bool {
    name.contains('.')
}

pub fn is_serial(name: &str) -> bool {
    name.starts_with("Serial")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_interface_name() {
        assert_eq!(normalize_interface_name("  loopback5 "), "Loopback5");
        assert_eq!(normalize_interface_name("LOOPBACK 5"), "Loopback5");
        assert_eq!(normalize_interface_name("gigabitethernet0/1.20"), "GigabitEthernet0/1.20");
        assert_eq!(normalize_interface_name("port-channel1"), "Port-channel1");
        assert_eq!(normalize_interface_name("Dialer1"), "Dialer1");
    }

    #[test]
    fn test_physical_ports() {
        assert!(is_physical_port("Ethernet0/0"));
        assert!(is_physical_port("GigabitEthernet1"));
        assert!(is_physical_port("Serial1/0"));
        assert!(!is_physical_port("Ethernet0/0.10"));
        assert!(!is_physical_port("Loopback0"));
    }
}
