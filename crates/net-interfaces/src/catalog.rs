//! Interface catalog read from the device

use std::sync::OnceLock;

use regex::Regex;

use netprov_core::naming::{is_physical_port, is_subinterface, normalize_interface_name};
use netprov_core::{InterfaceDescriptor, InterfaceFamily, Result, ShowRow};
use netprov_session::DeviceSession;

/// Row field holding the interface name
pub const INTERFACE_FIELD: &str = "interface";

fn pool_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^ip dhcp pool (\S+)\s*$").expect("valid pool header regex"))
}

/// Whether an interface name belongs to `family`
pub fn belongs_to(name: &str, family: InterfaceFamily) -> bool {
    match family {
        InterfaceFamily::Physical => is_physical_port(name),
        InterfaceFamily::Vlan => is_subinterface(name),
        InterfaceFamily::DhcpPool => false,
        InterfaceFamily::Loopback => name.contains(family.label()),
    }
}

/// Keep the rows of `family`, in device order
pub fn classify(rows: &[ShowRow], family: InterfaceFamily) -> Vec<InterfaceDescriptor> {
    rows.iter()
        .filter_map(|row| {
            let name = row.get(INTERFACE_FIELD)?;
            belongs_to(name, family).then(|| InterfaceDescriptor {
                name: name.clone(),
                family,
                attributes: row.clone(),
            })
        })
        .collect()
}

/// Current interfaces (or DHCP pools) of `family` on the device
pub async fn list_of_type(
    session: &mut DeviceSession,
    family: InterfaceFamily,
) -> Result<Vec<InterfaceDescriptor>> {
    if family == InterfaceFamily::DhcpPool {
        return list_pools(session).await;
    }

    let command = session.dialect().show_interfaces_command();
    let rows = session.show_rows(command).await?;
    let found = classify(&rows, family);
    log::debug!(
        "{} of {} interfaces on {} are {}",
        found.len(),
        rows.len(),
        session.host(),
        family
    );
    Ok(found)
}

/// Whether `candidate` is not yet taken within `family`
pub async fn name_is_free(
    session: &mut DeviceSession,
    family: InterfaceFamily,
    candidate: &str,
) -> Result<bool> {
    let candidate = normalize_interface_name(candidate);
    let current = list_of_type(session, family).await?;
    Ok(!current.iter().any(|descriptor| descriptor.name == candidate))
}

/// DHCP pools defined in the running configuration
pub async fn list_pools(session: &mut DeviceSession) -> Result<Vec<InterfaceDescriptor>> {
    let config = session.full_config(false).await?;
    let text = config.as_text().unwrap_or_default();
    Ok(pools_in(text))
}

/// Parse pool descriptors out of running-configuration text
pub fn pools_in(config: &str) -> Vec<InterfaceDescriptor> {
    pool_header_regex()
        .captures_iter(config)
        .map(|caps| {
            let id = caps[1].to_string();
            let mut descriptor = InterfaceDescriptor::new(id.clone(), InterfaceFamily::DhcpPool);
            if let Some(stanza) = pool_stanza(config, &id) {
                let networks: Vec<&str> = stanza
                    .lines()
                    .skip(1)
                    .map(str::trim)
                    .filter(|line| line.starts_with("network "))
                    .collect();
                descriptor
                    .attributes
                    .insert("networks".to_string(), networks.join("; "));
            }
            descriptor
        })
        .collect()
}

/// `ip dhcp pool <id>` block of the running configuration, header included
pub fn pool_stanza(config: &str, pool_id: &str) -> Option<String> {
    let header = format!("ip dhcp pool {}", pool_id);
    let mut lines = config.lines().map(str::trim_end);
    lines.find(|line| *line == header)?;

    let mut stanza = vec![header.clone()];
    stanza.extend(
        lines
            .take_while(|line| line.starts_with(' ') || line.starts_with('\t'))
            .map(str::to_string),
    );
    Some(stanza.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(names: &[&str]) -> Vec<ShowRow> {
        names
            .iter()
            .map(|name| {
                let mut row = ShowRow::new();
                row.insert(INTERFACE_FIELD.to_string(), name.to_string());
                row
            })
            .collect()
    }

    fn names(descriptors: &[InterfaceDescriptor]) -> Vec<&str> {
        descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_classify_by_family() {
        let rows = rows(&["Ethernet0/0", "Ethernet0/0.10", "Loopback0", "Serial1/0"]);

        assert_eq!(
            names(&classify(&rows, InterfaceFamily::Physical)),
            vec!["Ethernet0/0", "Serial1/0"]
        );
        assert_eq!(
            names(&classify(&rows, InterfaceFamily::Vlan)),
            vec!["Ethernet0/0.10"]
        );
        assert_eq!(
            names(&classify(&rows, InterfaceFamily::Loopback)),
            vec!["Loopback0"]
        );
        assert!(classify(&rows, InterfaceFamily::DhcpPool).is_empty());
    }

    #[test]
    fn test_classify_keeps_device_order() {
        let rows = rows(&["Serial1/0", "BRI0/0", "GigabitEthernet0/1", "Ethernet0/0"]);
        assert_eq!(
            names(&classify(&rows, InterfaceFamily::Physical)),
            vec!["Serial1/0", "BRI0/0", "GigabitEthernet0/1", "Ethernet0/0"]
        );
    }

    const CONFIG: &str = "\
hostname R1
!
ip dhcp pool 10
 network 10.1.0.0 255.255.255.0
 network 10.2.0.0 255.255.255.0 secondary
 default-router 10.1.0.1
!
ip dhcp pool 20
 network 172.16.0.0 255.255.0.0
!
interface Loopback0
";

    #[test]
    fn test_pools_in_running_config() {
        let pools = pools_in(CONFIG);
        assert_eq!(names(&pools), vec!["10", "20"]);
        assert_eq!(
            pools[0].attribute("networks"),
            Some("network 10.1.0.0 255.255.255.0; network 10.2.0.0 255.255.255.0 secondary")
        );
    }

    #[test]
    fn test_pool_stanza() {
        let stanza = pool_stanza(CONFIG, "10").unwrap();
        assert_eq!(stanza.lines().count(), 4);
        assert!(stanza.starts_with("ip dhcp pool 10\n"));
        assert!(pool_stanza(CONFIG, "1").is_none());
    }
}
