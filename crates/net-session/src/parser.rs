//! Structured show-output parsing

use std::sync::OnceLock;

use regex::Regex;

use netprov_core::{Dialect, ShowRow};

/// Turns raw show output into rows of named fields.
pub trait ShowParser: Send + Sync {
    /// `None` when the command has no known grammar
    fn parse(&self, dialect: Dialect, command: &str, output: &str) -> Option<Vec<ShowRow>>;
}

/// Built-in grammars for the interface listings the handlers rely on.
///
/// Rows use the field names `interface`, `link_status`, `protocol_status`,
/// `hardware_type`, `description` and `ip_address`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    Interfaces,
    IpInterfaceBrief,
}

impl TextParser {
    fn grammar_for(command: &str) -> Option<Grammar> {
        let command = command
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();

        if command.starts_with("show ip interface brief") {
            Some(Grammar::IpInterfaceBrief)
        } else if command.starts_with("show interface") && !command.contains("brief") {
            Some(Grammar::Interfaces)
        } else {
            None
        }
    }
}

impl ShowParser for TextParser {
    fn parse(&self, dialect: Dialect, command: &str, output: &str) -> Option<Vec<ShowRow>> {
        let grammar = Self::grammar_for(command)?;
        log::debug!("Parsing '{}' output for {} with {:?}", command, dialect, grammar);
        Some(match grammar {
            Grammar::Interfaces => parse_interfaces(output),
            Grammar::IpInterfaceBrief => parse_ip_interface_brief(output),
        })
    }
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<interface>[A-Za-z][\w/.:\-]*) is (?P<link>administratively down|up|down|deleted)(?:\s*\([^)]*\))?(?:,\s*line protocol is (?P<protocol>\w+))?",
        )
        .expect("valid interface header regex")
    })
}

fn hardware_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+Hardware(?: is|:)\s+([^,]+)").expect("valid hardware regex"))
}

fn description_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+Description:\s*(.*?)\s*$").expect("valid description regex"))
}

fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s+Internet address is\s+(\S+)").expect("valid address regex")
    })
}

fn brief_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<interface>\S+)\s+(?P<ip>\S+)\s+(?:YES|NO)\s+\S+\s+(?P<status>administratively down|up|down|deleted)\s+(?P<protocol>\S+)\s*$",
        )
        .expect("valid brief regex")
    })
}

fn new_row(interface: &str, link: &str, protocol: &str) -> ShowRow {
    let mut row = ShowRow::new();
    row.insert("interface".to_string(), interface.to_string());
    row.insert("link_status".to_string(), link.to_string());
    row.insert("protocol_status".to_string(), protocol.to_string());
    row.insert("hardware_type".to_string(), String::new());
    row.insert("description".to_string(), String::new());
    row.insert("ip_address".to_string(), String::new());
    row
}

/// `show interfaces` (IOS) and `show interface` (NX-OS) detail blocks
fn parse_interfaces(output: &str) -> Vec<ShowRow> {
    let mut rows: Vec<ShowRow> = Vec::new();

    for line in output.lines() {
        let line = line.trim_end();
        if let Some(caps) = header_regex().captures(line) {
            rows.push(new_row(
                &caps["interface"],
                &caps["link"],
                caps.name("protocol").map_or("", |m| m.as_str()),
            ));
            continue;
        }

        let Some(row) = rows.last_mut() else {
            continue;
        };
        if let Some(caps) = hardware_regex().captures(line) {
            row.insert("hardware_type".to_string(), caps[1].trim().to_string());
        } else if let Some(caps) = description_regex().captures(line) {
            row.insert("description".to_string(), caps[1].to_string());
        } else if let Some(caps) = address_regex().captures(line) {
            row.insert("ip_address".to_string(), caps[1].to_string());
        }
    }

    rows
}

fn parse_ip_interface_brief(output: &str) -> Vec<ShowRow> {
    output
        .lines()
        .filter_map(|line| brief_regex().captures(line.trim_end()))
        .filter(|caps| &caps["interface"] != "Interface")
        .map(|caps| {
            let mut row = new_row(&caps["interface"], &caps["status"], &caps["protocol"]);
            let ip = &caps["ip"];
            if ip != "unassigned" {
                row.insert("ip_address".to_string(), ip.to_string());
            }
            row
        })
        .collect()
}
