//! CLI prompt recognition shared by the interactive transports

use std::sync::OnceLock;

use regex::Regex;

fn prompt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.\-@/:()]+[>#]\s*$").expect("valid prompt regex"))
}

fn login_failure_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(authentication failed|login invalid|access denied|bad passwords)")
            .expect("valid login failure regex")
    })
}

fn last_line(buffer: &str) -> &str {
    buffer
        .trim_end_matches(['\r', '\n', ' '])
        .rsplit(['\n', '\r'])
        .next()
        .unwrap_or("")
}

/// Whether the buffer currently ends at a device prompt
pub(crate) fn ends_with_prompt(buffer: &str) -> bool {
    prompt_regex().is_match(last_line(buffer))
}

/// Privileged-exec or configuration prompt
pub(crate) fn is_privileged(buffer: &str) -> bool {
    last_line(buffer).trim_end().ends_with('#')
}

pub(crate) fn ends_with_any(buffer: &str, markers: &[&str]) -> bool {
    let tail = last_line(buffer).trim_end().to_ascii_lowercase();
    markers.iter().any(|marker| tail.ends_with(marker))
}

pub(crate) fn is_login_failure(buffer: &str) -> bool {
    login_failure_regex().is_match(buffer)
}

/// Drop the echoed command and the trailing prompt from raw output
pub(crate) fn clean_output(raw: &str, command: &str) -> String {
    let mut lines: Vec<&str> = raw
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .collect();

    if lines
        .first()
        .is_some_and(|first| first.trim_end().ends_with(command.trim()))
    {
        lines.remove(0);
    }
    while lines.last().is_some_and(|last| last.trim().is_empty()) {
        lines.pop();
    }
    if lines.last().is_some_and(|last| prompt_regex().is_match(last)) {
        lines.pop();
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_detection() {
        assert!(ends_with_prompt("some output\r\nR1#"));
        assert!(ends_with_prompt("R1>"));
        assert!(ends_with_prompt("R1(config-if)# "));
        assert!(!ends_with_prompt("Building configuration...\r\n"));
        assert!(!ends_with_prompt("Password:"));
        assert!(is_privileged("R1(config)#"));
        assert!(!is_privileged("R1>"));
    }

    #[test]
    fn test_login_markers() {
        assert!(ends_with_any("\r\nUser Access Verification\r\n\r\nUsername: ", &["username:", "login:"]));
        assert!(is_login_failure("% Authentication failed\r\n"));
        assert!(!is_login_failure("R1#"));
    }

    #[test]
    fn test_clean_output() {
        let raw = "show clock\r\n*12:00:01.123 UTC Mon Mar 1 2024\r\nR1#";
        assert_eq!(clean_output(raw, "show clock"), "*12:00:01.123 UTC Mon Mar 1 2024");
    }
}
