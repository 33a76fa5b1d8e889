use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharedTypeError;

/// Command dialect negotiated with a device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// Standard routed OS reached over SSH
    #[default]
    #[serde(rename = "cisco_ios")]
    CiscoIos,
    /// Nexus platform family reached over SSH
    #[serde(rename = "cisco_nxos")]
    CiscoNxos,
    /// Legacy serial/telnet access
    #[serde(rename = "cisco_ios_telnet")]
    CiscoIosTelnet,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::CiscoIos => "cisco_ios",
            Dialect::CiscoNxos => "cisco_nxos",
            Dialect::CiscoIosTelnet => "cisco_ios_telnet",
        }
    }

    pub fn is_telnet(&self) -> bool {
        matches!(self, Dialect::CiscoIosTelnet)
    }

    /// Show command listing every interface
    pub fn show_interfaces_command(&self) -> &'static str {
        match self {
            Dialect::CiscoNxos => "show interface",
            Dialect::CiscoIos | Dialect::CiscoIosTelnet => "show interfaces",
        }
    }

    pub fn running_config_command(&self) -> &'static str {
        "show running-config"
    }

    pub fn version_command(&self) -> &'static str {
        "show version"
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = SharedTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cisco_ios" | "ios" => Ok(Dialect::CiscoIos),
            "cisco_nxos" | "nxos" => Ok(Dialect::CiscoNxos),
            "cisco_ios_telnet" | "telnet" => Ok(Dialect::CiscoIosTelnet),
            other => Err(SharedTypeError::Unsupported(other.to_string())),
        }
    }
}

/// Everything needed to open a session to one device.
#[derive(Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub dialect: Dialect,
}

impl DeviceProfile {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            dialect: Dialect::default(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// `host:port` as used for socket connections
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("dialect", &self.dialect)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("cisco_nxos".parse::<Dialect>().unwrap(), Dialect::CiscoNxos);
        assert_eq!("Telnet".parse::<Dialect>().unwrap(), Dialect::CiscoIosTelnet);
        assert!("junos".parse::<Dialect>().is_err());
        assert_eq!(Dialect::default(), Dialect::CiscoIos);
    }

    #[test]
    fn test_profile_debug_redacts_password() {
        let profile = DeviceProfile::new("192.168.100.1", 22, "admin", "hunter2");
        let rendered = format!("{:?}", profile);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("192.168.100.1"));
    }
}
