//! Error types for provisioning operations

use std::net::Ipv4Addr;

use thiserror::Error;

/// Main error type for provisioning operations
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Address ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Input document error: {0}")]
    Document(#[from] serde_yaml::Error),
}

impl NetworkError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        NetworkError::NotFound {
            resource: resource.into(),
        }
    }

    /// Recoverable errors abort a single step and may be retried with other
    /// input; everything else ends the current workflow.
    pub fn is_recoverable(&self) -> bool {
        match self {
            NetworkError::Validation(_) => true,
            NetworkError::Ledger(LedgerError::Conflict { .. }) => true,
            NetworkError::NotFound { .. } => true,
            _ => false,
        }
    }
}

/// Session establishment and command execution errors
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Authentication failed for {host}")]
    Authentication { host: String },

    #[error("Connection to {host} timed out")]
    Timeout { host: String },

    #[error("Connection to {host} failed: {message}")]
    Transport { host: String, message: String },

    #[error("Command '{command}' did not complete within {seconds}s")]
    ReadTimeout { command: String, seconds: u64 },

    #[error("Session is not connected")]
    NotConnected,
}

/// Input validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Malformed address: {value}")]
    MalformedAddress { value: String },

    #[error("{value} does not start at its network address")]
    NotNetworkAddress { value: String },

    #[error("Interface name {name} is already in use")]
    DuplicateName { name: String },

    #[error("VLAN {vlan_id} already exists on {parent}")]
    DuplicateVlan { parent: String, vlan_id: u16 },

    #[error("DHCP pool {pool_id} already exists")]
    DuplicatePool { pool_id: u32 },

    #[error("Interface {name} already carries an address")]
    InUse { name: String },

    #[error("Invalid interface name {name}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Template loading and rendering errors
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template {name} not found")]
    Missing { name: String },

    #[error("Template {name} is malformed: {message}")]
    Malformed { name: String, message: String },

    #[error("Template {template} references unresolved field {field}")]
    UnresolvedField { template: String, field: String },

    #[error("Template directory {path} could not be read: {message}")]
    Directory { path: String, message: String },
}

/// Address ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{candidate} conflicts with reserved network {existing}")]
    Conflict { candidate: String, existing: String },

    #[error("No reservation contains {address}")]
    NotFound { address: Ipv4Addr },

    #[error("Ledger storage failed: {message}")]
    Storage { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let conflict = NetworkError::from(LedgerError::Conflict {
            candidate: "10.0.0.0/24".into(),
            existing: "10.0.0.0/16".into(),
        });
        assert!(conflict.is_recoverable());

        let duplicate = NetworkError::from(ValidationError::DuplicateName {
            name: "Loopback1".into(),
        });
        assert!(duplicate.is_recoverable());

        let auth = NetworkError::from(ConnectionError::Authentication {
            host: "10.0.0.1".into(),
        });
        assert!(!auth.is_recoverable());

        let template = NetworkError::from(TemplateError::Missing {
            name: "loopback".into(),
        });
        assert!(!template.is_recoverable());
    }
}
