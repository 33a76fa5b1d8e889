//! netprov core
//!
//! Error taxonomy, address arithmetic and interface naming rules shared by
//! the ledger, the template engine, the device session and the handlers.

pub mod addressing;
pub mod error;
pub mod naming;

pub use error::{ConnectionError, LedgerError, NetworkError, TemplateError, ValidationError};
pub use netprov_shared_types::*;

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, NetworkError>;

impl From<SharedTypeError> for NetworkError {
    fn from(err: SharedTypeError) -> Self {
        match err {
            SharedTypeError::InvalidValue { field, value } => {
                NetworkError::Validation(ValidationError::InvalidValue {
                    field: field.to_string(),
                    value,
                })
            }
            SharedTypeError::ParseError(message) => {
                NetworkError::Validation(ValidationError::InvalidValue {
                    field: "input".to_string(),
                    value: message,
                })
            }
            SharedTypeError::Unsupported(value) => {
                NetworkError::Validation(ValidationError::InvalidValue {
                    field: "unsupported".to_string(),
                    value,
                })
            }
        }
    }
}
