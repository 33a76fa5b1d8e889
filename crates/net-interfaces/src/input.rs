//! Creation input sources

use std::path::Path;

use indexmap::IndexMap;

use netprov_core::{InterfaceFamily, InterfaceRequest, NetworkError, Result};

/// Structured input document with one creation request per family,
/// keyed by family label:
///
/// ```yaml
/// Loopback:
///   name: Loopback5
///   ip: 10.1.1.0/30
///   desc: management
/// DHCP:
///   pool: 7
///   subnets: [10.7.0.0/24, 10.8.0.0/24]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputDocument {
    entries: IndexMap<String, InterfaceRequest>,
}

impl InputDocument {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            log::warn!("Failed to read input document {}: {}", path.display(), e);
            NetworkError::from(e)
        })?;
        let document = Self::from_yaml_str(&content)?;
        log::debug!(
            "Loaded input document {} with {} entries",
            path.display(),
            document.entries.len()
        );
        Ok(document)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: IndexMap<String, InterfaceRequest> = serde_yaml::from_str(content)?;
        Ok(Self { entries })
    }

    /// Entry for `family`; the label is matched case-insensitively
    pub fn request_for(&self, family: InterfaceFamily) -> Option<&InterfaceRequest> {
        self.entries
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(family.label()))
            .map(|(_, request)| request)
    }
}

/// Where a creation takes its parameters from
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSource {
    Direct(InterfaceRequest),
    Document(InputDocument),
}

impl ParameterSource {
    pub fn request_for(&self, family: InterfaceFamily) -> Result<InterfaceRequest> {
        match self {
            ParameterSource::Direct(request) => Ok(request.clone()),
            ParameterSource::Document(document) => document
                .request_for(family)
                .cloned()
                .ok_or_else(|| NetworkError::not_found(format!("{} entry in input document", family))),
        }
    }
}
