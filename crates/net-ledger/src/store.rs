//! Persistence for address reservations

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use netprov_core::addressing::parse_candidate;
use netprov_core::{AddressReservation, Result};

/// Durable record store behind the address ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Every stored reservation, in insertion order
    async fn load_all(&self) -> Result<Vec<AddressReservation>>;

    async fn insert(&self, reservation: &AddressReservation) -> Result<()>;

    /// Remove every record for the reservation's network
    async fn remove(&self, reservation: &AddressReservation) -> Result<()>;
}

/// Record layout of the document store the ledger file is shared with
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(rename = "_default", default)]
    table: BTreeMap<u64, StoredRecord>,
}

/// JSON file store compatible with `{"_default": {"1": {"ip_address": ...}}}`
/// documents. Every mutation rewrites the file atomically.
pub struct JsonFileStore {
    path: PathBuf,
    // serialises read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<LedgerDocument> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(LedgerDocument::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!(
                    "No ledger found at {}, starting fresh",
                    self.path.display()
                );
                Ok(LedgerDocument::default())
            }
            Err(e) => {
                log::warn!("Failed to read ledger {}: {}", self.path.display(), e);
                Err(e.into())
            }
        }
    }

    async fn write_document(&self, document: &LedgerDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(document)?;

        // Write atomically using temporary file
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        log::debug!(
            "Saved {} ledger records to {}",
            document.table.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for JsonFileStore {
    async fn load_all(&self) -> Result<Vec<AddressReservation>> {
        let document = self.read_document().await?;
        let mut reservations = Vec::with_capacity(document.table.len());

        for (id, record) in document.table {
            match parse_candidate(&record.ip_address) {
                Some(network) => reservations.push(AddressReservation::new(
                    network,
                    record.owner.unwrap_or_default(),
                )),
                None => log::warn!(
                    "Skipping ledger record {} with unparsable address '{}'",
                    id,
                    record.ip_address
                ),
            }
        }

        log::info!(
            "Loaded {} reservations from {}",
            reservations.len(),
            self.path.display()
        );
        Ok(reservations)
    }

    async fn insert(&self, reservation: &AddressReservation) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        let next_id = document.table.keys().next_back().map_or(1, |id| id + 1);
        document.table.insert(
            next_id,
            StoredRecord {
                ip_address: reservation.network.to_string(),
                owner: Some(reservation.owner.clone()).filter(|owner| !owner.is_empty()),
            },
        );
        self.write_document(&document).await
    }

    async fn remove(&self, reservation: &AddressReservation) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        document.table.retain(|_, record| {
            parse_candidate(&record.ip_address).map(|net| net.trunc()) != Some(reservation.network)
        });
        self.write_document(&document).await
    }
}

/// Volatile store for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<AddressReservation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<AddressReservation>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<AddressReservation>> {
        Ok(self.records.read().await.clone())
    }

    async fn insert(&self, reservation: &AddressReservation) -> Result<()> {
        self.records.write().await.push(reservation.clone());
        Ok(())
    }

    async fn remove(&self, reservation: &AddressReservation) -> Result<()> {
        self.records
            .write()
            .await
            .retain(|record| record.network != reservation.network);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_store_reads_existing_document() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("db.json");
        tokio::fs::write(
            &path,
            r#"{"_default": {"1": {"ip_address": "10.0.0.1/24"}, "2": {"ip_address": "192.168.5.0/30", "owner": "Loopback2"}, "3": {"ip_address": "garbage"}}}"#,
        )
        .await
        .unwrap();

        let store = JsonFileStore::new(&path);
        let records = store.load_all().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].network, "10.0.0.0/24".parse().unwrap());
        assert_eq!(records[0].owner, "");
        assert_eq!(records[1].owner, "Loopback2");
    }

    #[tokio::test]
    async fn test_json_store_insert_and_remove() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ledger").join("db.json");
        let store = JsonFileStore::new(&path);

        let first = AddressReservation::new("10.0.0.0/24".parse().unwrap(), "Loopback1");
        let second = AddressReservation::new("10.0.1.0/24".parse().unwrap(), "Loopback2");
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let document: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(document["_default"]["2"]["ip_address"], "10.0.1.0/24");

        store.remove(&first).await.unwrap();
        let records = store.load_all().await.unwrap();
        assert_eq!(records, vec![second]);
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("absent.json"));
        assert!(store.load_all().await.unwrap().is_empty());
    }
}
