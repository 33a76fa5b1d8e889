//! Address ledger

use std::net::Ipv4Addr;
use std::sync::Arc;

use ipnet::Ipv4Net;
use tokio::sync::Mutex;

use netprov_core::addressing::{overlaps, require_candidate};
use netprov_core::{AddressReservation, LedgerError, NetworkError, Result};

use crate::store::{LedgerStore, MemoryStore};

/// Collision-free registry of reserved IPv4 networks.
///
/// Reservations are loaded once when the ledger is opened and written
/// through to the store on every mutation. Check-and-insert and release run
/// under one lock, so concurrent callers can never claim overlapping ranges.
pub struct AddressLedger {
    store: Arc<dyn LedgerStore>,
    reservations: Mutex<Vec<AddressReservation>>,
}

impl AddressLedger {
    /// Open a ledger over `store`, loading its current records
    pub async fn open(store: Arc<dyn LedgerStore>) -> Result<Self> {
        let reservations = store.load_all().await?;
        log::debug!("Address ledger opened with {} reservations", reservations.len());
        Ok(Self {
            store,
            reservations: Mutex::new(reservations),
        })
    }

    /// Empty ledger that is never persisted
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            reservations: Mutex::new(Vec::new()),
        }
    }

    /// Whether `candidate` (`a.b.c.d/len` or a bare address) can be handed
    /// out. Malformed input is simply not available.
    pub async fn is_available(&self, candidate: &str) -> bool {
        self.check(candidate).await.is_ok()
    }

    /// Like [`is_available`](Self::is_available) but reports why a candidate
    /// was refused. Returns the parsed candidate on success.
    pub async fn check(&self, candidate: &str) -> Result<Ipv4Net> {
        let net = require_candidate(candidate)?;
        let reservations = self.reservations.lock().await;
        match find_conflict(&reservations, &net) {
            Some(existing) => Err(conflict(&net, existing)),
            None => Ok(net),
        }
    }

    /// Check and claim `network` for `owner` in one step.
    pub async fn try_reserve(&self, network: &str, owner: &str) -> Result<AddressReservation> {
        let net = require_candidate(network)?;
        let mut reserved = self.try_reserve_all(&[(net, owner.to_string())]).await?;
        Ok(reserved.remove(0))
    }

    /// Checked alias of [`try_reserve`](Self::try_reserve); a reservation is
    /// never appended without the availability check.
    pub async fn reserve(&self, network: &str, owner: &str) -> Result<AddressReservation> {
        self.try_reserve(network, owner).await
    }

    /// Claim several networks atomically. Either every claim succeeds or the
    /// ledger is left untouched.
    pub async fn try_reserve_all(
        &self,
        claims: &[(Ipv4Net, String)],
    ) -> Result<Vec<AddressReservation>> {
        let mut reservations = self.reservations.lock().await;

        let mut accepted: Vec<AddressReservation> = Vec::with_capacity(claims.len());
        for (net, owner) in claims {
            if let Some(existing) = find_conflict(&reservations, net) {
                return Err(conflict(net, existing));
            }
            if let Some(existing) = find_conflict(&accepted, net) {
                return Err(conflict(net, existing));
            }
            accepted.push(AddressReservation::new(*net, owner.clone()));
        }

        let mut persisted: Vec<AddressReservation> = Vec::with_capacity(accepted.len());
        for reservation in &accepted {
            if let Err(e) = self.store.insert(reservation).await {
                log::error!("Failed to persist reservation {}: {}", reservation, e);
                for done in &persisted {
                    if let Err(undo) = self.store.remove(done).await {
                        log::warn!("Failed to undo reservation {}: {}", done, undo);
                    }
                }
                return Err(e);
            }
            persisted.push(reservation.clone());
        }

        for reservation in &accepted {
            log::info!("Reserved {}", reservation);
        }
        reservations.extend(accepted.iter().cloned());
        Ok(accepted)
    }

    /// Remove the reservation whose network contains `address`.
    pub async fn release(&self, address: Ipv4Addr) -> Result<AddressReservation> {
        let mut reservations = self.reservations.lock().await;
        let position = reservations
            .iter()
            .position(|reservation| reservation.network.contains(&address))
            .ok_or(LedgerError::NotFound { address })?;

        self.store.remove(&reservations[position]).await?;
        let released = reservations.remove(position);
        log::info!("Released {}", released);
        Ok(released)
    }

    /// Parse and release; used by the CLI where the address is typed in
    pub async fn release_str(&self, address: &str) -> Result<AddressReservation> {
        let net = require_candidate(address)?;
        self.release(net.addr()).await
    }

    pub async fn reservations(&self) -> Vec<AddressReservation> {
        self.reservations.lock().await.clone()
    }

    pub async fn owned_by(&self, owner: &str) -> Vec<AddressReservation> {
        self.reservations
            .lock()
            .await
            .iter()
            .filter(|reservation| reservation.owner == owner)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.reservations.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reservations.lock().await.is_empty()
    }
}

/// First reservation that `candidate` collides with. The candidate's own
/// address may not be inside a reserved range (network and broadcast
/// addresses included) and its network may not overlap one.
fn find_conflict<'a>(
    reservations: &'a [AddressReservation],
    candidate: &Ipv4Net,
) -> Option<&'a AddressReservation> {
    let host = candidate.addr();
    let candidate_net = candidate.trunc();
    reservations.iter().find(|reservation| {
        let reserved = &reservation.network;
        host == reserved.network()
            || host == reserved.broadcast()
            || reserved.contains(&host)
            || overlaps(&candidate_net, reserved)
    })
}

fn conflict(candidate: &Ipv4Net, existing: &AddressReservation) -> NetworkError {
    LedgerError::Conflict {
        candidate: candidate.to_string(),
        existing: existing.network.to_string(),
    }
    .into()
}
