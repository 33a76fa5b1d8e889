//! Address ledger tests

use std::net::Ipv4Addr;
use std::sync::Arc;

use netprov_core::{AddressReservation, LedgerError, NetworkError};

use crate::store::MockLedgerStore;
use crate::{AddressLedger, JsonFileStore, MemoryStore};

#[tokio::test]
async fn test_reserved_network_blocks_its_range() {
    let ledger = AddressLedger::in_memory();
    assert!(ledger.is_available("10.0.0.0/24").await);

    ledger.try_reserve("10.0.0.0/24", "Loopback5").await.unwrap();

    assert!(!ledger.is_available("10.0.0.0/24").await);
    assert!(!ledger.is_available("10.0.0.5/32").await);
    assert!(!ledger.is_available("10.0.0.255/32").await);
    assert!(!ledger.is_available("10.0.0.0/16").await);
    assert!(ledger.is_available("10.0.1.0/24").await);
}

#[tokio::test]
async fn test_malformed_candidate_is_unavailable() {
    let ledger = AddressLedger::in_memory();
    assert!(!ledger.is_available("10.0.0/24").await);
    assert!(!ledger.is_available("").await);

    let err = ledger.check("banana").await.unwrap_err();
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_release_makes_network_available_again() {
    let ledger = AddressLedger::in_memory();
    ledger.try_reserve("10.0.0.0/24", "Loopback5").await.unwrap();

    let released = ledger.release(Ipv4Addr::new(10, 0, 0, 1)).await.unwrap();
    assert_eq!(released.network, "10.0.0.0/24".parse().unwrap());
    assert_eq!(released.owner, "Loopback5");
    assert!(ledger.is_available("10.0.0.0/24").await);
}

#[tokio::test]
async fn test_release_unknown_address_is_not_found() {
    let ledger = AddressLedger::in_memory();
    ledger.try_reserve("10.0.0.0/24", "Loopback5").await.unwrap();

    let err = ledger.release(Ipv4Addr::new(172, 16, 0, 1)).await.unwrap_err();
    assert!(matches!(
        err,
        NetworkError::Ledger(LedgerError::NotFound { .. })
    ));
    assert_eq!(ledger.len().await, 1);
}

#[tokio::test]
async fn test_reserve_rejects_conflicts() {
    let ledger = AddressLedger::in_memory();
    ledger.reserve("192.168.0.0/24", "Vlan10").await.unwrap();

    let err = ledger.reserve("192.168.0.128/25", "Vlan20").await.unwrap_err();
    assert!(matches!(
        err,
        NetworkError::Ledger(LedgerError::Conflict { .. })
    ));
    assert_eq!(ledger.len().await, 1);
}

#[tokio::test]
async fn test_reserve_all_is_all_or_nothing() {
    let ledger = AddressLedger::in_memory();
    ledger.try_reserve("10.9.0.0/24", "other").await.unwrap();

    let claims = vec![
        ("10.8.0.0/24".parse().unwrap(), "dhcp-pool-1".to_string()),
        ("10.9.0.0/25".parse().unwrap(), "dhcp-pool-1".to_string()),
    ];
    assert!(ledger.try_reserve_all(&claims).await.is_err());
    assert!(ledger.is_available("10.8.0.0/24").await);

    let overlapping = vec![
        ("10.7.0.0/24".parse().unwrap(), "dhcp-pool-2".to_string()),
        ("10.7.0.0/25".parse().unwrap(), "dhcp-pool-2".to_string()),
    ];
    assert!(ledger.try_reserve_all(&overlapping).await.is_err());
    assert_eq!(ledger.len().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_claims_cannot_overlap() {
    let ledger = Arc::new(AddressLedger::in_memory());

    let mut handles = Vec::new();
    for owner in ["Loopback1", "Loopback2", "Loopback3", "Loopback4"] {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.try_reserve("10.50.0.0/24", owner).await.is_ok()
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
    assert_eq!(ledger.len().await, 1);
}

#[tokio::test]
async fn test_no_two_reservations_overlap() {
    let ledger = AddressLedger::in_memory();
    let candidates = [
        "10.0.0.0/24",
        "10.0.0.0/25",
        "10.0.0.128/25",
        "10.0.1.0/24",
        "10.0.0.0/16",
        "10.0.1.255/32",
        "10.0.2.0/30",
        "10.0.2.4/30",
    ];
    for (index, candidate) in candidates.iter().enumerate() {
        let _ = ledger.try_reserve(candidate, &format!("owner{}", index)).await;
    }

    let held = ledger.reservations().await;
    for (i, a) in held.iter().enumerate() {
        for b in held.iter().skip(i + 1) {
            assert!(!a.network.contains(&b.network.network()), "{} / {}", a, b);
            assert!(!b.network.contains(&a.network.network()), "{} / {}", a, b);
            assert_ne!(a.network.broadcast(), b.network.network());
            assert_ne!(a.network.network(), b.network.broadcast());
        }
    }
    assert_eq!(held.len(), 4);
}

#[tokio::test]
async fn test_store_failure_leaves_ledger_unchanged() {
    let mut store = MockLedgerStore::new();
    store.expect_load_all().returning(|| Ok(Vec::new()));
    store.expect_insert().times(1).returning(|_| {
        Err(LedgerError::Storage {
            message: "disk full".to_string(),
        }
        .into())
    });

    let ledger = AddressLedger::open(Arc::new(store)).await.unwrap();
    assert!(ledger.try_reserve("10.0.0.0/24", "Loopback1").await.is_err());
    assert!(ledger.is_available("10.0.0.0/24").await);
}

#[tokio::test]
async fn test_release_writes_through_to_store() {
    let mut store = MockLedgerStore::new();
    store.expect_load_all().returning(|| {
        Ok(vec![AddressReservation::new(
            "172.16.0.0/30".parse().unwrap(),
            "Serial1/0",
        )])
    });
    store
        .expect_remove()
        .withf(|reservation| reservation.owner == "Serial1/0")
        .times(1)
        .returning(|_| Ok(()));

    let ledger = AddressLedger::open(Arc::new(store)).await.unwrap();
    ledger.release(Ipv4Addr::new(172, 16, 0, 1)).await.unwrap();
    assert!(ledger.is_empty().await);
}

#[tokio::test]
async fn test_ledger_survives_reopen() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("db.json");

    {
        let ledger = AddressLedger::open(Arc::new(JsonFileStore::new(&path)))
            .await
            .unwrap();
        ledger.try_reserve("10.20.0.0/24", "Loopback20").await.unwrap();
        ledger.try_reserve("10.21.0.0/24", "Loopback21").await.unwrap();
        ledger.release(Ipv4Addr::new(10, 20, 0, 1)).await.unwrap();
    }

    let reopened = AddressLedger::open(Arc::new(JsonFileStore::new(&path)))
        .await
        .unwrap();
    assert!(reopened.is_available("10.20.0.0/24").await);
    assert!(!reopened.is_available("10.21.0.0/24").await);
    assert_eq!(reopened.owned_by("Loopback21").await.len(), 1);
}

#[tokio::test]
async fn test_memory_store_seeded_records() {
    let store = MemoryStore::with_records(vec![AddressReservation::new(
        "192.0.2.0/24".parse().unwrap(),
        "Loopback0",
    )]);
    let ledger = AddressLedger::open(Arc::new(store)).await.unwrap();
    assert!(!ledger.is_available("192.0.2.77").await);
}
