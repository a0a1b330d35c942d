//! 余额缓存集成测试

mod common;

use std::sync::Arc;

use common::{register_derived, MockChainClient};
use ironvault::{
    domain::chain_config::Chain,
    error::AppErrorCode,
    repository::{BalanceCacheRepository, InMemoryStore},
    service::BalanceCacheService,
};
use uuid::Uuid;

fn service(
    store: &Arc<InMemoryStore>,
    client: &Arc<MockChainClient>,
    ttl_secs: i64,
) -> BalanceCacheService {
    BalanceCacheService::new(
        store.clone(),
        store.clone(),
        client.clone(),
        chrono::Duration::seconds(ttl_secs),
    )
}

#[tokio::test]
async fn test_reads_within_ttl_hit_cache() {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(MockChainClient::new());
    let svc = service(&store, &client, 30);
    let wallet_id = Uuid::new_v4();
    let address = register_derived(&store, wallet_id, Chain::Eth).await;

    client.push_balance(Ok(1_250_000_000_000_000_000));

    let first = svc
        .get_address_balance(wallet_id, address.id, false)
        .await
        .unwrap();
    assert_eq!(first.balance, "1.25");
    assert!(!first.stale);
    assert!(first.updated_at.is_some());

    let second = svc
        .get_address_balance(wallet_id, address.id, false)
        .await
        .unwrap();
    assert_eq!(second, first);
    assert_eq!(client.balance_calls(), 1);

    let stored = store.address(address.id).unwrap();
    assert_eq!(stored.cached_balance.as_deref(), Some("1.25"));
}

#[tokio::test]
async fn test_force_refresh_bypasses_cache() {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(MockChainClient::new());
    let svc = service(&store, &client, 30);
    let wallet_id = Uuid::new_v4();
    let address = register_derived(&store, wallet_id, Chain::Btc).await;

    client.push_balance(Ok(100_000_000));
    client.push_balance(Ok(150_000_000));

    let first = svc
        .get_address_balance(wallet_id, address.id, false)
        .await
        .unwrap();
    assert_eq!(first.balance, "1");

    let refreshed = svc
        .get_address_balance(wallet_id, address.id, true)
        .await
        .unwrap();
    assert_eq!(refreshed.balance, "1.5");
    assert_eq!(client.balance_calls(), 2);
}

#[tokio::test]
async fn test_expired_entry_refetched() {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(MockChainClient::new());
    let svc = service(&store, &client, 30);
    let wallet_id = Uuid::new_v4();
    let address = register_derived(&store, wallet_id, Chain::Sol).await;

    let old = chrono::Utc::now() - chrono::Duration::seconds(31);
    store.store_balance(address.id, "3", old).await.unwrap();
    client.push_balance(Ok(4_000_000_000));

    let result = svc
        .get_address_balance(wallet_id, address.id, false)
        .await
        .unwrap();
    assert_eq!(result.balance, "4");
    assert!(!result.stale);
    assert_eq!(client.balance_calls(), 1);
}

#[tokio::test]
async fn test_live_failure_serves_stale_value() {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(MockChainClient::new());
    let svc = service(&store, &client, 30);
    let wallet_id = Uuid::new_v4();
    let address = register_derived(&store, wallet_id, Chain::Eth).await;

    let old = chrono::Utc::now() - chrono::Duration::minutes(5);
    store.store_balance(address.id, "0.5", old).await.unwrap();
    client.push_balance(Err("connection refused"));

    let result = svc
        .get_address_balance(wallet_id, address.id, false)
        .await
        .unwrap();
    assert_eq!(result.balance, "0.5");
    assert!(result.stale);
    assert_eq!(result.updated_at, Some(old));
}

#[tokio::test]
async fn test_live_failure_without_cache() {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(MockChainClient::new());
    let svc = service(&store, &client, 30);
    let wallet_id = Uuid::new_v4();
    let address = register_derived(&store, wallet_id, Chain::Doge).await;

    let result = svc
        .get_address_balance(wallet_id, address.id, false)
        .await
        .unwrap();
    assert_eq!(result.balance, "0");
    assert!(result.stale);
    assert!(result.updated_at.is_none());
}

#[tokio::test]
async fn test_persist_failure_still_returns_live_value() {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(MockChainClient::new());
    let svc = service(&store, &client, 30);
    let wallet_id = Uuid::new_v4();
    let address = register_derived(&store, wallet_id, Chain::Eth).await;

    store.set_fail_balance_writes(true);
    client.push_balance(Ok(2_000_000_000_000_000_000));

    let result = svc
        .get_address_balance(wallet_id, address.id, false)
        .await
        .unwrap();
    assert_eq!(result.balance, "2");
    assert!(!result.stale);
    assert!(store.address(address.id).unwrap().cached_balance.is_none());
}

#[tokio::test]
async fn test_unknown_address() {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(MockChainClient::new());
    let svc = service(&store, &client, 30);
    let wallet_id = Uuid::new_v4();
    let address = register_derived(&store, wallet_id, Chain::Eth).await;

    let err = svc
        .get_address_balance(Uuid::new_v4(), address.id, false)
        .await
        .unwrap_err();
    assert_eq!(err.code, AppErrorCode::AddressNotFound);

    let err = svc
        .get_address_balance(wallet_id, Uuid::new_v4(), false)
        .await
        .unwrap_err();
    assert_eq!(err.code, AppErrorCode::AddressNotFound);
    assert_eq!(client.balance_calls(), 0);
}
