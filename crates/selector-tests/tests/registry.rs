//! Module registry: availability filtering, id uniqueness and lazy,
//! construct-once wallet instances.

use std::sync::Arc;
use std::time::Duration;

use selector_core::error::SelectorError;
use selector_core::options::NetworkId;
use selector_core::types::WalletType;
use selector_engine::{SelectorParams, WalletSelector};
use selector_storage::MemoryStorage;
use selector_tests::helpers::*;

#[tokio::test]
async fn duplicate_module_id_aborts_setup() {
    let first = MockWallet::browser("my-near-wallet");
    let second = MockWallet::injected("my-near-wallet");

    let params = SelectorParams::new(NetworkId::Testnet)
        .with_module(first.factory())
        .with_module(second.factory());
    let err = WalletSelector::setup(params).await.unwrap_err();

    assert_eq!(err, SelectorError::DuplicateModuleId("my-near-wallet".into()));
    assert_eq!(err.to_string(), "duplicate module id detected: my-near-wallet");
}

#[tokio::test]
async fn distinct_ids_register_in_factory_order() {
    let storage = Arc::new(MemoryStorage::new());
    let selector = selector_with(
        storage,
        vec![
            MockWallet::browser("my-near-wallet").factory(),
            MockWallet::injected("sender").factory(),
            MockWallet::hardware("ledger").factory(),
        ],
    )
    .await;

    let ids: Vec<String> = selector.modules().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, ["my-near-wallet", "sender", "ledger"]);
    assert_eq!(selector.store().get_state().modules.len(), 3);
}

#[tokio::test]
async fn unavailable_module_is_not_resolvable() {
    let storage = Arc::new(MemoryStorage::new());
    let selector = selector_with(
        storage,
        vec![MockFactory::unavailable(), MockWallet::injected("sender").factory()],
    )
    .await;

    assert_eq!(selector.modules().len(), 1);
    let err = selector.wallet(Some("math-wallet")).await.unwrap_err();
    assert_eq!(err, SelectorError::InvalidWalletId("math-wallet".into()));
}

#[tokio::test]
async fn failing_factory_does_not_break_setup() {
    let storage = Arc::new(MemoryStorage::new());
    let selector = selector_with(
        storage,
        vec![
            MockFactory::failing("no extension api"),
            MockWallet::injected("sender").factory(),
        ],
    )
    .await;

    let ids: Vec<String> = selector.modules().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, ["sender"]);
}

#[tokio::test]
async fn wallets_are_constructed_lazily() {
    let sender = MockWallet::injected("sender");
    let storage = Arc::new(MemoryStorage::new());
    let selector = selector_with(storage, vec![sender.factory()]).await;

    assert_eq!(sender.init_calls(), 0);
    assert!(!selector.modules()[0].is_initialized());

    selector.wallet(Some("sender")).await.unwrap();
    assert_eq!(sender.init_calls(), 1);
    assert!(selector.modules()[0].is_initialized());
}

#[tokio::test]
async fn concurrent_first_access_constructs_once() {
    let ledger = MockWallet::hardware("ledger").with_init_delay(Duration::from_millis(50));
    let storage = Arc::new(MemoryStorage::new());
    let selector = selector_with(storage, vec![ledger.factory()]).await;

    let (a, b) = tokio::join!(selector.wallet(Some("ledger")), selector.wallet(Some("ledger")));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(ledger.init_calls(), 1);
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn repeated_access_returns_cached_instance() {
    let sender = MockWallet::injected("sender");
    let storage = Arc::new(MemoryStorage::new());
    let selector = selector_with(storage, vec![sender.factory()]).await;

    let first = selector.wallet(Some("sender")).await.unwrap();
    let second = selector.wallet(Some("sender")).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(sender.init_calls(), 1);
}

#[tokio::test]
async fn failed_construction_is_retried_on_next_access() {
    let sender = MockWallet::injected("sender");
    sender.fail_init(true);
    let storage = Arc::new(MemoryStorage::new());
    let selector = selector_with(storage, vec![sender.factory()]).await;

    let err = selector.wallet(Some("sender")).await.unwrap_err();
    assert!(matches!(err, SelectorError::Wallet(_)));

    sender.fail_init(false);
    selector.wallet(Some("sender")).await.unwrap();
    assert_eq!(sender.init_calls(), 2);
}

#[tokio::test]
async fn backend_receives_scoped_context() {
    let ledger = MockWallet::hardware("ledger");
    let storage = Arc::new(MemoryStorage::new());
    let selector = selector_with(storage, vec![ledger.factory()]).await;

    let wallet = selector.wallet(Some("ledger")).await.unwrap();
    let context = ledger.context().unwrap();

    assert_eq!(context.id, "ledger");
    assert_eq!(context.wallet_type, WalletType::Hardware);
    assert_eq!(context.options.network.network_id, "testnet");
    assert_eq!(context.storage.resolve_key("accounts"), "wallet-selector:ledger:accounts");
    assert_eq!(context.metadata.name, "LEDGER");
    assert!(!context.store.get_state().is_signed_in());

    assert_eq!(wallet.id(), "ledger");
    assert_eq!(wallet.wallet_type(), WalletType::Hardware);
    assert_eq!(wallet.metadata().name, "LEDGER");
}

#[tokio::test]
async fn storage_read_failure_fails_setup() {
    let params = SelectorParams::new(NetworkId::Testnet)
        .with_storage(Arc::new(FailingStorage::new()))
        .with_module(MockWallet::injected("sender").factory());

    let err = WalletSelector::setup(params).await.unwrap_err();
    assert!(matches!(err, SelectorError::Storage(_)));
}

#[tokio::test]
async fn dropping_selector_releases_wallets_held_by_session_state() {
    let sender = MockWallet::injected("sender");
    let storage = Arc::new(MemoryStorage::new());
    let selector = selector_with(storage, vec![sender.factory()]).await;
    let store = selector.store();

    // The backend keeps its context, including this same session handle.
    drop(selector.wallet(Some("sender")).await.unwrap());
    assert!(store.get_state().modules[0].is_initialized());

    drop(selector);

    let module = store.get_state().modules[0].clone();
    assert!(!module.is_initialized());
    assert_eq!(module.wallet().await.unwrap_err(), SelectorError::Closed);
}
