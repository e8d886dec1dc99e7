//! Shared test helpers: scriptable wallet backends, factories and storage.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use selector_core::constants::{
    CONTRACT, HARDWARE_ACCOUNTS, PACKAGE_NAME, PENDING_CONTRACT, PENDING_SELECTED_WALLET_ID,
    SELECTED_WALLET_ID,
};
use selector_core::error::{StorageError, WalletError};
use selector_core::events::{SelectorEvent, WalletEvent};
use selector_core::options::{NetworkId, Options};
use selector_core::traits::{StorageService, WalletBehaviour};
use selector_core::types::*;
use selector_engine::{
    ReadOnlyStore, SelectorParams, SessionState, WalletBehaviourFactory, WalletContext,
    WalletModule, WalletModuleFactory, WalletSelector,
};
use selector_storage::{JsonStorage, MemoryStorage};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(2);

/// Script and counters shared between a test and the backend it drives.
#[derive(Default)]
struct MockScript {
    accounts: Mutex<Vec<Account>>,
    sign_in_accounts: Mutex<Option<Vec<Account>>>,
    init_delay: Mutex<Option<Duration>>,
    fail_init: AtomicBool,
    fail_get_accounts: AtomicBool,
    fail_sign_out: AtomicBool,
    reject_sign_in: AtomicBool,
    init_calls: AtomicUsize,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    get_accounts_calls: AtomicUsize,
    context: Mutex<Option<WalletContext>>,
}

/// Handle to a scriptable wallet backend.
///
/// Clones share the same script; the backend built by the selector reads it
/// on every call, so tests can change behaviour between steps.
#[derive(Clone)]
pub struct MockWallet {
    id: String,
    wallet_type: WalletType,
    script: Arc<MockScript>,
}

impl MockWallet {
    pub fn new(id: &str, wallet_type: WalletType) -> Self {
        Self {
            id: id.to_string(),
            wallet_type,
            script: Arc::new(MockScript::default()),
        }
    }

    pub fn browser(id: &str) -> Self {
        Self::new(id, WalletType::Browser)
    }

    pub fn injected(id: &str) -> Self {
        Self::new(id, WalletType::Injected)
    }

    pub fn hardware(id: &str) -> Self {
        Self::new(id, WalletType::Hardware)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Accounts the backend reports from `get_accounts` and `sign_in`.
    pub fn with_accounts(self, ids: &[&str]) -> Self {
        self.set_accounts(ids);
        self
    }

    pub fn set_accounts(&self, ids: &[&str]) {
        *self.script.accounts.lock() = accounts(ids);
    }

    /// Make `sign_in` return these accounts instead of the scripted ones.
    pub fn sign_in_returns(&self, ids: &[&str]) {
        *self.script.sign_in_accounts.lock() = Some(accounts(ids));
    }

    pub fn with_init_delay(self, delay: Duration) -> Self {
        *self.script.init_delay.lock() = Some(delay);
        self
    }

    pub fn fail_init(&self, fail: bool) {
        self.script.fail_init.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get_accounts(&self, fail: bool) {
        self.script.fail_get_accounts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.script.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Make `sign_in` fail as if the user dismissed the prompt.
    pub fn reject_sign_in(&self, reject: bool) {
        self.script.reject_sign_in.store(reject, Ordering::SeqCst);
    }

    pub fn init_calls(&self) -> usize {
        self.script.init_calls.load(Ordering::SeqCst)
    }

    pub fn sign_in_calls(&self) -> usize {
        self.script.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.script.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn get_accounts_calls(&self) -> usize {
        self.script.get_accounts_calls.load(Ordering::SeqCst)
    }

    /// Context the selector handed to the backend, once constructed.
    pub fn context(&self) -> Option<WalletContext> {
        self.script.context.lock().clone()
    }

    /// Emit an event on the backend's own bus.
    ///
    /// Panics if the wallet has not been constructed yet.
    pub fn emit(&self, event: WalletEvent) {
        let context = self.context().expect("wallet not constructed");
        context.emitter.emit(&event);
    }

    /// Factory that registers this wallet.
    pub fn factory(&self) -> MockFactory {
        MockFactory {
            outcome: FactoryOutcome::Available(self.clone()),
        }
    }
}

enum FactoryOutcome {
    Available(MockWallet),
    Unavailable,
    Failing(String),
}

/// Wallet module factory for tests.
pub struct MockFactory {
    outcome: FactoryOutcome,
}

impl MockFactory {
    /// Reports the backend as unavailable on this platform.
    pub fn unavailable() -> Self {
        Self {
            outcome: FactoryOutcome::Unavailable,
        }
    }

    /// Fails while creating the module descriptor.
    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: FactoryOutcome::Failing(reason.to_string()),
        }
    }
}

#[async_trait]
impl WalletModuleFactory for MockFactory {
    async fn create(&self, _options: &Options) -> Result<Option<WalletModule>, WalletError> {
        match &self.outcome {
            FactoryOutcome::Available(wallet) => {
                let metadata = WalletMetadata::new(wallet.id.to_uppercase(), format!("/assets/{}.png", wallet.id))
                    .with_description(format!("{} test wallet", wallet.wallet_type));
                Ok(Some(WalletModule::new(
                    wallet.id.clone(),
                    wallet.wallet_type,
                    metadata,
                    Arc::new(MockInit {
                        script: Arc::clone(&wallet.script),
                    }),
                )))
            }
            FactoryOutcome::Unavailable => Ok(None),
            FactoryOutcome::Failing(reason) => Err(WalletError::Unsupported(reason.clone())),
        }
    }
}

struct MockInit {
    script: Arc<MockScript>,
}

#[async_trait]
impl WalletBehaviourFactory for MockInit {
    async fn init(&self, context: WalletContext) -> Result<Box<dyn WalletBehaviour>, WalletError> {
        self.script.init_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.script.init_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.script.fail_init.load(Ordering::SeqCst) {
            return Err(WalletError::Backend("extension not responding".into()));
        }

        *self.script.context.lock() = Some(context.clone());
        Ok(Box::new(MockBackend {
            script: Arc::clone(&self.script),
            context,
        }))
    }
}

// Keeps its whole context, session handle included, like a real backend.
struct MockBackend {
    script: Arc<MockScript>,
    context: WalletContext,
}

#[async_trait]
impl WalletBehaviour for MockBackend {
    async fn sign_in(&self, params: &SignInParams) -> Result<Vec<Account>, WalletError> {
        self.script.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.reject_sign_in.load(Ordering::SeqCst) {
            return Err(WalletError::Rejected("user closed the prompt".into()));
        }

        if self.context.wallet_type == WalletType::Hardware {
            let paths = params.derivation_paths();
            if paths.is_empty() {
                return Err(WalletError::InvalidDerivationPaths);
            }
            // Each path derives the scripted account at the same position.
            let scripted = self.script.accounts.lock().clone();
            let mut derived: Vec<HardwareAccount> = Vec::with_capacity(paths.len());
            for (i, (account, path)) in scripted.iter().zip(paths).enumerate() {
                if derived.iter().any(|x| x.account_id == account.account_id) {
                    return Err(WalletError::DuplicateAccount(account.account_id.clone()));
                }
                derived.push(HardwareAccount {
                    account_id: account.account_id.clone(),
                    derivation_path: path.clone(),
                    public_key: format!("ed25519:{i}"),
                });
            }
            self.context.storage.set_item(HARDWARE_ACCOUNTS, &derived).await?;
            return Ok(derived.iter().map(Account::from).collect());
        }

        let override_accounts = self.script.sign_in_accounts.lock().clone();
        Ok(override_accounts.unwrap_or_else(|| self.script.accounts.lock().clone()))
    }

    async fn sign_out(&self) -> Result<(), WalletError> {
        self.script.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_sign_out.load(Ordering::SeqCst) {
            return Err(WalletError::Backend("device disconnected".into()));
        }
        self.script.accounts.lock().clear();
        Ok(())
    }

    async fn get_accounts(&self) -> Result<Vec<Account>, WalletError> {
        self.script.get_accounts_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_get_accounts.load(Ordering::SeqCst) {
            return Err(WalletError::Backend("rpc timeout".into()));
        }
        Ok(self.script.accounts.lock().clone())
    }

    async fn sign_and_send_transaction(
        &self,
        params: SignAndSendTransactionParams,
    ) -> Result<Option<ExecutionOutcome>, WalletError> {
        if self.context.wallet_type == WalletType::Browser {
            return Ok(None);
        }
        Ok(Some(outcome(params.receiver_id.as_deref().unwrap_or("unknown"))))
    }

    async fn sign_and_send_transactions(
        &self,
        params: SignAndSendTransactionsParams,
    ) -> Result<Vec<ExecutionOutcome>, WalletError> {
        if self.context.wallet_type == WalletType::Browser {
            return Ok(Vec::new());
        }
        Ok(params
            .transactions
            .iter()
            .map(|tx| outcome(tx.receiver_id.as_deref().unwrap_or("unknown")))
            .collect())
    }
}

fn outcome(receiver_id: &str) -> ExecutionOutcome {
    ExecutionOutcome {
        transaction_hash: format!("tx-{receiver_id}"),
        status: serde_json::json!({ "SuccessValue": "" }),
    }
}

/// Storage whose writes always fail. Reads fail too unless built with
/// [`FailingStorage::writes_only`].
#[derive(Debug, Default)]
pub struct FailingStorage {
    reads_succeed: bool,
}

impl FailingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes_only() -> Self {
        Self { reads_succeed: true }
    }
}

#[async_trait]
impl StorageService for FailingStorage {
    async fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        if self.reads_succeed {
            Ok(None)
        } else {
            Err(StorageError::Backend("disk unavailable".into()))
        }
    }

    async fn set_item(&self, _key: &str, _value: String) -> Result<(), StorageError> {
        Err(StorageError::Backend("disk full".into()))
    }

    async fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Backend("disk full".into()))
    }
}

// ------------------------------------------------------------------
// Fixtures
// ------------------------------------------------------------------

pub fn accounts(ids: &[&str]) -> Vec<Account> {
    ids.iter().map(|id| Account::new(*id)).collect()
}

pub fn contract(id: &str) -> ContractState {
    ContractState::new(id, Vec::new())
}

/// The selector's own namespace over `storage`.
pub fn package(storage: &Arc<MemoryStorage>) -> JsonStorage {
    JsonStorage::new(storage.clone(), PACKAGE_NAME)
}

/// Persist a session as if a previous run had selected `wallet_id`.
pub async fn seed_session(storage: &Arc<MemoryStorage>, wallet_id: &str, contract: &ContractState) {
    let package = package(storage);
    package.set_item(SELECTED_WALLET_ID, wallet_id).await.unwrap();
    package.set_item(CONTRACT, contract).await.unwrap();
}

/// Persist a redirect-pending sign-in marker.
pub async fn seed_pending(storage: &Arc<MemoryStorage>, wallet_id: &str, contract: &ContractState) {
    let package = package(storage);
    package.set_item(PENDING_SELECTED_WALLET_ID, wallet_id).await.unwrap();
    package.set_item(PENDING_CONTRACT, contract).await.unwrap();
}

/// Whether any pending sign-in key is still stored.
pub fn has_pending(storage: &MemoryStorage) -> bool {
    [PENDING_SELECTED_WALLET_ID, PENDING_CONTRACT]
        .iter()
        .any(|key| storage.raw(&format!("{PACKAGE_NAME}:{key}")).is_some())
}

/// Raw persisted value of a package-level key.
pub fn persisted(storage: &MemoryStorage, key: &str) -> Option<String> {
    storage.raw(&format!("{PACKAGE_NAME}:{key}"))
}

/// Set up a testnet selector over `storage` with the given factories.
pub async fn selector_with(storage: Arc<dyn StorageService>, factories: Vec<MockFactory>) -> WalletSelector {
    let mut params = SelectorParams::new(NetworkId::Testnet).with_storage(storage);
    for factory in factories {
        params = params.with_module(factory);
    }
    WalletSelector::setup(params).await.unwrap()
}

/// Wait until the session satisfies `predicate`.
pub async fn wait_for_state<F>(store: &ReadOnlyStore, predicate: F) -> SessionState
where
    F: FnMut(&SessionState) -> bool,
{
    let mut rx = store.subscribe();
    let state = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for session state")
        .expect("session store dropped");
    state.clone()
}

/// Wait until every event `wallet` emitted so far has been applied.
///
/// Events are applied in order, so a marker event that round-trips through
/// the selector bus means everything before it is done.
pub async fn flush_events(selector: &WalletSelector, wallet: &MockWallet) {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let marker = format!("flush-{}", NEXT.fetch_add(1, Ordering::Relaxed));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let expected = marker.clone();
    let subscription = selector.on(move |event: &SelectorEvent| {
        let SelectorEvent::NetworkChanged { network_id, .. } = event;
        if *network_id == expected {
            let _ = tx.send(());
        }
    });

    wallet.emit(WalletEvent::NetworkChanged { network_id: marker });
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out flushing wallet events");
    selector.off(&subscription);
}
