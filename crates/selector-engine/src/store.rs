//! Session State Container.
//!
//! [`SessionState`] is mutated only through [`Action`]s applied by
//! [`reduce`]. Every transition is synchronous and total: actions about a
//! wallet that is no longer selected are ignored, never rejected. The
//! invariant `selected_wallet_id.is_some() == !accounts.is_empty() ==
//! contract.is_some()` holds after every transition.
//!
//! [`SessionStore`] owns the state behind a `watch` channel so readers get
//! change notifications, and mirrors the selected wallet id and contract
//! into durable storage after each committed transition.

use std::fmt;
use std::sync::Arc;

use selector_core::constants::{CONTRACT, SELECTED_WALLET_ID};
use selector_core::error::StorageError;
use selector_core::types::{Account, ContractState};
use selector_storage::JsonStorage;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::registry::ModuleState;

/// The single source of truth for the current session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub modules: Vec<ModuleState>,
    pub accounts: Vec<Account>,
    pub selected_wallet_id: Option<String>,
    pub contract: Option<ContractState>,
}

impl SessionState {
    pub fn is_signed_in(&self) -> bool {
        !self.accounts.is_empty()
    }

    pub fn is_selected(&self, wallet_id: &str) -> bool {
        self.selected_wallet_id.as_deref() == Some(wallet_id)
    }

    /// Whether selection, accounts and contract agree.
    pub fn is_consistent(&self) -> bool {
        let selected = self.selected_wallet_id.is_some();
        selected == !self.accounts.is_empty() && selected == self.contract.is_some()
    }

    fn disconnect(&mut self) {
        self.accounts.clear();
        self.selected_wallet_id = None;
        self.contract = None;
    }
}

/// Closed set of session transitions.
#[derive(Debug, Clone)]
pub enum Action {
    /// Initial population with the reconciliation result.
    Setup {
        modules: Vec<ModuleState>,
        accounts: Vec<Account>,
        contract: Option<ContractState>,
        selected_wallet_id: Option<String>,
    },
    WalletConnected {
        wallet_id: String,
        contract: ContractState,
        accounts: Vec<Account>,
    },
    WalletDisconnected { wallet_id: String },
    AccountsChanged { wallet_id: String, accounts: Vec<Account> },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Setup { .. } => "SETUP",
            Action::WalletConnected { .. } => "WALLET_CONNECTED",
            Action::WalletDisconnected { .. } => "WALLET_DISCONNECTED",
            Action::AccountsChanged { .. } => "ACCOUNTS_CHANGED",
        }
    }
}

/// Apply `action` to `state`. Returns whether the state changed.
pub fn reduce(state: &mut SessionState, action: Action) -> bool {
    match action {
        Action::Setup {
            modules,
            accounts,
            contract,
            selected_wallet_id,
        } => {
            state.modules = modules;
            match (selected_wallet_id, contract) {
                (Some(wallet_id), Some(contract)) if !accounts.is_empty() => {
                    state.accounts = accounts;
                    state.selected_wallet_id = Some(wallet_id);
                    state.contract = Some(contract);
                }
                _ => state.disconnect(),
            }
            true
        }
        Action::WalletConnected {
            wallet_id,
            contract,
            accounts,
        } => {
            if accounts.is_empty() {
                return false;
            }
            state.accounts = accounts;
            state.selected_wallet_id = Some(wallet_id);
            state.contract = Some(contract);
            true
        }
        Action::WalletDisconnected { wallet_id } => {
            if !state.is_selected(&wallet_id) {
                return false;
            }
            state.disconnect();
            true
        }
        Action::AccountsChanged {
            wallet_id,
            accounts,
        } => {
            if !state.is_selected(&wallet_id) {
                return false;
            }
            // An empty list would leave a selected wallet without accounts.
            if accounts.is_empty() {
                state.disconnect();
            } else {
                state.accounts = accounts;
            }
            true
        }
    }
}

/// Selected wallet and contract as last written to durable storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSession {
    pub selected_wallet_id: Option<String>,
    pub contract: Option<ContractState>,
}

/// Owner and only writer of [`SessionState`].
pub struct SessionStore {
    state: Arc<watch::Sender<SessionState>>,
    storage: JsonStorage,
    previous: PersistedSession,
    persisted: Mutex<PersistedSession>,
    debug: bool,
}

impl SessionStore {
    /// Create the store, reading the previous session from `storage`.
    ///
    /// The previous session is kept aside for reconciliation; the live state
    /// starts empty until `SETUP` is committed.
    pub async fn load(storage: JsonStorage, debug: bool) -> Result<Self, StorageError> {
        let previous = PersistedSession {
            selected_wallet_id: storage.get_item(SELECTED_WALLET_ID).await?,
            contract: storage.get_item(CONTRACT).await?,
        };
        debug!(selected_wallet_id = ?previous.selected_wallet_id, "loaded previous session");

        let (state, _) = watch::channel(SessionState::default());
        Ok(Self {
            state: Arc::new(state),
            storage,
            persisted: Mutex::new(previous.clone()),
            previous,
            debug,
        })
    }

    /// Session persisted by the previous run.
    pub fn previous_session(&self) -> &PersistedSession {
        &self.previous
    }

    /// Snapshot of the current state.
    pub fn get_state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn read_only(&self) -> ReadOnlyStore {
        ReadOnlyStore {
            state: Arc::clone(&self.state),
        }
    }

    /// Apply a transition in memory and notify subscribers if it changed
    /// anything.
    pub fn dispatch(&self, action: Action) -> bool {
        let name = action.name();
        let changed = self.state.send_if_modified(|state| reduce(state, action));

        if self.debug {
            info!(action = name, changed, "session transition");
        } else {
            debug!(action = name, changed, "session transition");
        }
        changed
    }

    /// [`dispatch`](Self::dispatch), then mirror the result to storage.
    pub async fn commit(&self, action: Action) -> bool {
        let changed = self.dispatch(action);
        if changed {
            self.flush().await;
        }
        changed
    }

    /// Write changed persisted fields. Failures are logged; the in-memory
    /// state stays authoritative and the next flush retries.
    pub async fn flush(&self) {
        let mut persisted = self.persisted.lock().await;
        let current = {
            let state = self.state.borrow();
            PersistedSession {
                selected_wallet_id: state.selected_wallet_id.clone(),
                contract: state.contract.clone(),
            }
        };

        if current.selected_wallet_id != persisted.selected_wallet_id {
            let result = match &current.selected_wallet_id {
                Some(id) => self.storage.set_item(SELECTED_WALLET_ID, id).await,
                None => self.storage.remove_item(SELECTED_WALLET_ID).await,
            };
            match result {
                Ok(()) => persisted.selected_wallet_id = current.selected_wallet_id,
                Err(e) => warn!(key = SELECTED_WALLET_ID, error = %e, "failed to persist session"),
            }
        }

        if current.contract != persisted.contract {
            let result = match &current.contract {
                Some(contract) => self.storage.set_item(CONTRACT, contract).await,
                None => self.storage.remove_item(CONTRACT).await,
            };
            match result {
                Ok(()) => persisted.contract = current.contract,
                Err(e) => warn!(key = CONTRACT, error = %e, "failed to persist session"),
            }
        }
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.state.borrow())
            .field("storage", &self.storage)
            .finish()
    }
}

/// Read-only projection handed to wallets and external callers.
#[derive(Clone)]
pub struct ReadOnlyStore {
    state: Arc<watch::Sender<SessionState>>,
}

impl ReadOnlyStore {
    pub fn get_state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified after every transition that changed the state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

impl fmt::Debug for ReadOnlyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnlyStore")
            .field(&*self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use selector_storage::MemoryStorage;

    fn contract(id: &str) -> ContractState {
        ContractState::new(id, Vec::new())
    }

    fn accounts(ids: &[&str]) -> Vec<Account> {
        ids.iter().map(|id| Account::new(*id)).collect()
    }

    fn connected(wallet_id: &str, ids: &[&str]) -> SessionState {
        let mut state = SessionState::default();
        reduce(
            &mut state,
            Action::WalletConnected {
                wallet_id: wallet_id.into(),
                contract: contract("app.testnet"),
                accounts: accounts(ids),
            },
        );
        state
    }

    #[test]
    fn connect_sets_all_three_fields() {
        let state = connected("ledger", &["alice"]);
        assert_eq!(state.selected_wallet_id.as_deref(), Some("ledger"));
        assert_eq!(state.accounts, accounts(&["alice"]));
        assert_eq!(state.contract, Some(contract("app.testnet")));
        assert!(state.is_consistent());
    }

    #[test]
    fn connect_with_no_accounts_is_ignored() {
        let mut state = SessionState::default();
        let changed = reduce(
            &mut state,
            Action::WalletConnected {
                wallet_id: "ledger".into(),
                contract: contract("app.testnet"),
                accounts: Vec::new(),
            },
        );
        assert!(!changed);
        assert!(state.selected_wallet_id.is_none());
    }

    #[test]
    fn connect_replaces_previous_wallet() {
        let mut state = connected("ledger", &["alice"]);
        reduce(
            &mut state,
            Action::WalletConnected {
                wallet_id: "sender".into(),
                contract: contract("other.testnet"),
                accounts: accounts(&["bob"]),
            },
        );
        assert_eq!(state.selected_wallet_id.as_deref(), Some("sender"));
        assert_eq!(state.accounts, accounts(&["bob"]));
    }

    #[test]
    fn disconnect_of_selected_wallet_resets() {
        let mut state = connected("ledger", &["alice"]);
        assert!(reduce(
            &mut state,
            Action::WalletDisconnected {
                wallet_id: "ledger".into()
            }
        ));
        assert!(state.accounts.is_empty());
        assert!(state.contract.is_none());
        assert!(state.selected_wallet_id.is_none());
    }

    #[test]
    fn stale_disconnect_is_ignored() {
        let mut state = connected("sender", &["bob"]);
        assert!(!reduce(
            &mut state,
            Action::WalletDisconnected {
                wallet_id: "ledger".into()
            }
        ));
        assert_eq!(state.selected_wallet_id.as_deref(), Some("sender"));
    }

    #[test]
    fn accounts_changed_replaces_wholesale() {
        let mut state = connected("sender", &["a", "b"]);
        reduce(
            &mut state,
            Action::AccountsChanged {
                wallet_id: "sender".into(),
                accounts: accounts(&["c"]),
            },
        );
        assert_eq!(state.accounts, accounts(&["c"]));
        assert_eq!(state.contract, Some(contract("app.testnet")));
    }

    #[test]
    fn accounts_changed_for_other_wallet_is_ignored() {
        let mut state = connected("sender", &["a"]);
        assert!(!reduce(
            &mut state,
            Action::AccountsChanged {
                wallet_id: "ledger".into(),
                accounts: accounts(&["z"]),
            },
        ));
        assert_eq!(state.accounts, accounts(&["a"]));
    }

    #[test]
    fn setup_normalizes_partial_session() {
        let mut state = SessionState::default();
        reduce(
            &mut state,
            Action::Setup {
                modules: Vec::new(),
                accounts: Vec::new(),
                contract: Some(contract("app.testnet")),
                selected_wallet_id: Some("ledger".into()),
            },
        );
        assert!(state.is_consistent());
        assert!(state.selected_wallet_id.is_none());
    }

    // --- proptest ---

    fn wallet_id() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("ledger".to_string()),
            Just("sender".to_string()),
            Just("my-near-wallet".to_string()),
        ]
    }

    fn account_list() -> impl Strategy<Value = Vec<Account>> {
        prop::collection::vec("[a-z]{1,8}".prop_map(Account::new), 0..3)
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            (wallet_id(), account_list()).prop_map(|(wallet_id, accounts)| {
                Action::WalletConnected {
                    contract: contract(&format!("{wallet_id}.app")),
                    wallet_id,
                    accounts,
                }
            }),
            wallet_id().prop_map(|wallet_id| Action::WalletDisconnected { wallet_id }),
            (wallet_id(), account_list())
                .prop_map(|(wallet_id, accounts)| Action::AccountsChanged { wallet_id, accounts }),
        ]
    }

    proptest! {
        #[test]
        fn invariant_holds_after_every_transition(actions in prop::collection::vec(action(), 0..40)) {
            let mut state = SessionState::default();
            for action in actions {
                reduce(&mut state, action);
                prop_assert!(state.is_consistent(), "inconsistent state: {:?}", state);
            }
        }

        #[test]
        fn signed_in_iff_accounts_present(actions in prop::collection::vec(action(), 0..40)) {
            let mut state = SessionState::default();
            for action in actions {
                reduce(&mut state, action);
                prop_assert_eq!(state.is_signed_in(), !state.accounts.is_empty());
                prop_assert_eq!(state.is_signed_in(), state.selected_wallet_id.is_some());
            }
        }
    }

    // --- SessionStore ---

    fn json_storage() -> (Arc<MemoryStorage>, JsonStorage) {
        let backend = Arc::new(MemoryStorage::new());
        let json = JsonStorage::new(backend.clone(), "wallet-selector");
        (backend, json)
    }

    #[tokio::test]
    async fn load_reads_previous_session_but_starts_empty() {
        let (_, json) = json_storage();
        json.set_item(SELECTED_WALLET_ID, "ledger").await.unwrap();
        json.set_item(CONTRACT, &contract("app.testnet")).await.unwrap();

        let store = SessionStore::load(json, false).await.unwrap();

        assert_eq!(
            store.previous_session().selected_wallet_id.as_deref(),
            Some("ledger")
        );
        assert!(store.get_state().selected_wallet_id.is_none());
    }

    #[tokio::test]
    async fn commit_mirrors_selection_to_storage() {
        let (backend, json) = json_storage();
        let store = SessionStore::load(json, false).await.unwrap();

        store
            .commit(Action::WalletConnected {
                wallet_id: "ledger".into(),
                contract: contract("app.testnet"),
                accounts: accounts(&["alice"]),
            })
            .await;
        assert_eq!(
            backend.raw("wallet-selector:selected_wallet_id").as_deref(),
            Some("\"ledger\"")
        );
        assert!(backend.raw("wallet-selector:contract").is_some());

        store
            .commit(Action::WalletDisconnected {
                wallet_id: "ledger".into(),
            })
            .await;
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let (_, json) = json_storage();
        let store = SessionStore::load(json, true).await.unwrap();
        let mut rx = store.read_only().subscribe();

        store.dispatch(Action::WalletConnected {
            wallet_id: "sender".into(),
            contract: contract("app.testnet"),
            accounts: accounts(&["bob"]),
        });

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_signed_in());
    }

    #[tokio::test]
    async fn ignored_transition_does_not_notify() {
        let (_, json) = json_storage();
        let store = SessionStore::load(json, false).await.unwrap();
        let rx = store.read_only().subscribe();

        let changed = store.dispatch(Action::WalletDisconnected {
            wallet_id: "ledger".into(),
        });

        assert!(!changed);
        assert!(!rx.has_changed().unwrap());
    }
}
