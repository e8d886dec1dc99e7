//! Wallet Event Interceptor.
//!
//! Every backend is handed to callers wrapped in a [`Wallet`]. The wrapper
//! keeps the backend's contract but routes sign-in and sign-out results into
//! session transitions. Events the backend emits on its own bus are queued
//! and applied in order by a per-wallet mediator task.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;

use async_trait::async_trait;
use selector_core::constants::{PENDING_CONTRACT, PENDING_SELECTED_WALLET_ID};
use selector_core::error::{StorageError, WalletError};
use selector_core::events::{SelectorEvent, WalletEvent};
use selector_core::traits::WalletBehaviour;
use selector_core::types::{
    Account, ContractState, ExecutionOutcome, SignAndSendTransactionParams,
    SignAndSendTransactionsParams, SignInParams, WalletMetadata, WalletType,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::module::WalletModule;
use crate::registry::WalletModules;
use crate::store::Action;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A wallet backend decorated with session bookkeeping.
pub struct Wallet {
    id: String,
    wallet_type: WalletType,
    metadata: WalletMetadata,
    behaviour: Box<dyn WalletBehaviour>,
    registry: Weak<WalletModules>,
}

impl Wallet {
    pub(crate) fn new(
        module: &WalletModule,
        behaviour: Box<dyn WalletBehaviour>,
        registry: Weak<WalletModules>,
    ) -> Self {
        Self {
            id: module.id.clone(),
            wallet_type: module.wallet_type,
            metadata: module.metadata.clone(),
            behaviour,
            registry,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn wallet_type(&self) -> WalletType {
        self.wallet_type
    }

    pub fn metadata(&self) -> &WalletMetadata {
        &self.metadata
    }

    /// Sign in through the backend, then reconcile the session with the
    /// accounts it returned and the contract that was requested.
    pub async fn sign_in(&self, params: &SignInParams) -> Result<Vec<Account>, WalletError> {
        let accounts = self.behaviour.sign_in(params).await?;

        if let Some(registry) = self.registry.upgrade() {
            registry
                .on_wallet_signed_in(&self.id, accounts.clone(), params.contract())
                .await?;
        }

        Ok(accounts)
    }

    /// Sign out through the backend. The session forgets this wallet even if
    /// the backend call fails; the backend error is still returned.
    pub async fn sign_out(&self) -> Result<(), WalletError> {
        let result = self.behaviour.sign_out().await;

        if let Some(registry) = self.registry.upgrade() {
            registry.on_wallet_signed_out(&self.id).await;
        }

        result
    }

    pub async fn get_accounts(&self) -> Result<Vec<Account>, WalletError> {
        self.behaviour.get_accounts().await
    }

    pub async fn sign_and_send_transaction(
        &self,
        params: SignAndSendTransactionParams,
    ) -> Result<Option<ExecutionOutcome>, WalletError> {
        self.behaviour.sign_and_send_transaction(params).await
    }

    pub async fn sign_and_send_transactions(
        &self,
        params: SignAndSendTransactionsParams,
    ) -> Result<Vec<ExecutionOutcome>, WalletError> {
        self.behaviour.sign_and_send_transactions(params).await
    }
}

#[async_trait]
impl WalletBehaviour for Wallet {
    async fn sign_in(&self, params: &SignInParams) -> Result<Vec<Account>, WalletError> {
        Wallet::sign_in(self, params).await
    }

    async fn sign_out(&self) -> Result<(), WalletError> {
        Wallet::sign_out(self).await
    }

    async fn get_accounts(&self) -> Result<Vec<Account>, WalletError> {
        Wallet::get_accounts(self).await
    }

    async fn sign_and_send_transaction(
        &self,
        params: SignAndSendTransactionParams,
    ) -> Result<Option<ExecutionOutcome>, WalletError> {
        Wallet::sign_and_send_transaction(self, params).await
    }

    async fn sign_and_send_transactions(
        &self,
        params: SignAndSendTransactionsParams,
    ) -> Result<Vec<ExecutionOutcome>, WalletError> {
        Wallet::sign_and_send_transactions(self, params).await
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("id", &self.id)
            .field("wallet_type", &self.wallet_type)
            .finish_non_exhaustive()
    }
}

impl WalletModules {
    /// Shared by the wrapped `sign_in` and the backend's `SignedIn` event.
    pub(crate) async fn on_wallet_signed_in(
        &self,
        wallet_id: &str,
        accounts: Vec<Account>,
        contract: ContractState,
    ) -> Result<(), StorageError> {
        if accounts.is_empty() {
            let is_browser = self
                .module(wallet_id)
                .is_some_and(|module| module.wallet_type == WalletType::Browser);

            // Only a redirect can complete a browser sign-in later; validate on next startup.
            if is_browser {
                self.package.set_item(PENDING_SELECTED_WALLET_ID, wallet_id).await?;
                self.package.set_item(PENDING_CONTRACT, &contract).await?;
                info!(wallet_id, contract_id = %contract.contract_id, "sign-in pending redirect");
            } else {
                debug!(wallet_id, "sign-in reported no accounts");
            }
            return Ok(());
        }

        // Held until the commit so overlapping sign-ins each see the wallet
        // the other one connected.
        let _connecting = self.connect_lock.lock().await;
        let selected = self.store.get_state().selected_wallet_id;
        if let Some(selected) = selected.filter(|selected| selected != wallet_id) {
            self.sign_out_wallet(&selected).await;
        }

        self.store
            .commit(Action::WalletConnected {
                wallet_id: wallet_id.to_string(),
                contract,
                accounts,
            })
            .await;
        Ok(())
    }

    pub(crate) async fn on_wallet_signed_out(&self, wallet_id: &str) {
        self.store
            .commit(Action::WalletDisconnected {
                wallet_id: wallet_id.to_string(),
            })
            .await;
    }

    /// Best-effort sign-out through the decorated wallet. Local state is
    /// cleaned up whatever the backend does.
    pub(crate) async fn sign_out_wallet(&self, wallet_id: &str) {
        match self.get_wallet(Some(wallet_id)).await {
            Ok(Some(wallet)) => {
                if let Err(e) = wallet.sign_out().await {
                    warn!(wallet_id, error = %e, "failed to sign out wallet");
                }
            }
            Ok(None) => {
                warn!(wallet_id, "cannot sign out unregistered wallet");
                self.on_wallet_signed_out(wallet_id).await;
            }
            Err(e) => {
                warn!(wallet_id, error = %e, "failed to load wallet for sign-out");
                self.on_wallet_signed_out(wallet_id).await;
            }
        }
    }

    // Boxed so the mediator spawned during wallet construction has a
    // nameable future type.
    pub(crate) fn handle_wallet_event<'a>(
        &'a self,
        wallet_id: &'a str,
        event: WalletEvent,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match event {
                WalletEvent::SignedOut => self.on_wallet_signed_out(wallet_id).await,
                WalletEvent::SignedIn {
                    contract_id,
                    method_names,
                    accounts,
                } => {
                    let contract = ContractState::new(contract_id, method_names);
                    if let Err(e) = self.on_wallet_signed_in(wallet_id, accounts, contract).await {
                        warn!(wallet_id, error = %e, "failed to record sign-in");
                    }
                }
                WalletEvent::AccountsChanged { accounts } => {
                    // No accounts left means signed out; tell the backend too.
                    if accounts.is_empty() {
                        self.sign_out_wallet(wallet_id).await;
                    } else {
                        self.store
                            .commit(Action::AccountsChanged {
                                wallet_id: wallet_id.to_string(),
                                accounts,
                            })
                            .await;
                    }
                }
                WalletEvent::NetworkChanged { network_id } => {
                    self.emitter.emit(&SelectorEvent::NetworkChanged {
                        wallet_id: wallet_id.to_string(),
                        network_id,
                    });
                }
            }
        })
    }
}

/// Apply one wallet's events in arrival order until its bus goes away or
/// the registry is dropped.
pub(crate) async fn run_mediator(
    registry: Weak<WalletModules>,
    wallet_id: String,
    mut events: mpsc::UnboundedReceiver<WalletEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(registry) = registry.upgrade() else {
            break;
        };
        registry.handle_wallet_event(&wallet_id, event).await;
    }
    debug!(wallet_id = %wallet_id, "wallet event stream closed");
}
