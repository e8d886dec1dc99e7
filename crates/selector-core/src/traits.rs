//! Trait interfaces for the wallet selector.
//!
//! These traits define the contracts between the selector and the outside:
//! - [`StorageService`]: durable string key-value store (selector-storage implements)
//! - [`WalletBehaviour`]: capability set of a wallet backend (backends implement,
//!   the engine's decorated `Wallet` re-implements it)

use async_trait::async_trait;

use crate::error::{StorageError, WalletError};
use crate::types::{
    Account, ExecutionOutcome, SignAndSendTransactionParams, SignAndSendTransactionsParams,
    SignInParams,
};

/// Opaque durable key-value backend.
///
/// Failures are surfaced to the caller; this layer never swallows them.
#[async_trait]
pub trait StorageService: Send + Sync + 'static {
    /// Raw value under `key`, or `None` if absent.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Removing an absent key succeeds.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// The fixed behavioural contract every wallet backend fulfils.
#[async_trait]
pub trait WalletBehaviour: Send + Sync {
    /// Sign in and return the linked accounts.
    ///
    /// Redirect-style backends may return an empty list: the accounts only
    /// become visible after the page comes back.
    async fn sign_in(&self, params: &SignInParams) -> Result<Vec<Account>, WalletError>;

    async fn sign_out(&self) -> Result<(), WalletError>;

    /// Accounts the backend currently considers signed in.
    async fn get_accounts(&self) -> Result<Vec<Account>, WalletError>;

    /// Sign and submit one transaction. Browser wallets return `None`
    /// because the outcome arrives through the redirect.
    async fn sign_and_send_transaction(
        &self,
        params: SignAndSendTransactionParams,
    ) -> Result<Option<ExecutionOutcome>, WalletError>;

    async fn sign_and_send_transactions(
        &self,
        params: SignAndSendTransactionsParams,
    ) -> Result<Vec<ExecutionOutcome>, WalletError>;
}
