//! Session Reconciliation.
//!
//! Runs once during setup, before `SETUP` is committed. Persisted state is
//! never trusted on its own: the wallet it names is asked for its accounts
//! first. A pending redirect sign-in takes priority over the previously
//! selected session and is consumed exactly once.

use std::fmt;

use selector_core::constants::{PENDING_CONTRACT, PENDING_SELECTED_WALLET_ID};
use selector_core::error::StorageError;
use selector_core::types::{Account, ContractState};
use tracing::{debug, info, warn};

use crate::registry::WalletModules;

/// Outcome of asking a wallet whether it is still signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The backend reported at least one account.
    SignedIn(Vec<Account>),
    /// The backend answered with zero accounts.
    SignedOut,
    /// The wallet could not be constructed or the accounts query failed.
    Unreachable(String),
    /// No module with this id is registered.
    NotRegistered,
}

impl Validation {
    pub fn accounts(&self) -> &[Account] {
        match self {
            Validation::SignedIn(accounts) => accounts,
            _ => &[],
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, Validation::SignedIn(_))
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::SignedIn(accounts) => write!(f, "signed in ({} accounts)", accounts.len()),
            Validation::SignedOut => write!(f, "signed out"),
            Validation::Unreachable(reason) => write!(f, "unreachable: {reason}"),
            Validation::NotRegistered => write!(f, "not registered"),
        }
    }
}

/// A wallet id together with what validating it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletCheck {
    pub wallet_id: String,
    pub validation: Validation,
}

/// Session the store is populated with at setup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSeed {
    pub accounts: Vec<Account>,
    pub contract: Option<ContractState>,
    pub selected_wallet_id: Option<String>,
}

impl SessionSeed {
    fn signed_in(wallet_id: &str, accounts: Vec<Account>, contract: ContractState) -> Self {
        Self {
            accounts,
            contract: Some(contract),
            selected_wallet_id: Some(wallet_id.to_string()),
        }
    }
}

/// What reconciliation found and decided.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub seed: SessionSeed,
    /// The pending redirect sign-in, if a marker was stored.
    pub pending: Option<WalletCheck>,
    /// The previously selected wallet, if it was consulted.
    pub previous: Option<WalletCheck>,
}

impl Reconciliation {
    /// Whether the pending sign-in became the session.
    pub fn adopted_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|check| check.validation.is_signed_in())
    }
}

impl WalletModules {
    /// Ask the wallet for its accounts. Never fails; failures become
    /// [`Validation::Unreachable`].
    pub(crate) async fn validate_wallet(&self, wallet_id: &str) -> Validation {
        let wallet = match self.get_wallet(Some(wallet_id)).await {
            Ok(Some(wallet)) => wallet,
            Ok(None) => return Validation::NotRegistered,
            Err(e) => {
                warn!(wallet_id, error = %e, "failed to load wallet for validation");
                return Validation::Unreachable(e.to_string());
            }
        };

        match wallet.get_accounts().await {
            Ok(accounts) if accounts.is_empty() => Validation::SignedOut,
            Ok(accounts) => Validation::SignedIn(accounts),
            Err(e) => {
                warn!(wallet_id, error = %e, "failed to query accounts");
                Validation::Unreachable(e.to_string())
            }
        }
    }

    /// Derive the startup session from persisted markers and live wallets.
    pub(crate) async fn resolve_storage_state(&self) -> Result<Reconciliation, StorageError> {
        let mut report = Reconciliation::default();
        let previous = self.store.previous_session().clone();

        let pending_wallet_id: Option<String> = self.package.get_item(PENDING_SELECTED_WALLET_ID).await?;
        let pending_contract: Option<ContractState> = self.package.get_item(PENDING_CONTRACT).await?;
        let has_marker = pending_wallet_id.is_some() || pending_contract.is_some();

        match (pending_wallet_id, pending_contract) {
            (Some(wallet_id), Some(contract)) => {
                let validation = self.validate_wallet(&wallet_id).await;
                self.clear_pending().await?;

                if let Validation::SignedIn(accounts) = &validation {
                    if let Some(selected) = previous
                        .selected_wallet_id
                        .as_deref()
                        .filter(|selected| *selected != wallet_id)
                    {
                        self.sign_out_wallet(selected).await;
                    }

                    info!(wallet_id = %wallet_id, accounts = accounts.len(), "pending sign-in completed");
                    report.seed = SessionSeed::signed_in(&wallet_id, accounts.clone(), contract);
                    report.pending = Some(WalletCheck { wallet_id, validation });
                    return Ok(report);
                }

                info!(wallet_id = %wallet_id, outcome = %validation, "pending sign-in did not complete");
                report.pending = Some(WalletCheck { wallet_id, validation });
            }
            _ if has_marker => {
                warn!("discarding incomplete pending sign-in marker");
                self.clear_pending().await?;
            }
            _ => {}
        }

        let Some(wallet_id) = previous.selected_wallet_id else {
            debug!("no previous session");
            return Ok(report);
        };

        let validation = self.validate_wallet(&wallet_id).await;
        match (&validation, previous.contract) {
            (Validation::SignedIn(accounts), Some(contract)) => {
                debug!(wallet_id = %wallet_id, accounts = accounts.len(), "previous session still valid");
                report.seed = SessionSeed::signed_in(&wallet_id, accounts.clone(), contract);
            }
            (Validation::SignedIn(_), None) => {
                warn!(wallet_id = %wallet_id, "previous session has no contract, resetting");
            }
            (outcome, _) => {
                info!(wallet_id = %wallet_id, outcome = %outcome, "previous session no longer valid, resetting");
            }
        }
        report.previous = Some(WalletCheck { wallet_id, validation });

        Ok(report)
    }

    async fn clear_pending(&self) -> Result<(), StorageError> {
        self.package.remove_item(PENDING_SELECTED_WALLET_ID).await?;
        self.package.remove_item(PENDING_CONTRACT).await
    }
}
