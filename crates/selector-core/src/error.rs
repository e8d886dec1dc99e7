//! Error types for the wallet selector.
use thiserror::Error;

/// Failures of the durable key-value layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend: {0}")] Backend(String),
    #[error("serialization of '{key}': {reason}")] Serialization { key: String, reason: String },
}

/// Errors raised by wallet backends and wallet module factories.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The operation needs a signed-in account.
    #[error("wallet not signed in")]
    NotSignedIn,

    /// Hardware sign-in was called without derivation paths.
    #[error("invalid derivation paths")]
    InvalidDerivationPaths,

    /// Two derivation paths resolved to the same account.
    #[error("duplicate account id: {0}")]
    DuplicateAccount(String),

    /// The backend cannot run on this platform.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The user or the backend refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Any other backend failure (device I/O, extension call, bridge relay).
    #[error("backend: {0}")]
    Backend(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors surfaced by the selector engine and its facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// Two available modules share an id. Fatal at setup.
    #[error("duplicate module id detected: {0}")]
    DuplicateModuleId(String),

    /// An explicit wallet id did not resolve to a registered module.
    #[error("invalid wallet id: {0}")]
    InvalidWalletId(String),

    /// No id was given and no wallet is selected.
    #[error("no wallet selected")]
    NoWalletSelected,

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    /// The selector that owned this module has been dropped.
    #[error("wallet selector closed")]
    Closed,

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
