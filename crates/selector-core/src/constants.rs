//! Persisted key names and namespaces.
//!
//! Every key below lives under [`PACKAGE_NAME`]. Wallet backends get their
//! own child namespace `PACKAGE_NAME:<module id>` for private data.

/// Root namespace for everything the selector persists.
pub const PACKAGE_NAME: &str = "wallet-selector";

/// Separator between namespace segments and the final key.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Id of the wallet selected in the last committed session.
pub const SELECTED_WALLET_ID: &str = "selected_wallet_id";

/// Contract granted to the last committed session.
pub const CONTRACT: &str = "contract";

/// Wallet whose sign-in completes after a redirect.
pub const PENDING_SELECTED_WALLET_ID: &str = "pending_selected_wallet_id";

/// Contract requested by the redirect-pending sign-in.
pub const PENDING_CONTRACT: &str = "pending_contract";

/// Module-private key under which hardware backends cache derived accounts.
pub const HARDWARE_ACCOUNTS: &str = "accounts";
