//! # selector-engine: module registry and session reconciliation.
//!
//! Composes the selector out of:
//! - [`store::SessionStore`]: the only writer of session state
//! - [`registry::WalletModules`]: factories to modules, lazy memoized wallets
//! - [`reconcile`]: startup resolution of persisted vs. live session
//! - [`interceptor::Wallet`]: decorated wallet funnelling actions into transitions
//! - [`selector::WalletSelector`]: public entry point

pub mod interceptor;
pub mod module;
pub mod reconcile;
pub mod registry;
pub mod selector;
pub mod store;

pub use interceptor::Wallet;
pub use module::{WalletBehaviourFactory, WalletContext, WalletModule, WalletModuleFactory};
pub use reconcile::{Reconciliation, SessionSeed, Validation, WalletCheck};
pub use registry::{ModuleState, WalletModules};
pub use selector::{SelectorParams, WalletSelector};
pub use store::{Action, ReadOnlyStore, SessionState, SessionStore};
