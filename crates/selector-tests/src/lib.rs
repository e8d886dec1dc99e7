//! Integration test suite for the wallet selector.
//!
//! The tests drive a real [`selector_engine::WalletSelector`] with scriptable
//! wallet backends from [`helpers`] and check the session invariants across
//! setup, reconciliation, decorated calls and backend-emitted events.
pub mod helpers;
