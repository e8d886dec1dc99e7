//! # selector-core
//! Foundation types and traits for the wallet selector.

pub mod constants;
pub mod error;
pub mod events;
pub mod options;
pub mod traits;
pub mod types;
