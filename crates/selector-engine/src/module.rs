//! Wallet module descriptors and the factory contracts backends implement.
//!
//! A [`WalletModuleFactory`] decides at setup whether its backend is usable
//! on this platform and, if so, yields a cheap [`WalletModule`] descriptor.
//! The descriptor's [`WalletBehaviourFactory`] is only run on first access
//! to the wallet, with a [`WalletContext`] prepared by the registry.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use selector_core::error::WalletError;
use selector_core::events::{EventBus, WalletEvent};
use selector_core::options::Options;
use selector_core::traits::WalletBehaviour;
use selector_core::types::{WalletMetadata, WalletType};
use selector_storage::JsonStorage;
use tracing::Span;

use crate::store::ReadOnlyStore;

/// Everything a backend receives when its wallet is constructed.
#[derive(Clone, Debug)]
pub struct WalletContext {
    pub id: String,
    pub wallet_type: WalletType,
    pub metadata: WalletMetadata,
    pub options: Options,
    pub store: ReadOnlyStore,
    /// The wallet's own event bus; the selector listens on it.
    pub emitter: EventBus<WalletEvent>,
    /// Storage namespaced under this module's id.
    pub storage: JsonStorage,
    /// Span tagged with the module id.
    pub span: Span,
}

/// Builds the behaviour object of one wallet backend.
#[async_trait]
pub trait WalletBehaviourFactory: Send + Sync {
    async fn init(&self, context: WalletContext) -> Result<Box<dyn WalletBehaviour>, WalletError>;
}

/// Descriptor returned by an available factory.
#[derive(Clone)]
pub struct WalletModule {
    pub id: String,
    pub wallet_type: WalletType,
    pub metadata: WalletMetadata,
    pub init: Arc<dyn WalletBehaviourFactory>,
}

impl WalletModule {
    pub fn new(
        id: impl Into<String>,
        wallet_type: WalletType,
        metadata: WalletMetadata,
        init: Arc<dyn WalletBehaviourFactory>,
    ) -> Self {
        Self {
            id: id.into(),
            wallet_type,
            metadata,
            init,
        }
    }
}

impl fmt::Debug for WalletModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletModule")
            .field("id", &self.id)
            .field("wallet_type", &self.wallet_type)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Entry point of a wallet backend.
#[async_trait]
pub trait WalletModuleFactory: Send + Sync {
    /// `Ok(None)` means the backend is unavailable here (not an error).
    async fn create(&self, options: &Options) -> Result<Option<WalletModule>, WalletError>;
}
