//! Selector Facade.
//!
//! [`WalletSelector`] is the one entry point an application holds. It wires
//! storage, the session store and the module registry together at setup and
//! otherwise only delegates.

use std::fmt;
use std::sync::Arc;

use selector_core::constants::PACKAGE_NAME;
use selector_core::error::SelectorError;
use selector_core::events::{EventBus, SelectorEvent, Subscription};
use selector_core::options::{NetworkSelection, Options};
use selector_core::traits::StorageService;
use selector_storage::{JsonStorage, MemoryStorage};

use crate::interceptor::Wallet;
use crate::module::WalletModuleFactory;
use crate::reconcile::Reconciliation;
use crate::registry::{ModuleState, WalletModules};
use crate::store::{ReadOnlyStore, SessionStore};

/// Everything needed to set up a selector.
pub struct SelectorParams {
    pub network: NetworkSelection,
    /// Wallet factories, in display order.
    pub modules: Vec<Box<dyn WalletModuleFactory>>,
    /// Durable storage. Defaults to an in-memory store.
    pub storage: Option<Arc<dyn StorageService>>,
    pub debug: bool,
}

impl SelectorParams {
    pub fn new(network: impl Into<NetworkSelection>) -> Self {
        Self {
            network: network.into(),
            modules: Vec::new(),
            storage: None,
            debug: false,
        }
    }

    pub fn with_module(mut self, factory: impl WalletModuleFactory + 'static) -> Self {
        self.modules.push(Box::new(factory));
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageService>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl fmt::Debug for SelectorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorParams")
            .field("network", &self.network)
            .field("modules", &self.modules.len())
            .field("storage", &self.storage.is_some())
            .field("debug", &self.debug)
            .finish()
    }
}

/// Public session API.
pub struct WalletSelector {
    options: Options,
    modules: Arc<WalletModules>,
    emitter: EventBus<SelectorEvent>,
    reconciliation: Reconciliation,
}

impl WalletSelector {
    /// Register modules, reconcile the persisted session and return a ready
    /// selector. Fails only on configuration or storage errors.
    pub async fn setup(params: SelectorParams) -> Result<Self, SelectorError> {
        let SelectorParams {
            network,
            modules,
            storage,
            debug,
        } = params;

        let options = Options::new(network).with_debug(debug);
        let storage: Arc<dyn StorageService> =
            storage.unwrap_or_else(|| Arc::new(MemoryStorage::new()));

        let store = SessionStore::load(JsonStorage::new(Arc::clone(&storage), PACKAGE_NAME), debug).await?;
        let emitter = EventBus::new();
        let registry = WalletModules::new(options.clone(), storage, store, emitter.clone());
        let reconciliation = registry.setup(&modules).await?;

        Ok(Self {
            options,
            modules: registry,
            emitter,
            reconciliation,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn store(&self) -> ReadOnlyStore {
        self.modules.store().read_only()
    }

    /// Registered modules in factory order.
    pub fn modules(&self) -> Vec<ModuleState> {
        self.modules.modules()
    }

    /// The wallet for `id`, or the selected wallet when `id` is `None`.
    pub async fn wallet(&self, id: Option<&str>) -> Result<Arc<Wallet>, SelectorError> {
        let wallet_id = match id {
            Some(id) => id.to_string(),
            None => self
                .modules
                .store()
                .get_state()
                .selected_wallet_id
                .ok_or(SelectorError::NoWalletSelected)?,
        };

        let wallet = self.modules.get_wallet(Some(&wallet_id)).await?;
        wallet.ok_or(SelectorError::InvalidWalletId(wallet_id))
    }

    pub fn is_signed_in(&self) -> bool {
        self.modules.store().get_state().is_signed_in()
    }

    /// Subscribe to cross-wallet events.
    pub fn on<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SelectorEvent) + Send + Sync + 'static,
    {
        self.emitter.on(listener)
    }

    pub fn off(&self, subscription: &Subscription) -> bool {
        self.emitter.off(subscription)
    }

    /// What startup reconciliation decided.
    pub fn reconciliation(&self) -> &Reconciliation {
        &self.reconciliation
    }
}

impl fmt::Debug for WalletSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSelector")
            .field("network", &self.options.network.network_id)
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selector_core::constants::{CONTRACT, SELECTED_WALLET_ID};
    use selector_core::options::NetworkId;
    use selector_core::types::ContractState;

    #[tokio::test]
    async fn empty_selector_has_no_session() {
        let selector = WalletSelector::setup(SelectorParams::new(NetworkId::Testnet))
            .await
            .unwrap();

        assert!(!selector.is_signed_in());
        assert!(selector.modules().is_empty());
        assert_eq!(selector.options().network.network_id, "testnet");
        assert_eq!(selector.reconciliation(), &Reconciliation::default());
    }

    #[tokio::test]
    async fn wallet_without_selection_is_rejected() {
        let selector = WalletSelector::setup(SelectorParams::new(NetworkId::Testnet))
            .await
            .unwrap();

        let err = selector.wallet(None).await.unwrap_err();
        assert_eq!(err, SelectorError::NoWalletSelected);
    }

    #[tokio::test]
    async fn unknown_wallet_id_is_rejected() {
        let selector = WalletSelector::setup(SelectorParams::new(NetworkId::Mainnet))
            .await
            .unwrap();

        let err = selector.wallet(Some("sender")).await.unwrap_err();
        assert_eq!(err, SelectorError::InvalidWalletId("sender".into()));
    }

    #[tokio::test]
    async fn stale_session_for_missing_module_is_cleared() {
        let storage = Arc::new(MemoryStorage::new());
        let json = JsonStorage::new(storage.clone(), PACKAGE_NAME);
        json.set_item(SELECTED_WALLET_ID, "ledger").await.unwrap();
        json.set_item(CONTRACT, &ContractState::new("app.testnet", Vec::new()))
            .await
            .unwrap();

        let selector = WalletSelector::setup(SelectorParams::new(NetworkId::Testnet).with_storage(storage.clone()))
            .await
            .unwrap();

        assert!(!selector.is_signed_in());
        let previous = selector.reconciliation().previous.as_ref().unwrap();
        assert_eq!(previous.validation, crate::Validation::NotRegistered);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn on_and_off_manage_listeners() {
        let selector = WalletSelector::setup(SelectorParams::new(NetworkId::Testnet))
            .await
            .unwrap();

        let sub = selector.on(|_| {});
        assert!(selector.off(&sub));
        assert!(!selector.off(&sub));
    }
}
