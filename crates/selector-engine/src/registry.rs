//! Module Registry.
//!
//! [`WalletModules`] turns the ordered factory list into module descriptors
//! ([`ModuleState`]) and owns the wallet-instance cache. Factories that
//! report unavailability or fail are skipped; a duplicate module id aborts
//! setup. Wallet construction is deferred to first access and runs exactly
//! once per module, even when several callers ask concurrently.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use selector_core::constants::PACKAGE_NAME;
use selector_core::error::SelectorError;
use selector_core::events::{EventBus, SelectorEvent, WalletEvent};
use selector_core::options::Options;
use selector_core::traits::StorageService;
use selector_core::types::{WalletMetadata, WalletType};
use selector_storage::JsonStorage;
use tokio::sync::{Mutex, OnceCell, mpsc};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::interceptor::{Wallet, run_mediator};
use crate::module::{WalletContext, WalletModule, WalletModuleFactory};
use crate::reconcile::Reconciliation;
use crate::store::{Action, SessionStore};

struct ModuleSlot {
    module: WalletModule,
    instance: OnceCell<Arc<Wallet>>,
    registry: Weak<WalletModules>,
}

/// A registered wallet module. Identity is the `id`.
///
/// Session state carries these descriptors, so the instance slot is only
/// borrowed weakly; the registry owns it.
#[derive(Clone)]
pub struct ModuleState {
    pub id: String,
    pub wallet_type: WalletType,
    pub metadata: WalletMetadata,
    slot: Weak<ModuleSlot>,
}

impl ModuleState {
    fn new(slot: &Arc<ModuleSlot>) -> Self {
        Self {
            id: slot.module.id.clone(),
            wallet_type: slot.module.wallet_type,
            metadata: slot.module.metadata.clone(),
            slot: Arc::downgrade(slot),
        }
    }

    /// The decorated wallet, constructed on first call and cached after.
    ///
    /// Concurrent first calls wait on the same construction. A failed
    /// construction is not cached; the next call tries again.
    pub async fn wallet(&self) -> Result<Arc<Wallet>, SelectorError> {
        let slot = self.slot.upgrade().ok_or(SelectorError::Closed)?;
        let registry = slot.registry.upgrade().ok_or(SelectorError::Closed)?;
        let wallet = slot
            .instance
            .get_or_try_init(|| registry.setup_instance(&slot.module))
            .await?;
        Ok(Arc::clone(wallet))
    }

    /// Whether the wallet has already been constructed.
    pub fn is_initialized(&self) -> bool {
        self.slot.upgrade().is_some_and(|slot| slot.instance.initialized())
    }
}

impl PartialEq for ModuleState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModuleState {}

impl fmt::Debug for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleState")
            .field("id", &self.id)
            .field("wallet_type", &self.wallet_type)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Registry of available wallet modules.
pub struct WalletModules {
    options: Options,
    pub(crate) package: JsonStorage,
    pub(crate) store: SessionStore,
    pub(crate) emitter: EventBus<SelectorEvent>,
    slots: RwLock<Vec<Arc<ModuleSlot>>>,
    // Serializes "sign out the previous wallet, then connect".
    pub(crate) connect_lock: Mutex<()>,
    this: Weak<WalletModules>,
}

impl WalletModules {
    pub fn new(
        options: Options,
        storage: Arc<dyn StorageService>,
        store: SessionStore,
        emitter: EventBus<SelectorEvent>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            options,
            package: JsonStorage::new(storage, PACKAGE_NAME),
            store,
            emitter,
            slots: RwLock::new(Vec::new()),
            connect_lock: Mutex::new(()),
            this: this.clone(),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run every factory in order and keep the available modules.
    pub async fn register(
        &self,
        factories: &[Box<dyn WalletModuleFactory>],
    ) -> Result<Vec<ModuleState>, SelectorError> {
        let mut slots: Vec<Arc<ModuleSlot>> = Vec::with_capacity(factories.len());

        for (index, factory) in factories.iter().enumerate() {
            let module = match factory.create(&self.options).await {
                Ok(Some(module)) => module,
                Ok(None) => {
                    debug!(index, "wallet module unavailable on this platform");
                    continue;
                }
                Err(e) => {
                    warn!(index, error = %e, "failed to set up wallet module");
                    continue;
                }
            };

            if slots.iter().any(|existing| existing.module.id == module.id) {
                return Err(SelectorError::DuplicateModuleId(module.id));
            }

            debug!(wallet_id = %module.id, wallet_type = %module.wallet_type, "wallet module registered");
            slots.push(Arc::new(ModuleSlot {
                module,
                instance: OnceCell::new(),
                registry: self.this.clone(),
            }));
        }

        let modules = slots.iter().map(ModuleState::new).collect();
        *self.slots.write() = slots;
        Ok(modules)
    }

    /// Register modules, reconcile the persisted session and commit `SETUP`.
    pub async fn setup(
        &self,
        factories: &[Box<dyn WalletModuleFactory>],
    ) -> Result<Reconciliation, SelectorError> {
        let modules = self.register(factories).await?;
        info!(
            available = modules.len(),
            skipped = factories.len() - modules.len(),
            "wallet modules registered"
        );

        let reconciliation = self.resolve_storage_state().await?;
        let seed = reconciliation.seed.clone();
        self.store
            .commit(Action::Setup {
                modules,
                accounts: seed.accounts,
                contract: seed.contract,
                selected_wallet_id: seed.selected_wallet_id,
            })
            .await;

        Ok(reconciliation)
    }

    /// Registered modules in factory order.
    pub fn modules(&self) -> Vec<ModuleState> {
        self.slots.read().iter().map(ModuleState::new).collect()
    }

    pub fn module(&self, id: &str) -> Option<ModuleState> {
        self.slots
            .read()
            .iter()
            .find(|slot| slot.module.id == id)
            .map(ModuleState::new)
    }

    /// Wallet for `id`, or `None` if no such module is registered.
    pub async fn get_wallet(&self, id: Option<&str>) -> Result<Option<Arc<Wallet>>, SelectorError> {
        let Some(module) = id.and_then(|id| self.module(id)) else {
            return Ok(None);
        };
        module.wallet().await.map(Some)
    }

    async fn setup_instance(&self, module: &WalletModule) -> Result<Arc<Wallet>, SelectorError> {
        let span = info_span!("wallet", id = %module.id);

        // Backend events are queued here and applied in order by the mediator.
        let emitter = EventBus::<WalletEvent>::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        emitter.on(move |event: &WalletEvent| {
            let _ = events_tx.send(event.clone());
        });

        let context = WalletContext {
            id: module.id.clone(),
            wallet_type: module.wallet_type,
            metadata: module.metadata.clone(),
            options: self.options.clone(),
            store: self.store.read_only(),
            emitter,
            storage: self.package.scoped(module.id.as_str()),
            span: span.clone(),
        };

        let behaviour = module.init.init(context).instrument(span.clone()).await?;
        debug!(parent: &span, "wallet instance constructed");

        tokio::spawn(run_mediator(self.this.clone(), module.id.clone(), events_rx).instrument(span));

        Ok(Arc::new(Wallet::new(module, behaviour, self.this.clone())))
    }
}

impl fmt::Debug for WalletModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletModules")
            .field("modules", &self.modules())
            .field("store", &self.store)
            .finish()
    }
}
