//! Typed publish/subscribe.
//!
//! An [`EventBus`] is a cheap, cloneable handle; clones share one listener
//! list. Each wallet instance gets its own bus of [`WalletEvent`]s and the
//! selector owns one bus of [`SelectorEvent`]s for external consumers.
//!
//! Listeners run synchronously inside [`EventBus::emit`], outside the
//! listener lock, so a listener may subscribe or unsubscribe re-entrantly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::types::Account;

/// Events a wallet backend reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    SignedIn {
        contract_id: String,
        method_names: Vec<String>,
        accounts: Vec<Account>,
    },
    SignedOut,
    AccountsChanged { accounts: Vec<Account> },
    NetworkChanged { network_id: String },
}

/// Cross-wallet events re-emitted by the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorEvent {
    NetworkChanged { wallet_id: String, network_id: String },
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Listeners<E> {
    entries: Mutex<Vec<(u64, Listener<E>)>>,
    next_id: AtomicU64,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
}

impl<E: 'static> Detach for Listeners<E> {
    fn detach(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }
}

/// Handle returned by [`EventBus::on`].
///
/// Dropping it does not unsubscribe; call [`Subscription::remove`] or
/// [`EventBus::off`].
pub struct Subscription {
    id: u64,
    bus: Weak<dyn Detach>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Detach the listener. Returns `false` if it was already removed or the
    /// bus is gone.
    pub fn remove(&self) -> bool {
        self.bus.upgrade().is_some_and(|bus| bus.detach(self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Generic typed event bus.
pub struct EventBus<E> {
    listeners: Arc<Listeners<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<E: 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Listeners {
                entries: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener.
    pub fn on<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.entries.lock().push((id, Arc::new(listener)));
        let weak: Weak<Listeners<E>> = Arc::downgrade(&self.listeners);
        Subscription { id, bus: weak }
    }

    /// Remove a listener registered on this bus.
    pub fn off(&self, subscription: &Subscription) -> bool {
        self.listeners.detach(subscription.id)
    }

    /// Deliver `event` to every listener registered at the time of the call.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .entries
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.entries.lock().len()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.entries.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &u32| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn emit_reaches_every_listener() {
        let bus = EventBus::<u32>::new();
        let (a, listen_a) = counter();
        let (b, listen_b) = counter();
        bus.on(listen_a);
        bus.on(listen_b);

        bus.emit(&7);

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_stops_delivery() {
        let bus = EventBus::<u32>::new();
        let (count, listen) = counter();
        let sub = bus.on(listen);

        assert!(bus.off(&sub));
        bus.emit(&1);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!bus.off(&sub), "second off is a no-op");
    }

    #[test]
    fn subscription_remove_detaches() {
        let bus = EventBus::<u32>::new();
        let (count, listen) = counter();
        let sub = bus.on(listen);

        assert!(sub.remove());
        bus.emit(&1);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn clones_share_listeners() {
        let bus = EventBus::<u32>::new();
        let other = bus.clone();
        let (count, listen) = counter();
        bus.on(listen);

        other.emit(&3);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_after_bus_dropped_is_false() {
        let bus = EventBus::<u32>::new();
        let sub = bus.on(|_| {});
        drop(bus);
        assert!(!sub.remove());
    }

    #[test]
    fn listener_may_unsubscribe_itself_while_emitting() {
        let bus = EventBus::<u32>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_in = Arc::clone(&slot);
        let sub = bus.on(move |_| {
            if let Some(sub) = slot_in.lock().take() {
                sub.remove();
            }
        });
        *slot.lock() = Some(sub);

        bus.emit(&1);
        bus.emit(&2);

        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn events_carry_payloads() {
        let bus = EventBus::<WalletEvent>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = Arc::clone(&seen);
        bus.on(move |event: &WalletEvent| seen_in.lock().push(event.clone()));

        bus.emit(&WalletEvent::NetworkChanged {
            network_id: "testnet".into(),
        });
        bus.emit(&WalletEvent::SignedOut);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], WalletEvent::SignedOut);
    }
}
