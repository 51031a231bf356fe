// Whisper bus implementation
use crate::message::{Recipient, WhisperMessage};
use crate::registry::AddressRegistry;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Whisper handler trait
pub trait WhisperHandler: Send + Sync {
    fn on_whisper(&self, msg: &WhisperMessage) -> Result<()>;
}

impl<F> WhisperHandler for F
where
    F: Fn(&WhisperMessage) -> Result<()> + Send + Sync,
{
    fn on_whisper(&self, msg: &WhisperMessage) -> Result<()> {
        self(msg)
    }
}

/// Identifies one subscription; pass it back to [`WhisperBus::unsubscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    address: Recipient,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn address(&self) -> &Recipient {
        &self.address
    }
}

struct Subscription {
    id: u64,
    address: Recipient,
    handler: Arc<dyn WhisperHandler>,
}

impl Subscription {
    fn matches(&self, msg: &WhisperMessage) -> bool {
        match &self.address {
            Recipient::Broadcast => true,
            Recipient::Agent(name) => msg.is_addressed_to(name),
        }
    }
}

/// Outcome of a single publish. Faults are counted, never returned as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub faulted: usize,
}

/// Whisper bus statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusStats {
    pub total_published: u64,
    pub total_delivered: u64,
    pub total_faulted: u64,
    pub active_subscriptions: usize,
}

/// Addressed publish/subscribe core.
///
/// Dispatch is synchronous on the publishing thread. Each publish works on a
/// snapshot of the subscriber list taken before the first handler runs, so
/// handlers may subscribe, unsubscribe or publish again without affecting the
/// dispatch in progress.
pub struct WhisperBus {
    // Insertion order is dispatch order
    subscriptions: Mutex<Vec<Arc<Subscription>>>,
    registry: AddressRegistry,
    next_id: AtomicU64,

    published: AtomicU64,
    delivered: AtomicU64,
    faulted: AtomicU64,
}

impl WhisperBus {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            registry: AddressRegistry::new(),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            faulted: AtomicU64::new(0),
        }
    }

    /// Register `handler` for every future whisper to `address` or to `*`.
    /// Subscribing under [`Recipient::Broadcast`] observes all traffic.
    pub fn subscribe(
        &self,
        address: Recipient,
        handler: Arc<dyn WhisperHandler>,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.register(&address);
        self.lock().push(Arc::new(Subscription {
            id,
            address: address.clone(),
            handler,
        }));

        info!(target: "whisper_bus", subscription = id, address = %address, "Subscribed");
        SubscriptionHandle { id, address }
    }

    /// Remove exactly the subscription behind `handle`. Unknown or already
    /// removed handles are ignored. Returns whether anything was removed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let removed = {
            let mut subs = self.lock();
            let before = subs.len();
            subs.retain(|s| s.id != handle.id);
            subs.len() != before
        };

        if removed {
            self.registry.release(&handle.address);
            info!(target: "whisper_bus", subscription = handle.id, address = %handle.address, "Unsubscribed");
        } else {
            debug!(target: "whisper_bus", subscription = handle.id, "Unsubscribe of unknown subscription ignored");
        }
        removed
    }

    /// Deliver `msg` to every matching subscriber live when the call starts.
    pub fn publish(&self, msg: &WhisperMessage) -> DispatchReport {
        debug!(target: "whisper_bus", origin = ?msg.origin(), "{}", msg);
        self.published.fetch_add(1, Ordering::Relaxed);

        let snapshot: Vec<Arc<Subscription>> = self
            .lock()
            .iter()
            .filter(|s| s.matches(msg))
            .cloned()
            .collect();

        let mut report = DispatchReport::default();
        for sub in snapshot {
            match catch_unwind(AssertUnwindSafe(|| sub.handler.on_whisper(msg))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.faulted += 1;
                    warn!(
                        target: "whisper_bus",
                        agent = %sub.address,
                        subscription = sub.id,
                        from = %msg.from(),
                        error = %e,
                        "Handler failed"
                    );
                }
                Err(panic) => {
                    report.faulted += 1;
                    error!(
                        target: "whisper_bus",
                        agent = %sub.address,
                        subscription = sub.id,
                        from = %msg.from(),
                        panic = %panic_message(panic.as_ref()),
                        "Handler panicked"
                    );
                }
            }
        }

        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.faulted
            .fetch_add(report.faulted as u64, Ordering::Relaxed);

        if report.delivered + report.faulted == 0 {
            debug!(target: "whisper_bus", to = %msg.to(), "No subscribers for whisper");
        }
        report
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Get stats
    pub fn stats(&self) -> BusStats {
        BusStats {
            total_published: self.published.load(Ordering::Relaxed),
            total_delivered: self.delivered.load(Ordering::Relaxed),
            total_faulted: self.faulted.load(Ordering::Relaxed),
            active_subscriptions: self.subscriber_count(),
        }
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.lock().clear();
        self.registry.clear();
        info!(target: "whisper_bus", "Whisper bus cleared");
    }

    // Handlers never run under this lock, so a poisoned guard still holds a
    // consistent list.
    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Subscription>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for WhisperBus {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
