use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// An event that can be routed to handlers by kind.
pub trait RoutedEvent: Send + Sync + 'static {
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Returned by a handler whose consumer has gone away; the handler is then removed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("event subscriber dropped its receiver")]
pub struct SubscriberGone;

pub type HandlerId = u64;

type Handler<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Fans decoded events out to per-kind handler lists.
///
/// Handlers run on the caller's task, in registration order. A handler that
/// errors or panics is logged and skipped; later handlers still run.
pub struct EventRouter<E: RoutedEvent> {
    handlers: RwLock<HashMap<E::Kind, Vec<(HandlerId, Handler<E>)>>>,
    next_id: AtomicU64,
}

impl<E: RoutedEvent> Default for EventRouter<E> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E: RoutedEvent> EventRouter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> HandlerId
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        debug!(?kind, handler = id, "event handler registered");
        id
    }

    /// Deliver events of `kind` into a bounded channel.
    ///
    /// A full channel drops the event with a warning; a dropped receiver
    /// unregisters the handler on the next delivery.
    pub fn channel(&self, kind: E::Kind, capacity: usize) -> (HandlerId, mpsc::Receiver<E>)
    where
        E: Clone,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.subscribe(kind, move |event: &E| match tx.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(anyhow::anyhow!("subscriber channel full, event dropped"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SubscriberGone.into()),
        });
        (id, rx)
    }

    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let mut removed = false;
        for list in handlers.values_mut() {
            let before = list.len();
            list.retain(|(handler_id, _)| *handler_id != id);
            removed |= list.len() != before;
        }
        handlers.retain(|_, list| !list.is_empty());
        if removed {
            debug!(handler = id, "event handler removed");
        }
        removed
    }

    pub fn handler_count(&self, kind: E::Kind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every handler registered for the event's kind.
    ///
    /// Returns how many handlers accepted the event.
    pub fn dispatch(&self, event: &E) -> usize {
        let kind = event.kind();
        let snapshot: Vec<(HandlerId, Handler<E>)> = match self.handlers.read().get(&kind) {
            Some(list) => list.clone(),
            None => {
                trace!(?kind, "no handlers for event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) if e.is::<SubscriberGone>() => gone.push(id),
                Ok(Err(e)) => warn!(?kind, handler = id, error = %e, "event handler failed"),
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    warn!(?kind, handler = id, panic = %message, "event handler panicked");
                }
            }
        }

        for id in gone {
            self.unsubscribe(id);
        }
        delivered
    }
}
