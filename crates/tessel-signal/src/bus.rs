//! [`ChangeSignalBus`] and [`Subscription`].

use std::{
  collections::HashMap,
  fmt,
  sync::{
    Arc, Mutex, MutexGuard, PoisonError, Weak,
    atomic::{AtomicU64, Ordering},
  },
};

use tessel_core::signal::ChangeSignal;
use tokio::sync::mpsc;

// ─── Subscription id ─────────────────────────────────────────────────────────

/// Cancellation token returned by [`ChangeSignalBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "sub-{}", self.0) }
}

// ─── Bus ─────────────────────────────────────────────────────────────────────

type Senders = HashMap<SubscriptionId, mpsc::UnboundedSender<ChangeSignal>>;

struct Inner {
  next_id:     AtomicU64,
  subscribers: Mutex<Senders>,
}

impl Inner {
  fn senders(&self) -> MutexGuard<'_, Senders> {
    self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Publish/subscribe transport for [`ChangeSignal`]s.
///
/// Cloning is cheap: clones share the same subscriber set, so a clone can be
/// handed to every execution context.
#[derive(Clone)]
pub struct ChangeSignalBus {
  inner: Arc<Inner>,
}

impl Default for ChangeSignalBus {
  fn default() -> Self { Self::new() }
}

impl fmt::Debug for ChangeSignalBus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChangeSignalBus")
      .field("subscribers", &self.subscriber_count())
      .finish()
  }
}

impl ChangeSignalBus {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Inner {
        next_id:     AtomicU64::new(1),
        subscribers: Mutex::new(HashMap::new()),
      }),
    }
  }

  /// Register a new subscriber. Delivery starts with the next publish.
  pub fn subscribe(&self) -> Subscription {
    let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
    let (tx, rx) = mpsc::unbounded_channel();
    self.inner.senders().insert(id, tx);
    tracing::debug!(%id, "signal subscriber registered");
    Subscription { id, rx, bus: Arc::downgrade(&self.inner) }
  }

  /// Stop delivery to `id` and release its channel.
  ///
  /// Signals already queued stay readable until the subscription drains.
  /// Returns `false` if `id` was not subscribed.
  pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
    let removed = self.inner.senders().remove(&id).is_some();
    if removed {
      tracing::debug!(%id, "signal subscriber removed");
    }
    removed
  }

  /// Deliver `signal` to every live subscriber.
  ///
  /// Enqueueing happens under one lock, so each subscriber observes a single
  /// writer's signals in publication order. Subscribers whose receiving side
  /// has gone away are pruned. Returns the number of subscribers reached.
  pub fn publish(&self, signal: ChangeSignal) -> usize {
    let mut senders = self.inner.senders();
    let mut delivered = 0;
    senders.retain(|id, tx| match tx.send(signal.clone()) {
      Ok(()) => {
        delivered += 1;
        true
      }
      Err(_) => {
        tracing::debug!(%id, "pruning closed signal subscriber");
        false
      }
    });
    tracing::trace!(
      kind = signal.kind.as_str(),
      table = signal.table(),
      delivered,
      "signal published"
    );
    delivered
  }

  pub fn subscriber_count(&self) -> usize { self.inner.senders().len() }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// The receiving side of one bus subscription.
///
/// Dropping a subscription unsubscribes it.
pub struct Subscription {
  id:  SubscriptionId,
  rx:  mpsc::UnboundedReceiver<ChangeSignal>,
  bus: Weak<Inner>,
}

impl Subscription {
  pub fn id(&self) -> SubscriptionId { self.id }

  /// Wait for the next signal.
  ///
  /// Returns `None` once the subscription has been cancelled (or the bus
  /// dropped) and every queued signal has been read.
  pub async fn recv(&mut self) -> Option<ChangeSignal> { self.rx.recv().await }

  /// Take a queued signal without waiting.
  pub fn try_recv(&mut self) -> Option<ChangeSignal> { self.rx.try_recv().ok() }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription").field("id", &self.id).finish()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(inner) = self.bus.upgrade() {
      inner.senders().remove(&self.id);
    }
  }
}
