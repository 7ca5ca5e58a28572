//! Change notification for log files.
//!
//! Observers are stored in a registry table and addressed by [`ListenerId`]
//! handles, so removing one can never leave a dangling callback behind.
//! Appends are coalesced per observer: a callback fires once `max_batch`
//! lines have accumulated or `max_wait` has passed since the last callback,
//! whichever comes first. A trailing partial batch is delivered by the next
//! append that finds its wait time expired, or by [`ListenerRegistry::flush`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::trace;

use crate::index::Section;

/// What changed in a log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
    /// New lines were appended.
    Appended(Section),
    /// Everything previously reported is gone; indices restart at zero.
    Reset,
}

/// Observer of a log file.
pub trait LogFileListener: Send + Sync {
    fn on_modified(&self, modification: Modification);

    /// Called after the registry delivered every pending partial batch, e.g.
    /// when the file being observed reached its end.
    fn on_flush(&self) {}
}

impl<F> LogFileListener for F
where
    F: Fn(Modification) + Send + Sync,
{
    fn on_modified(&self, modification: Modification) {
        self(modification)
    }
}

/// Handle returned by [`ListenerRegistry::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    listener: Arc<dyn LogFileListener>,
    max_wait: Duration,
    max_batch: usize,
    /// Lines reported to this listener so far.
    reported: usize,
    last_notified: Instant,
}

impl Registration {
    /// Sections owed to this listener; `force` also drains a partial batch.
    fn drain(&mut self, total: usize, now: Instant, force: bool) -> Vec<Modification> {
        let mut out = Vec::new();
        while total - self.reported >= self.max_batch {
            out.push(Modification::Appended(Section::new(
                self.reported,
                self.max_batch,
            )));
            self.reported += self.max_batch;
        }

        let pending = total - self.reported;
        let expired = now.duration_since(self.last_notified) >= self.max_wait;
        if pending > 0 && (force || expired) {
            out.push(Modification::Appended(Section::new(self.reported, pending)));
            self.reported = total;
        }

        if !out.is_empty() {
            self.last_notified = now;
        }
        out
    }
}

#[derive(Default)]
struct Inner {
    registrations: Vec<Registration>,
    next_id: u64,
    total: usize,
}

type Delivery = Vec<(Arc<dyn LogFileListener>, Vec<Modification>)>;

/// Registry of observers of one log file.
///
/// Callbacks run outside the table lock, in registration order. A separate
/// re-entrant delivery lock keeps deliveries of consecutive notifications
/// from overtaking each other while still letting a callback add or remove
/// listeners on the same registry.
pub struct ListenerRegistry {
    inner: Mutex<Inner>,
    delivery: ReentrantMutex<()>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            delivery: ReentrantMutex::new(()),
        }
    }

    /// Register an observer. Lines already appended are reported right away.
    pub fn add_listener(
        &self,
        listener: Arc<dyn LogFileListener>,
        max_wait: Duration,
        max_batch: usize,
    ) -> ListenerId {
        let _delivery = self.delivery.lock();
        let (id, pending) = {
            let mut inner = self.inner.lock();
            let id = ListenerId(inner.next_id);
            inner.next_id += 1;

            let mut registration = Registration {
                id,
                listener: Arc::clone(&listener),
                max_wait,
                max_batch: max_batch.max(1),
                reported: 0,
                last_notified: Instant::now(),
            };
            let pending = registration.drain(inner.total, Instant::now(), true);
            inner.registrations.push(registration);
            (id, pending)
        };
        trace!(?id, ?max_wait, max_batch, "listener added");

        for modification in pending {
            listener.on_modified(modification);
        }
        id
    }

    /// Unregister an observer. Unknown ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.registrations.len();
        inner.registrations.retain(|r| r.id != id);
        let removed = inner.registrations.len() != before;
        if removed {
            trace!(?id, "listener removed");
        }
        removed
    }

    /// Drop every registration, e.g. when the owning source is disposed.
    pub fn clear(&self) {
        self.inner.lock().registrations.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of lines announced so far.
    pub fn total(&self) -> usize {
        self.inner.lock().total
    }

    /// Announce `new_lines` freshly appended lines.
    pub fn notify_appended(&self, new_lines: usize) {
        let _delivery = self.delivery.lock();
        let delivery = {
            let mut inner = self.inner.lock();
            inner.total += new_lines;
            Self::collect(&mut inner, false)
        };
        Self::deliver(delivery);
    }

    /// Deliver every pending partial batch regardless of wait times, then
    /// pass the flush on to every observer.
    pub fn flush(&self) {
        let _delivery = self.delivery.lock();
        let (delivery, listeners) = {
            let mut inner = self.inner.lock();
            let listeners: Vec<_> = inner
                .registrations
                .iter()
                .map(|r| Arc::clone(&r.listener))
                .collect();
            (Self::collect(&mut inner, true), listeners)
        };
        Self::deliver(delivery);
        for listener in listeners {
            listener.on_flush();
        }
    }

    /// Tell every observer that all previously reported lines are gone.
    pub fn reset(&self) {
        let _delivery = self.delivery.lock();
        let listeners: Vec<_> = {
            let mut inner = self.inner.lock();
            inner.total = 0;
            let now = Instant::now();
            inner
                .registrations
                .iter_mut()
                .map(|r| {
                    r.reported = 0;
                    r.last_notified = now;
                    Arc::clone(&r.listener)
                })
                .collect()
        };
        for listener in listeners {
            listener.on_modified(Modification::Reset);
        }
    }

    fn collect(inner: &mut Inner, force: bool) -> Delivery {
        let now = Instant::now();
        let total = inner.total;
        inner
            .registrations
            .iter_mut()
            .filter_map(|r| {
                let pending = r.drain(total, now, force);
                (!pending.is_empty()).then(|| (Arc::clone(&r.listener), pending))
            })
            .collect()
    }

    fn deliver(delivery: Delivery) {
        for (listener, modifications) in delivery {
            for modification in modifications {
                listener.on_modified(modification);
            }
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingListener;

    const LONG: Duration = Duration::from_secs(3600);

    #[test]
    fn batches_by_count() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(RecordingListener::default());
        registry.add_listener(listener.clone(), LONG, 3);

        registry.notify_appended(2);
        assert!(listener.modifications().is_empty());

        registry.notify_appended(1);
        assert_eq!(
            listener.modifications(),
            vec![Modification::Appended(Section::new(0usize, 3))]
        );
    }

    #[test]
    fn large_append_is_split_into_batches() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(RecordingListener::default());
        registry.add_listener(listener.clone(), LONG, 4);

        registry.notify_appended(10);
        assert_eq!(
            listener.modifications(),
            vec![
                Modification::Appended(Section::new(0usize, 4)),
                Modification::Appended(Section::new(4usize, 4)),
            ]
        );

        registry.flush();
        assert_eq!(listener.appended_total(), 10);
    }

    #[test]
    fn batches_by_time() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(RecordingListener::default());
        registry.add_listener(listener.clone(), Duration::ZERO, 1000);

        registry.notify_appended(1);
        registry.notify_appended(2);
        assert_eq!(
            listener.modifications(),
            vec![
                Modification::Appended(Section::new(0usize, 1)),
                Modification::Appended(Section::new(1usize, 2)),
            ]
        );
    }

    #[test]
    fn flush_delivers_trailing_partial_batch() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(RecordingListener::default());
        registry.add_listener(listener.clone(), LONG, 100);

        registry.notify_appended(5);
        assert!(listener.modifications().is_empty());

        registry.flush();
        assert_eq!(
            listener.modifications(),
            vec![Modification::Appended(Section::new(0usize, 5))]
        );

        registry.flush();
        assert_eq!(listener.modifications().len(), 1);
    }

    #[test]
    fn flush_reaches_every_listener() {
        struct Flushes(Mutex<usize>);

        impl LogFileListener for Flushes {
            fn on_modified(&self, _: Modification) {}

            fn on_flush(&self) {
                *self.0.lock() += 1;
            }
        }

        let registry = ListenerRegistry::new();
        let listener = Arc::new(Flushes(Mutex::new(0)));
        registry.add_listener(listener.clone(), LONG, 100);

        registry.notify_appended(2);
        assert_eq!(*listener.0.lock(), 0);
        registry.flush();
        registry.flush();
        assert_eq!(*listener.0.lock(), 2);
    }

    #[test]
    fn late_listener_learns_existing_lines() {
        let registry = ListenerRegistry::new();
        registry.notify_appended(7);

        let listener = Arc::new(RecordingListener::default());
        registry.add_listener(listener.clone(), LONG, 100);
        assert_eq!(
            listener.modifications(),
            vec![Modification::Appended(Section::new(0usize, 7))]
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(RecordingListener::default());
        let id = registry.add_listener(listener.clone(), LONG, 1);

        assert!(registry.remove_listener(id));
        assert!(!registry.remove_listener(id));
        assert!(registry.is_empty());

        registry.notify_appended(3);
        assert!(listener.modifications().is_empty());
    }

    #[test]
    fn notifies_in_registration_order() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.add_listener(
                Arc::new(move |_: Modification| order.lock().push(name)),
                LONG,
                1,
            );
        }

        registry.notify_appended(1);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn reset_restarts_reporting() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(RecordingListener::default());
        registry.add_listener(listener.clone(), LONG, 1);

        registry.notify_appended(2);
        registry.reset();
        registry.notify_appended(1);

        assert_eq!(
            listener.modifications(),
            vec![
                Modification::Appended(Section::new(0usize, 1)),
                Modification::Appended(Section::new(1usize, 1)),
                Modification::Reset,
                Modification::Appended(Section::new(0usize, 1)),
            ]
        );
        assert_eq!(registry.total(), 1);
    }

    #[test]
    fn callback_may_remove_listeners() {
        let registry = Arc::new(ListenerRegistry::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(Mutex::new(0));

        let callback = {
            let registry = Arc::clone(&registry);
            let slot = Arc::clone(&slot);
            let hits = Arc::clone(&hits);
            move |_: Modification| {
                *hits.lock() += 1;
                if let Some(id) = *slot.lock() {
                    registry.remove_listener(id);
                }
            }
        };
        let id = registry.add_listener(Arc::new(callback), LONG, 1);
        *slot.lock() = Some(id);

        registry.notify_appended(1);
        registry.notify_appended(1);
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn clear_detaches_everyone() {
        let registry = ListenerRegistry::new();
        registry.add_listener(Arc::new(RecordingListener::default()), LONG, 1);
        registry.add_listener(Arc::new(RecordingListener::default()), LONG, 1);
        assert_eq!(registry.len(), 2);
        registry.clear();
        assert!(registry.is_empty());
    }
}
