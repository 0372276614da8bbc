//! Screen events and listener fan-out
//!
//! Synchronous listeners run on the session's reader thread in subscription
//! order, each inside its own `catch_unwind` so a panicking listener cannot
//! stop delivery to the others. Asynchronous consumers get the same events
//! through a `tokio::sync::broadcast` channel.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error};
use tokio::sync::broadcast;

use crate::lib5250::{Cursor, OiaState};

/// Events queued per broadcast receiver before the slowest one lags
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEvent {
    /// Host data or local editing changed these rows (zero-based)
    Changed { rows: Vec<usize>, cursor: Cursor },
    SizeChanged { rows: usize, cols: usize },
    OiaChanged(OiaState),
    Disconnected { reason: Option<String> },
}

/// Keys queued while the keyboard was locked, offered to listeners before
/// they are flushed. Any listener clearing `allow` drops them.
#[derive(Debug)]
pub struct PendingKeys {
    pub keys: String,
    pub allow: Cell<bool>,
}

impl PendingKeys {
    pub fn new(keys: impl Into<String>) -> Self {
        Self { keys: keys.into(), allow: Cell::new(true) }
    }

    pub fn veto(&self) {
        self.allow.set(false);
    }

    pub fn is_allowed(&self) -> bool {
        self.allow.get()
    }
}

pub trait ScreenListener: Send + Sync {
    fn on_event(&self, event: &ScreenEvent);

    fn on_pending_keys(&self, _pending: &PendingKeys) {}
}

impl<F> ScreenListener for F
where
    F: Fn(&ScreenEvent) + Send + Sync,
{
    fn on_event(&self, event: &ScreenEvent) {
        self(event)
    }
}

/// Handle returned by [`EventHub::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerList = Vec<(ListenerId, Arc<dyn ScreenListener>)>;

pub struct EventHub {
    listeners: Mutex<(u64, ListenerList)>,
    sender: broadcast::Sender<ScreenEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.snapshot().len())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { listeners: Mutex::new((0, Vec::new())), sender }
    }

    pub fn subscribe(&self, listener: impl ScreenListener + 'static) -> ListenerId {
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        guard.0 += 1;
        let id = ListenerId(guard.0);
        guard.1.push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the listener was already gone
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = guard.1.len();
        guard.1.retain(|(other, _)| *other != id);
        guard.1.len() != before
    }

    pub fn subscribe_channel(&self) -> broadcast::Receiver<ScreenEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Listeners are called outside the lock so they may subscribe or
    /// unsubscribe from inside a callback
    fn snapshot(&self) -> ListenerList {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).1.clone()
    }

    pub fn publish(&self, event: &ScreenEvent) {
        for (id, listener) in self.snapshot() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                error!("screen listener {:?} panicked: {}", id, panic_message(panic.as_ref()));
            }
        }
        // No receivers is not an error
        if self.sender.send(event.clone()).is_err() {
            debug!("no channel subscribers for {:?}", std::mem::discriminant(event));
        }
    }

    /// Offer queued keys to every listener; true unless one vetoed them
    pub fn offer_pending(&self, pending: &PendingKeys) -> bool {
        for (id, listener) in self.snapshot() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_pending_keys(pending))) {
                error!("screen listener {:?} panicked: {}", id, panic_message(panic.as_ref()));
            }
        }
        pending.is_allowed()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn changed(row: usize) -> ScreenEvent {
        ScreenEvent::Changed { rows: vec![row], cursor: Cursor::default() }
    }

    #[test]
    fn test_listeners_in_order() {
        let hub = EventHub::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..2 {
            let seen = Arc::clone(&seen);
            hub.subscribe(move |event: &ScreenEvent| seen.lock().unwrap().push((tag, event.clone())));
        }
        hub.publish(&changed(1));
        hub.publish(&changed(2));
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(0, changed(1)), (1, changed(1)), (0, changed(2)), (1, changed(2))]
        );
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let hub = EventHub::default();
        let count = Arc::new(AtomicUsize::new(0));
        hub.subscribe(|_: &ScreenEvent| panic!("listener failure"));
        let counter = Arc::clone(&count);
        hub.subscribe(move |_: &ScreenEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        hub.publish(&changed(0));
        hub.publish(&changed(0));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let hub = EventHub::default();
        let id = hub.subscribe(|_: &ScreenEvent| {});
        assert_eq!(hub.listener_count(), 1);
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert_eq!(hub.listener_count(), 0);
    }

    struct Veto;

    impl ScreenListener for Veto {
        fn on_event(&self, _event: &ScreenEvent) {}

        fn on_pending_keys(&self, pending: &PendingKeys) {
            if pending.keys.contains("[enter]") {
                pending.veto();
            }
        }
    }

    #[test]
    fn test_pending_keys_veto() {
        let hub = EventHub::default();
        hub.subscribe(Veto);
        assert!(hub.offer_pending(&PendingKeys::new("abc")));
        assert!(!hub.offer_pending(&PendingKeys::new("abc[enter]")));
    }

    #[test]
    fn test_channel_receives_events() {
        let hub = EventHub::default();
        let mut receiver = hub.subscribe_channel();
        hub.publish(&ScreenEvent::SizeChanged { rows: 27, cols: 132 });
        assert_eq!(receiver.try_recv().unwrap(), ScreenEvent::SizeChanged { rows: 27, cols: 132 });
    }
}
