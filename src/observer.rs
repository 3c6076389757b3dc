use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::event::LogEvent;

/// Events buffered per observer before new ones are dropped
pub const OBSERVER_CHANNEL_CAPACITY: usize = 1000;

/// Identifies one attachment to the observer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverToken(u64);

/// Handle returned to the connection that attached
#[derive(Debug)]
pub struct ObserverHandle {
    pub token: ObserverToken,
    /// Ends when the observer is detached or replaced
    pub events: mpsc::Receiver<LogEvent>,
}

#[derive(Debug)]
struct Attached {
    token: ObserverToken,
    tx: mpsc::Sender<LogEvent>,
}

#[derive(Debug, Default)]
struct SlotInner {
    current: Option<Attached>,
    next_token: u64,
}

/// Holds at most one live observer
///
/// Attaching replaces the previous observer. The replaced sender is dropped,
/// so the displaced receiver sees its stream end. Delivery is best effort:
/// events are dropped when no observer is attached or its buffer is full.
#[derive(Debug, Default)]
pub struct ObserverSlot {
    inner: Mutex<SlotInner>,
}

impl ObserverSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new observer, replacing any existing one
    pub fn attach(&self) -> ObserverHandle {
        let (tx, events) = mpsc::channel(OBSERVER_CHANNEL_CAPACITY);
        let mut inner = self.lock();
        inner.next_token += 1;
        let token = ObserverToken(inner.next_token);
        if inner.current.replace(Attached { token, tx }).is_some() {
            tracing::info!("observer replaced by newer connection");
        }
        ObserverHandle { token, events }
    }

    /// Detach the observer if `token` is still the current one
    ///
    /// Returns false when a newer observer already took the slot.
    pub fn detach(&self, token: ObserverToken) -> bool {
        let mut inner = self.lock();
        match &inner.current {
            Some(attached) if attached.token == token => {
                inner.current = None;
                true
            }
            _ => false,
        }
    }

    /// Check if an observer is attached
    pub fn is_attached(&self) -> bool {
        self.lock().current.is_some()
    }

    /// Forward an event to the current observer, if any
    pub fn emit(&self, event: LogEvent) {
        let tx = match &self.lock().current {
            Some(attached) => attached.tx.clone(),
            None => return,
        };
        if let Err(err) = tx.try_send(event) {
            tracing::debug!(error = %err, "dropping observer event");
        }
    }

    /// Forward an event only if `token` is still the current observer
    pub fn emit_to(&self, token: ObserverToken, event: LogEvent) {
        let tx = match &self.lock().current {
            Some(attached) if attached.token == token => attached.tx.clone(),
            _ => return,
        };
        let _ = tx.try_send(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotInner> {
        // A poisoned slot still holds a valid Option, keep serving it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(text: &str) -> LogEvent {
        LogEvent::Log { text: text.into() }
    }

    #[test]
    fn observer_slot_emit_without_observer_is_noop() {
        let slot = ObserverSlot::new();
        slot.emit(log("dropped"));
        assert!(!slot.is_attached());
    }

    #[tokio::test]
    async fn observer_slot_emit_delivers_to_attached_observer() {
        let slot = ObserverSlot::new();
        let mut handle = slot.attach();

        slot.emit(log("one"));
        slot.emit(log("two"));

        assert_eq!(handle.events.recv().await, Some(log("one")));
        assert_eq!(handle.events.recv().await, Some(log("two")));
    }

    #[tokio::test]
    async fn observer_slot_attach_replaces_and_closes_previous() {
        let slot = ObserverSlot::new();
        let mut first = slot.attach();
        let mut second = slot.attach();

        slot.emit(log("after"));

        assert_eq!(first.events.recv().await, None);
        assert_eq!(second.events.recv().await, Some(log("after")));
    }

    #[test]
    fn observer_slot_detach_ignores_stale_token() {
        let slot = ObserverSlot::new();
        let first = slot.attach();
        let second = slot.attach();

        assert!(!slot.detach(first.token));
        assert!(slot.is_attached());
        assert!(slot.detach(second.token));
        assert!(!slot.is_attached());
    }

    #[tokio::test]
    async fn observer_slot_emit_to_skips_replaced_token() {
        let slot = ObserverSlot::new();
        let first = slot.attach();
        let mut second = slot.attach();

        slot.emit_to(first.token, log("stale"));
        slot.emit_to(second.token, log("fresh"));

        assert_eq!(second.events.recv().await, Some(log("fresh")));
    }
}
