//! Visitor event bus.
//!
//! The bus is owned by the host page; this crate only subscribes to it (to
//! learn the visitor's locale) and emits onto it (to report interactions).
//! [`MemoryEventBus`] is an in-process implementation with buffered history,
//! suitable for embedders without an external bus and for tests.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use futures_core::Stream;
use regex::Regex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// An event published on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    pub name: String,
    pub payload: Value,
}

impl BusEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Callback invoked for every matching event.
pub type EventHandler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

/// Boxed async stream of bus events.
pub type EventStream = Pin<Box<dyn Stream<Item = BusEvent> + Send>>;

/// Page-view event names: `(namespace.)?<two lowercase letters>View`,
/// e.g. `ecView` or `ecommerce.ecView`.
pub const VIEW_EVENT_PATTERN: &str = r"^([^.]+\.)?[a-z]{2}View$";

static VIEW_EVENT_REGEX: OnceLock<Regex> = OnceLock::new();

/// Selects which event names a subscription receives.
#[derive(Debug, Clone)]
pub enum EventPattern {
    /// Every event
    Any,
    /// Exactly this name
    Exact(String),
    /// Names matching a regular expression
    Regex(Regex),
}

impl EventPattern {
    /// Pattern for names matching `pattern`.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    /// Pattern for page-view events, see [`VIEW_EVENT_PATTERN`].
    pub fn view() -> Self {
        let regex = VIEW_EVENT_REGEX
            .get_or_init(|| Regex::new(VIEW_EVENT_PATTERN).expect("view event regex is valid"));
        Self::Regex(regex.clone())
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == name,
            Self::Regex(regex) => regex.is_match(name),
        }
    }
}

/// A live subscription. Dropping it unsubscribes.
pub trait Subscription: Send {
    /// Re-deliver buffered past events matching the subscription's pattern.
    fn replay(&self);
}

/// Publish/subscribe channel carrying visitor events.
pub trait EventBus: Send + Sync {
    /// Register `handler` for events matching `pattern`.
    fn subscribe(&self, pattern: EventPattern, handler: EventHandler) -> Box<dyn Subscription>;

    /// Publish an event.
    fn emit(&self, name: &str, payload: Value);
}

struct Subscriber {
    id: u64,
    pattern: EventPattern,
    handler: EventHandler,
}

#[derive(Default)]
struct BusState {
    history: Vec<BusEvent>,
    subscribers: Vec<Subscriber>,
    watchers: Vec<mpsc::UnboundedSender<BusEvent>>,
    next_id: u64,
}

struct BusInner {
    state: Mutex<BusState>,
    history_limit: usize,
}

impl BusInner {
    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().subscribers.retain(|s| s.id != id);
    }
}

/// In-process event bus with history replay.
///
/// Handlers run synchronously on the emitting thread, outside the bus lock,
/// so a handler may itself emit or unsubscribe.
///
/// # Example
///
/// ```rust
/// use recstratify::{BusEvent, EventBus, EventPattern, MemoryEventBus};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let bus = MemoryEventBus::new();
/// bus.emit("ecView", json!({ "language": "en-gb" }));
///
/// let sub = bus.subscribe(EventPattern::view(), Arc::new(|event: &BusEvent| {
///     assert_eq!(event.name, "ecView");
/// }));
/// sub.replay();
/// ```
#[derive(Clone)]
pub struct MemoryEventBus {
    inner: Arc<BusInner>,
}

impl MemoryEventBus {
    /// Create a bus keeping the default amount of history (1000 events).
    pub fn new() -> Self {
        Self::with_history_limit(1000)
    }

    /// Create a bus keeping at most `limit` past events for replay.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                state: Mutex::new(BusState::default()),
                history_limit: limit,
            }),
        }
    }

    /// Events emitted so far, oldest first, within the history limit.
    pub fn history(&self) -> Vec<BusEvent> {
        self.inner.lock().history.clone()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Stream of every event emitted after this call.
    pub fn stream(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().watchers.push(tx);
        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("MemoryEventBus")
            .field("history", &state.history.len())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl EventBus for MemoryEventBus {
    fn subscribe(&self, pattern: EventPattern, handler: EventHandler) -> Box<dyn Subscription> {
        let mut state = self.inner.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push(Subscriber {
            id,
            pattern,
            handler,
        });
        Box::new(MemorySubscription {
            bus: Arc::clone(&self.inner),
            id,
        })
    }

    fn emit(&self, name: &str, payload: Value) {
        let event = BusEvent::new(name, payload);
        let handlers: Vec<EventHandler> = {
            let mut state = self.inner.lock();
            state.history.push(event.clone());
            let overflow = state.history.len().saturating_sub(self.inner.history_limit);
            state.history.drain(..overflow);
            state.watchers.retain(|tx| tx.send(event.clone()).is_ok());
            state
                .subscribers
                .iter()
                .filter(|s| s.pattern.matches(name))
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };
        tracing::trace!(event = name, handlers = handlers.len(), "dispatching bus event");
        for handler in handlers {
            handler(&event);
        }
    }
}

struct MemorySubscription {
    bus: Arc<BusInner>,
    id: u64,
}

impl Subscription for MemorySubscription {
    fn replay(&self) {
        let (handler, events) = {
            let state = self.bus.lock();
            let Some(sub) = state.subscribers.iter().find(|s| s.id == self.id) else {
                return;
            };
            let events: Vec<BusEvent> = state
                .history
                .iter()
                .filter(|e| sub.pattern.matches(&e.name))
                .cloned()
                .collect();
            (Arc::clone(&sub.handler), events)
        };
        for event in &events {
            handler(event);
        }
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, EventHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let handler: EventHandler = Arc::new(move |_: &BusEvent| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn test_view_pattern() {
        let pattern = EventPattern::view();
        assert!(pattern.matches("ecView"));
        assert!(pattern.matches("trView"));
        assert!(pattern.matches("ecommerce.ecView"));
        assert!(pattern.matches("qubit.egView"));

        assert!(!pattern.matches("View"));
        assert!(!pattern.matches("ecBasketView"));
        assert!(!pattern.matches("EcView"));
        assert!(!pattern.matches(".ecView"));
        assert!(!pattern.matches("a.b.ecView"));
        assert!(!pattern.matches("ecView2"));
    }

    #[test]
    fn test_custom_regex_pattern() {
        let pattern = EventPattern::regex(r"^qubit\.recommendationItem").unwrap();
        assert!(pattern.matches("qubit.recommendationItemShown"));
        assert!(!pattern.matches("ecView"));
        assert!(EventPattern::regex("(").is_err());
    }

    #[test]
    fn test_emit_reaches_matching_subscribers() {
        let bus = MemoryEventBus::new();
        let (views, on_view) = counter();
        let (all, on_any) = counter();
        let _a = bus.subscribe(EventPattern::view(), on_view);
        let _b = bus.subscribe(EventPattern::Any, on_any);

        bus.emit("ecView", json!({}));
        bus.emit("qubit.metric", json!({}));

        assert_eq!(views.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_replay_delivers_history() {
        let bus = MemoryEventBus::new();
        bus.emit("ecView", json!({ "currency": "GBP" }));
        bus.emit("other", json!({}));

        let (count, handler) = counter();
        let sub = bus.subscribe(EventPattern::view(), handler);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        sub.replay();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = MemoryEventBus::new();
        let (count, handler) = counter();
        let sub = bus.subscribe(EventPattern::Exact("x".into()), handler);
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit("x", json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_history_limit() {
        let bus = MemoryEventBus::with_history_limit(2);
        bus.emit("a", json!(1));
        bus.emit("b", json!(2));
        bus.emit("c", json!(3));

        let names: Vec<String> = bus.history().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_stream_observes_emits() {
        let bus = MemoryEventBus::new();
        let stream = bus.stream();
        bus.emit("first", json!(1));
        bus.emit("second", json!(2));
        drop(bus);

        let events: Vec<BusEvent> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                BusEvent::new("first", json!(1)),
                BusEvent::new("second", json!(2)),
            ]
        );
    }
}
