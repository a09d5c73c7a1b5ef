//! Event bus coordinating lifecycle transitions with loggers and backends
//!
//! A single FIFO queue drained on the caller's thread. Handlers that enqueue
//! new events do not recurse: the new events are appended and dispatched
//! after everything already queued, so a cascade never grows the stack and
//! dispatch order is strictly enqueue order.
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use trueno_exp::events::{Event, EventBus};
//!
//! let bus = EventBus::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let log = Rc::clone(&seen);
//! bus.register("A", move |bus, event| {
//!     log.borrow_mut().push(event.name().to_string());
//!     bus.enqueue(Event::new("D"));
//! });
//! for name in ["B", "C", "D"] {
//!     let log = Rc::clone(&seen);
//!     bus.register(name, move |_, event| log.borrow_mut().push(event.name().to_string()));
//! }
//!
//! bus.enqueue_all([Event::new("A"), Event::new("B"), Event::new("C")]);
//! assert_eq!(*seen.borrow(), ["A", "B", "C", "D"]);
//! ```

mod logger;

pub use logger::{Logger, TracingLogger};

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use serde::Serialize;
use serde_json::{Map, Value};

/// Well-known event names.
pub mod names {
    /// An execution of an experiment started.
    pub const START_EXPERIMENT: &str = "start_experiment";
    /// An execution of an experiment finished.
    pub const STOP_EXPERIMENT: &str = "stop_experiment";
    /// Experiment configuration (pipeline, parameters) is available.
    pub const PUT_EXPERIMENT_CONFIGURATION: &str = "put_experiment_configuration";
    /// A run started.
    pub const START_RUN: &str = "start_run";
    /// A run reached a terminal state.
    pub const STOP_RUN: &str = "stop_run";
    /// A split started.
    pub const START_SPLIT: &str = "start_split";
    /// A split reached a terminal state.
    pub const STOP_SPLIT: &str = "stop_split";
    /// A score was computed for a combination.
    pub const LOG_SCORE: &str = "log_score";
    /// Results of a computation are available.
    pub const LOG_RESULTS: &str = "log_results";
    /// Free-form structured event.
    pub const LOG_EVENT: &str = "log_event";
    /// Informational message.
    pub const LOG: &str = "log";
    /// Warning (soft failure).
    pub const WARN: &str = "warn";
    /// Error (soft failure on the creation path).
    pub const ERROR: &str = "error";

    /// All names a [`super::Logger`] subscribes to.
    pub const ALL: [&str; 13] = [
        START_EXPERIMENT,
        STOP_EXPERIMENT,
        PUT_EXPERIMENT_CONFIGURATION,
        START_RUN,
        STOP_RUN,
        START_SPLIT,
        STOP_SPLIT,
        LOG_SCORE,
        LOG_RESULTS,
        LOG_EVENT,
        LOG,
        WARN,
        ERROR,
    ];
}

/// Event record: a name plus a mapping of arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    name: String,
    args: Map<String, Value>,
}

impl Event {
    /// Create an event without arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Map::new(),
        }
    }

    /// Add an argument.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Add a serializable argument; values that fail to serialize become `null`.
    #[must_use]
    pub fn with_record<T: Serialize>(self, key: impl Into<String>, record: &T) -> Self {
        let value = serde_json::to_value(record).unwrap_or(Value::Null);
        self.with(key, value)
    }

    /// Informational event from `source`.
    #[must_use]
    pub fn log(source: &str, message: impl Into<String>) -> Self {
        Self::new(names::LOG)
            .with("source", source)
            .with("message", message.into())
    }

    /// Warning event from `source`.
    #[must_use]
    pub fn warn(source: &str, message: impl Into<String>) -> Self {
        Self::new(names::WARN)
            .with("source", source)
            .with("message", message.into())
    }

    /// Error event from `source`.
    #[must_use]
    pub fn error(source: &str, message: impl Into<String>) -> Self {
        Self::new(names::ERROR)
            .with("source", source)
            .with("message", message.into())
    }

    /// Event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event arguments.
    #[must_use]
    pub const fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    /// Single argument.
    #[must_use]
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    /// String argument, empty if missing or not a string.
    #[must_use]
    pub fn str_arg(&self, key: &str) -> &str {
        self.args.get(key).and_then(Value::as_str).unwrap_or_default()
    }
}

/// Handler invoked with the bus (to publish follow-up events) and the event.
pub type Handler = Rc<dyn Fn(&EventBus, &Event)>;

/// Single-threaded, ordered event queue.
#[derive(Default)]
pub struct EventBus {
    queue: RefCell<VecDeque<Event>>,
    draining: Cell<bool>,
    handlers: RefCell<HashMap<String, Vec<Handler>>>,
    dispatched: Cell<usize>,
    unhandled: Cell<usize>,
}

impl EventBus {
    /// Create a bus with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus whose lifecycle events fan out to `loggers`.
    #[must_use]
    pub fn with_loggers(loggers: impl IntoIterator<Item = Rc<dyn Logger>>) -> Self {
        let bus = Self::new();
        for logger in loggers {
            bus.add_logger(logger);
        }
        bus
    }

    /// Register a handler for `name`. Handlers run in registration order.
    pub fn register(&self, name: impl Into<String>, handler: impl Fn(&Self, &Event) + 'static) {
        self.handlers
            .borrow_mut()
            .entry(name.into())
            .or_default()
            .push(Rc::new(handler));
    }

    /// Subscribe a logger to every well-known event name.
    pub fn add_logger(&self, logger: Rc<dyn Logger>) {
        for name in names::ALL {
            let sink = Rc::clone(&logger);
            self.register(name, move |_, event| logger::dispatch(sink.as_ref(), event));
        }
    }

    /// Append an event and drain the queue unless a drain is already running.
    pub fn enqueue(&self, event: Event) {
        self.queue.borrow_mut().push_back(event);
        if !self.draining.get() {
            self.drain();
        }
    }

    /// Append several events, then drain once.
    pub fn enqueue_all(&self, events: impl IntoIterator<Item = Event>) {
        self.queue.borrow_mut().extend(events);
        if !self.draining.get() {
            self.drain();
        }
    }

    /// Number of events waiting in the queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Number of events dispatched to at least one handler.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.dispatched.get()
    }

    /// Number of events dropped because no handler was registered.
    #[must_use]
    pub fn unhandled(&self) -> usize {
        self.unhandled.get()
    }

    fn drain(&self) {
        let _guard = DrainGuard::engage(&self.draining);

        loop {
            // Release the queue borrow before calling handlers; they may enqueue.
            let Some(event) = self.queue.borrow_mut().pop_front() else {
                break;
            };

            let handlers = self.handlers.borrow().get(event.name()).cloned();
            let Some(handlers) = handlers.filter(|h| !h.is_empty()) else {
                tracing::warn!(event = event.name(), "unhandled event encountered");
                self.unhandled.set(self.unhandled.get() + 1);
                continue;
            };

            tracing::trace!(event = event.name(), handlers = handlers.len(), "dispatching event");
            for handler in &handlers {
                handler(self, &event);
            }
            self.dispatched.set(self.dispatched.get() + 1);
        }
    }
}

/// Resets the drain flag even if a handler panics.
struct DrainGuard<'a>(&'a Cell<bool>);

impl<'a> DrainGuard<'a> {
    fn engage(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(bus: &EventBus, names: &[&str]) -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        for name in names {
            let seen = Rc::clone(&seen);
            bus.register(*name, move |_, event| seen.borrow_mut().push(event.name().to_string()));
        }
        seen
    }

    #[test]
    fn test_fifo_order_with_nested_enqueue() {
        let bus = EventBus::new();
        let seen = recorder(&bus, &["B", "C", "D"]);

        let log = Rc::clone(&seen);
        bus.register("A", move |bus, event| {
            log.borrow_mut().push(event.name().to_string());
            bus.enqueue(Event::new("D"));
            // Nothing nested may run before A returns.
            assert_eq!(log.borrow().len(), 1);
        });

        bus.enqueue_all([Event::new("A"), Event::new("B"), Event::new("C")]);

        assert_eq!(*seen.borrow(), ["A", "B", "C", "D"]);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_unhandled_event_does_not_lose_followers() {
        let bus = EventBus::new();
        let seen = recorder(&bus, &["known"]);

        bus.enqueue_all([Event::new("unknown"), Event::new("known")]);

        assert_eq!(*seen.borrow(), ["known"]);
        assert_eq!(bus.unhandled(), 1);
        assert_eq!(bus.dispatched(), 1);
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for idx in 0..3 {
            let order = Rc::clone(&order);
            bus.register("evt", move |_, _| order.borrow_mut().push(idx));
        }

        bus.enqueue(Event::new("evt"));
        assert_eq!(*order.borrow(), [0, 1, 2]);
    }

    #[test]
    fn test_handler_receives_args() {
        let bus = EventBus::new();
        let got = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&got);
        bus.register("evt", move |_, event| {
            *slot.borrow_mut() = Some(event.str_arg("key").to_string());
        });

        bus.enqueue(Event::new("evt").with("key", "value"));
        assert_eq!(got.borrow().as_deref(), Some("value"));
    }

    #[test]
    fn test_deep_cascade_is_iterative() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&count);
        bus.register("tick", move |bus, _| {
            counter.set(counter.get() + 1);
            if counter.get() < 10_000 {
                bus.enqueue(Event::new("tick"));
            }
        });

        bus.enqueue(Event::new("tick"));
        assert_eq!(count.get(), 10_000);
    }
}
