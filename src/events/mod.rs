use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::RwLock;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NodeEvent {
    Lost,
    Recovered,
    Timeout,
}

impl NodeEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lost => "lost",
            Self::Recovered => "recovered",
            Self::Timeout => "timeout",
        }
    }
}

type Listener = Box<dyn Fn() + Send + Sync>;

/// Multicast registry for node lifecycle notifications. Listeners run
/// synchronously on whichever thread detected the condition; a panicking
/// listener is isolated so the remaining listeners still run.
#[derive(Default)]
pub struct EventHub {
    listeners: RwLock<HashMap<NodeEvent, Vec<Listener>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, event: NodeEvent, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut listeners = self
            .listeners
            .write()
            .expect("event listener map lock poisoned");
        listeners.entry(event).or_default().push(Box::new(listener));
    }

    pub fn notify(&self, event: NodeEvent) {
        let listeners = self
            .listeners
            .read()
            .expect("event listener map lock poisoned");

        let Some(handlers) = listeners.get(&event) else {
            return;
        };

        for (idx, handler) in handlers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                eprintln!("listener #{idx} panicked for '{}' event", event.as_str());
            }
        }
    }

    pub fn listener_count(&self, event: NodeEvent) -> usize {
        self.listeners
            .read()
            .expect("event listener map lock poisoned")
            .get(&event)
            .map(Vec::len)
            .unwrap_or(0)
    }
}
