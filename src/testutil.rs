//! Shared test helpers

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Layer that records the level and message of every event
#[derive(Clone, Default)]
pub(crate) struct EventCollector {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for EventCollector {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.events
            .lock()
            .unwrap()
            .push((*event.metadata().level(), message));
    }
}

impl EventCollector {
    /// Install as the default subscriber for the current thread
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    /// Events at `level` or more severe
    pub(crate) fn at_least(&self, level: Level) -> Vec<(Level, String)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l <= level)
            .cloned()
            .collect()
    }
}
