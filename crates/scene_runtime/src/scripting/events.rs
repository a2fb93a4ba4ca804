//! Deferred event bus
//!
//! Scripts publish named events with an arbitrary payload; delivery is
//! deferred to the start of the next script pass so emission during a
//! handler cannot recurse into other objects mid-frame.

use rhai::Dynamic;

/// A published event awaiting delivery
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name subscribers match on
    pub name: String,
    /// Arbitrary script payload
    pub data: Dynamic,
}

/// Queue of events published this frame, delivered next frame
#[derive(Default)]
pub struct EventBus {
    queue: Vec<Event>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for delivery on the next pass
    pub fn emit(&mut self, name: impl Into<String>, data: Dynamic) {
        self.queue.push(Event {
            name: name.into(),
            data,
        });
    }

    /// Take every queued event, leaving the queue empty for this
    /// frame's emissions
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.queue)
    }

    /// Number of undelivered events
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no events are queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_queue() {
        let mut bus = EventBus::new();
        bus.emit("door_opened", Dynamic::from(3_i64));
        bus.emit("door_closed", Dynamic::UNIT);

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "door_opened");
        assert!(bus.is_empty());
    }
}
