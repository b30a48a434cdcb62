//! Physics events (destruction, debris, broken joints, prevented tunneling)
//!
//! Subsystems push events through a cloned [`EventSender`]; the owner of
//! the [`EventQueue`] drains them once per frame.

use crate::body::BodyHandle;
use crate::constraint::ConstraintId;
use crossbeam_channel::{Receiver, Sender};
use void_core::EntityId;

/// Something observable that happened during a step
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsEvent {
    /// A destructible broke into `fragments` pieces
    Destroyed { entity: EntityId, fragments: usize },
    /// Old fragments dropped to respect the debris cap
    DebrisEvicted { count: usize },
    /// Fragments whose lifetime ran out
    DebrisExpired { count: usize },
    /// A constraint exceeded its break force
    ConstraintBroken { id: ConstraintId },
    /// CCD stopped a fast body at its time of impact
    TunnelingPrevented { a: BodyHandle, b: BodyHandle, toi: f32 },
}

/// Producer side of the event queue
#[derive(Debug, Clone)]
pub struct EventSender(Sender<PhysicsEvent>);

impl EventSender {
    /// Send an event; a queue that has gone away drops it silently
    pub fn send(&self, event: PhysicsEvent) {
        let _ = self.0.send(event);
    }
}

/// Multi-producer event queue owned by the world
#[derive(Debug)]
pub struct EventQueue {
    sender: Sender<PhysicsEvent>,
    receiver: Receiver<PhysicsEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// A new producer handle
    pub fn sender(&self) -> EventSender {
        EventSender(self.sender.clone())
    }

    /// Take every pending event, oldest first
    pub fn drain(&self) -> Vec<PhysicsEvent> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Send through an optional sender
pub(crate) fn emit(sender: &Option<EventSender>, event: PhysicsEvent) {
    if let Some(sender) = sender {
        sender.send(event);
    }
}
