//! Out-of-band game notifications.
//!
//! Handlers and the tick append to an [`EventQueue`] owned by the caller. The room then routes
//! the drained queue into a [`Mailbox`], which holds each member's undelivered events until the
//! next snapshot for that member is built.

use shared::{GameEvent, UserId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Broadcast,
    User(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundEvent {
    pub target: EventTarget,
    pub event: GameEvent,
}

/// Ordered list of events emitted during one call into the simulation.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<OutboundEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcast(&mut self, event: GameEvent) {
        self.events.push(OutboundEvent {
            target: EventTarget::Broadcast,
            event,
        });
    }

    pub fn send(&mut self, user_id: UserId, event: GameEvent) {
        self.events.push(OutboundEvent {
            target: EventTarget::User(user_id),
            event,
        });
    }

    pub fn take(&mut self) -> Vec<OutboundEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn as_slice(&self) -> &[OutboundEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Per-member pending events awaiting delivery.
#[derive(Debug, Default)]
pub struct Mailbox {
    pending: HashMap<UserId, Vec<GameEvent>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes events to current members. Targeted events for users who are not members are
    /// dropped.
    pub fn deliver(&mut self, events: Vec<OutboundEvent>, members: &[UserId]) {
        for OutboundEvent { target, event } in events {
            match target {
                EventTarget::Broadcast => {
                    for member in members {
                        self.pending.entry(*member).or_default().push(event);
                    }
                }
                EventTarget::User(user_id) => {
                    if members.contains(&user_id) {
                        self.pending.entry(user_id).or_default().push(event);
                    }
                }
            }
        }
    }

    /// Empties and returns one member's pending events.
    pub fn drain(&mut self, user_id: UserId) -> Vec<GameEvent> {
        self.pending.remove(&user_id).unwrap_or_default()
    }

    pub fn pending(&self, user_id: UserId) -> &[GameEvent] {
        self.pending.get(&user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn remove(&mut self, user_id: UserId) {
        self.pending.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_preserves_emission_order() {
        let mut queue = EventQueue::new();
        queue.send(1, GameEvent::Jump);
        queue.broadcast(GameEvent::Finish);
        queue.send(2, GameEvent::Frozen);

        let events = queue.take();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].target, EventTarget::User(1));
        assert_eq!(events[1].target, EventTarget::Broadcast);
        assert_eq!(events[2].event, GameEvent::Frozen);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_every_member() {
        let mut queue = EventQueue::new();
        queue.broadcast(GameEvent::Start);

        let mut mailbox = Mailbox::new();
        mailbox.deliver(queue.take(), &[1, 2, 3]);

        for member in [1, 2, 3] {
            assert_eq!(mailbox.pending(member), &[GameEvent::Start]);
        }
    }

    #[test]
    fn test_targeted_event_reaches_only_its_user() {
        let mut queue = EventQueue::new();
        queue.send(2, GameEvent::Respawn);
        queue.send(9, GameEvent::Jump);

        let mut mailbox = Mailbox::new();
        mailbox.deliver(queue.take(), &[1, 2]);

        assert!(mailbox.pending(1).is_empty());
        assert_eq!(mailbox.pending(2), &[GameEvent::Respawn]);
        assert!(mailbox.pending(9).is_empty());
    }

    #[test]
    fn test_drain_delivers_at_most_once() {
        let mut mailbox = Mailbox::new();
        let mut queue = EventQueue::new();
        queue.send(1, GameEvent::Jump);
        queue.broadcast(GameEvent::Finish);
        mailbox.deliver(queue.take(), &[1]);

        assert_eq!(mailbox.drain(1), vec![GameEvent::Jump, GameEvent::Finish]);
        assert!(mailbox.drain(1).is_empty());
    }

    #[test]
    fn test_remove_discards_pending() {
        let mut mailbox = Mailbox::new();
        let mut queue = EventQueue::new();
        queue.broadcast(GameEvent::Start);
        mailbox.deliver(queue.take(), &[1, 2]);

        mailbox.remove(1);

        assert!(mailbox.drain(1).is_empty());
        assert_eq!(mailbox.drain(2), vec![GameEvent::Start]);
    }
}
