// time-ordered event storage with deterministic tie-breaking

use std::collections::BTreeMap;

use crate::ws_interface::SimTime;

/// Ordering key: time first, then insertion sequence
///
/// The sequence counter only breaks ties between events scheduled for the
/// same instant so that equal-time events dispatch in schedule order. It
/// never carries timing information of its own.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct EventKey {
    time: SimTime,
    seq: u64,
}

/// Opaque handle to a scheduled event, used only for cancellation
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct EventHandle(EventKey);

/// Min-ordered queue of pending events
///
/// Owns every event exclusively until it is popped for dispatch. `T` is the
/// event payload; the driver decides what to do with it.
pub struct EventQueue<T> {
    events: BTreeMap<EventKey, T>,
    next_seq: u64,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Insert an event at an absolute time
    ///
    /// Relative-offset validation (negative delays, causality) happens in
    /// the clock, which is the only component that knows the current time.
    pub fn insert_at(&mut self, time: SimTime, event: T) -> EventHandle {
        let key = EventKey {
            time,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.events.insert(key, event);
        EventHandle(key)
    }

    /// Remove a pending event; a no-op for already-dispatched or already-
    /// cancelled handles
    pub fn cancel(&mut self, handle: EventHandle) {
        self.events.remove(&handle.0);
    }

    /// Pop the earliest pending event
    pub fn pop_next(&mut self) -> Option<(SimTime, T)> {
        let key = *self.events.keys().next()?;
        let event = self.events.remove(&key)?;
        Some((key.time, event))
    }

    /// Time of the earliest pending event without removing it
    pub fn peek_time(&self) -> Option<SimTime> {
        self.events.keys().next().map(|k| k.time)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Discard every pending event (driver stop)
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
