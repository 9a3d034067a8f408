// simulation clock and driver-loop plumbing

use crate::ws_event_queue::{EventHandle, EventQueue};
use crate::ws_interface::{secs, SimError, SimTime};

/// Driver lifecycle: Idle until the first step, Stopped forever after the
/// stop time is reached. A fresh run requires a fresh clock instance.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
}

/// Virtual clock plus the event queue it advances over
///
/// The driver loop itself lives with whoever owns the simulation state (see
/// `Simulator::run`): it repeatedly calls `step` and dispatches whatever
/// comes back. The clock owns the two scheduling invariants: time never
/// moves backwards, and nothing is ever scheduled into the simulated past.
pub struct SimClock<T> {
    queue: EventQueue<T>,
    now: SimTime,
    state: RunState,
}

impl<T> SimClock<T> {
    pub fn new() -> Self {
        Self {
            queue: EventQueue::new(),
            now: 0,
            state: RunState::Idle,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Schedule an event `offset_s` seconds from now
    ///
    /// A negative or non-finite offset is a malformed scenario.
    pub fn schedule_in(&mut self, offset_s: f64, event: T) -> Result<EventHandle, SimError> {
        if !offset_s.is_finite() || offset_s < 0.0 {
            return Err(SimError::InvalidSchedule);
        }
        Ok(self.queue.insert_at(self.now + secs(offset_s), event))
    }

    /// Schedule an event a fixed number of simulated nanoseconds from now
    pub fn schedule_after(&mut self, offset: SimTime, event: T) -> EventHandle {
        self.queue.insert_at(self.now + offset, event)
    }

    /// Schedule an event at an absolute simulated time
    pub fn schedule_at(&mut self, time: SimTime, event: T) -> Result<EventHandle, SimError> {
        if time < self.now {
            return Err(SimError::CausalityViolation);
        }
        Ok(self.queue.insert_at(time, event))
    }

    pub fn cancel(&mut self, handle: EventHandle) {
        self.queue.cancel(handle);
    }

    /// Advance to the next due event, honoring the stop cutoff
    ///
    /// Returns the event to dispatch, with the clock already advanced to its
    /// time. An event scheduled for exactly `stop_time` is still returned;
    /// the first event past it stops the clock, discards everything still
    /// pending and pins `now` to `stop_time`. Once Stopped, always None.
    pub fn step(&mut self, stop_time: SimTime) -> Option<(SimTime, T)> {
        if self.state == RunState::Stopped {
            return None;
        }
        self.state = RunState::Running;

        match self.queue.pop_next() {
            Some((time, event)) if time <= stop_time => {
                self.now = time;
                Some((time, event))
            }
            _ => {
                // past the cutoff or out of events: remaining events are
                // discarded, not executed
                self.queue.clear();
                self.now = stop_time;
                self.state = RunState::Stopped;
                None
            }
        }
    }
}

impl<T> Default for SimClock<T> {
    fn default() -> Self {
        Self::new()
    }
}
