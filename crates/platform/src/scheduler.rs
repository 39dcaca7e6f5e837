//! Periodic mixer-event scheduling.
//!
//! Generalizes the "recurring callback N samples from now" hook the audio
//! core's external interfaces name (§6.3: `add_event`/`remove_event`) into a
//! small trait so a tracker player doesn't depend on a concrete timer. A
//! hardware backend schedules against the mixer's own sample clock; the
//! [`FakeScheduler`] backend here is a manually advanced queue for driving
//! tick timing explicitly in tests.

/// An opaque handle to a scheduled event, returned by
/// [`TickScheduler::add_event`] and accepted by
/// [`TickScheduler::remove_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHandle(pub u32);

/// Schedules callbacks to fire after a given number of output samples.
pub trait TickScheduler {
    /// Error type.
    type Error: core::fmt::Debug;

    /// Schedule `callback` to fire `delay_samples` output samples from now.
    ///
    /// Returns a handle that can later be passed to
    /// [`remove_event`](Self::remove_event).
    fn add_event(
        &mut self,
        delay_samples: u32,
        callback: fn(&mut dyn core::any::Any),
    ) -> Result<EventHandle, Self::Error>;

    /// Cancel a previously scheduled event. No-op if already fired or
    /// already removed.
    fn remove_event(&mut self, handle: EventHandle) -> Result<(), Self::Error>;
}

/// A [`TickScheduler`] backed by a manually-advanced in-memory queue, for
/// tests that drive tick timing explicitly rather than against a real clock.
#[derive(Debug, Default)]
pub struct FakeScheduler {
    next_id: u32,
    events: heapless::Vec<(EventHandle, u32), 32>,
}

/// Error type for [`FakeScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeSchedulerError {
    /// The fixed-capacity event table is full.
    TableFull,
}

impl core::fmt::Display for FakeSchedulerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TableFull => f.write_str("fake scheduler event table is full"),
        }
    }
}

impl FakeScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance every pending event's countdown by `samples`, returning the
    /// handles of events that are now due (and removing them).
    pub fn advance(&mut self, samples: u32) -> heapless::Vec<EventHandle, 32> {
        let mut due = heapless::Vec::new();
        for (_, remaining) in self.events.iter_mut() {
            *remaining = remaining.saturating_sub(samples);
        }
        let mut i = 0;
        while i < self.events.len() {
            if self.events[i].1 == 0 {
                let (handle, _) = self.events.swap_remove(i);
                let _ = due.push(handle);
            } else {
                i += 1;
            }
        }
        due
    }

    /// Number of events still pending.
    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}

impl TickScheduler for FakeScheduler {
    type Error = FakeSchedulerError;

    fn add_event(
        &mut self,
        delay_samples: u32,
        _callback: fn(&mut dyn core::any::Any),
    ) -> Result<EventHandle, Self::Error> {
        let handle = EventHandle(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.events
            .push((handle, delay_samples))
            .map_err(|_| FakeSchedulerError::TableFull)?;
        Ok(handle)
    }

    fn remove_event(&mut self, handle: EventHandle) -> Result<(), Self::Error> {
        if let Some(pos) = self.events.iter().position(|(h, _)| *h == handle) {
            self.events.swap_remove(pos);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut dyn core::any::Any) {}

    #[test]
    fn event_fires_after_enough_samples() {
        let mut sched = FakeScheduler::new();
        let handle = sched.add_event(100, noop).expect("room in table");
        assert!(sched.advance(50).is_empty());
        let due = sched.advance(50);
        assert_eq!(due.as_slice(), &[handle]);
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn removed_event_never_fires() {
        let mut sched = FakeScheduler::new();
        let handle = sched.add_event(10, noop).expect("room in table");
        sched.remove_event(handle).expect("remove always succeeds");
        assert!(sched.advance(100).is_empty());
    }
}
