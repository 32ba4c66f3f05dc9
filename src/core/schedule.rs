//! Cancelable one-shot deadlines
//!
//! Every piece of delayed UI work (approval auto-advance, delayed display
//! transitions, lock grace, overlay expiry) is a [`OneShot`]. Nothing fires on
//! its own: the owner polls [`OneShot::take_due`] from its tick, which keeps
//! the state machine deterministic and makes cancellation a plain assignment.

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct OneShot<T = ()> {
    pending: Option<(Instant, T)>,
}

impl<T> Default for OneShot<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> OneShot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the deadline, replacing whatever was pending
    pub fn schedule(&mut self, at: Instant, payload: T) {
        self.pending = Some((at, payload));
    }

    /// Disarm. Returns true if something was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    /// Fire if the deadline has passed. Firing disarms.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((at, _)) if *at <= now => self.pending.take().map(|(_, p)| p),
            _ => None,
        }
    }
}

impl OneShot<()> {
    /// Arm only if idle, so repeated triggers do not push the deadline out
    pub fn schedule_once(&mut self, at: Instant) {
        if self.pending.is_none() {
            self.pending = Some((at, ()));
        }
    }
}
