//! Countdown synchronisation
//!
//! The visible countdown free-runs locally on a one-second cadence once the
//! host starts it. Host `TIMER` ticks only correct the displayed value.
//! Response latency is measured from the host's start timestamp so every
//! player shares the same origin.

use std::time::{Duration, Instant};

use super::types::TimerState;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct TimerSync {
    state: TimerState,
    /// Local instant of the last whole-second decrement
    last_tick: Option<Instant>,
}

impl TimerSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn is_locked(&self) -> bool {
        self.state.locked
    }

    /// Start a countdown of `duration_secs` at the host's `host_start_ms`
    pub fn start(&mut self, duration_secs: u32, host_start_ms: Option<i64>, now: Instant) {
        self.state.total_length = duration_secs;
        self.state.remaining = duration_secs;
        self.state.running = duration_secs > 0;
        self.state.host_start_timestamp = host_start_ms;
        self.last_tick = Some(now);
    }

    /// Seed from a late-joiner snapshot
    pub fn resume(
        &mut self,
        total: u32,
        remaining: u32,
        running: bool,
        host_start_ms: Option<i64>,
        now: Instant,
    ) {
        self.state.total_length = total;
        self.state.remaining = remaining;
        self.state.running = running && remaining > 0;
        self.state.host_start_timestamp = host_start_ms;
        self.last_tick = self.state.running.then_some(now);
    }

    /// Advance the local countdown. Returns the remaining seconds.
    pub fn tick(&mut self, now: Instant) -> u32 {
        if !self.state.running {
            return self.state.remaining;
        }
        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return self.state.remaining;
        };
        let elapsed = now.saturating_duration_since(last);
        let whole = (elapsed.as_millis() / TICK.as_millis()) as u32;
        if whole > 0 {
            self.state.remaining = self.state.remaining.saturating_sub(whole);
            self.last_tick = Some(last + TICK * whole);
            if self.state.remaining == 0 {
                self.state.running = false;
            }
        }
        self.state.remaining
    }

    /// Host correction. Overwrites the displayed value; repeating it is harmless.
    pub fn apply_remaining(&mut self, remaining: u32) {
        self.state.remaining = remaining;
        if remaining == 0 {
            self.state.running = false;
        }
    }

    /// Stop the visible countdown without locking input
    pub fn stop(&mut self) {
        self.state.running = false;
        self.last_tick = None;
    }

    /// Stop and show zero
    pub fn expire(&mut self) {
        self.stop();
        self.state.remaining = 0;
    }

    pub fn lock(&mut self) {
        self.state.locked = true;
    }

    /// Re-open input when the host restarts the countdown
    pub fn unlock(&mut self) {
        self.state.locked = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Milliseconds between the host's timer start and `submit_ms`.
    /// Zero when no start was received or the clocks disagree.
    pub fn response_latency(&self, submit_ms: i64) -> u64 {
        match self.state.host_start_timestamp {
            Some(start) => submit_ms.saturating_sub(start).max(0) as u64,
            None => 0,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
