//! Presence reporting - away/active state over an unreliable link
//!
//! Raw visibility and focus events are debounced, then compared against the
//! last value reported so alt-tab flicker does not spam the host. When the
//! link is down the newest state waits in a single slot (last write wins)
//! and goes out on the next open tick or on reconnect.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::constants::{PRESENCE_DEBOUNCE, PRESENCE_DUPLICATE_WINDOW};
use super::io_traits::MessageSender;
use super::protocol::PlayerMessage;
use super::schedule::OneShot;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSettings {
    pub debounce: Duration,
    pub duplicate_window: Duration,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            debounce: PRESENCE_DEBOUNCE,
            duplicate_window: PRESENCE_DUPLICATE_WINDOW,
        }
    }
}

/// The raw event that last changed presence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceReason {
    Hidden,
    Visible,
    Blurred,
    Focused,
}

impl PresenceReason {
    pub fn as_str(self) -> &'static str {
        match self {
            PresenceReason::Hidden => "tab-hidden",
            PresenceReason::Visible => "tab-visible",
            PresenceReason::Blurred => "window-blur",
            PresenceReason::Focused => "window-focus",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceMessage {
    pub away: bool,
    pub reason: PresenceReason,
    /// Epoch milliseconds when the state settled
    pub timestamp: i64,
}

impl PresenceMessage {
    pub fn to_player_message(&self) -> PlayerMessage {
        let reason = self.reason.as_str().to_string();
        if self.away {
            PlayerMessage::PlayerAway {
                reason,
                changed_at: self.timestamp,
            }
        } else {
            PlayerMessage::PlayerActive {
                reason,
                changed_at: self.timestamp,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceOutcome {
    Sent(PresenceMessage),
    /// Same value reported moments ago
    Suppressed,
    /// Link down; held for retry
    Queued,
}

// =============================================================================
// REPORTER
// =============================================================================

pub struct PresenceReporter {
    settings: PresenceSettings,
    attached: bool,
    visible: bool,
    focused: bool,
    debounce: OneShot<PresenceReason>,
    /// Last value sent or queued, for duplicate suppression
    last_reported: Option<(bool, Instant)>,
    queued: Option<PresenceMessage>,
}

impl PresenceReporter {
    pub fn new(settings: PresenceSettings) -> Self {
        Self {
            settings,
            attached: false,
            visible: true,
            focused: true,
            debounce: OneShot::new(),
            last_reported: None,
            queued: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_away(&self) -> bool {
        !self.visible || !self.focused
    }

    pub fn queued(&self) -> Option<&PresenceMessage> {
        self.queued.as_ref()
    }

    /// Start listening. The device is assumed visible and focused.
    pub fn attach(&mut self) {
        if self.attached {
            return;
        }
        debug!("[PRESENCE] Attached");
        self.attached = true;
        self.visible = true;
        self.focused = true;
    }

    /// Stop listening and drop every pending timer and queued state
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        debug!("[PRESENCE] Detached");
        self.attached = false;
        self.debounce.cancel();
        self.queued = None;
        self.last_reported = None;
    }

    pub fn report_visibility(&mut self, visible: bool, now: Instant) {
        if !self.attached {
            return;
        }
        self.visible = visible;
        let reason = if visible {
            PresenceReason::Visible
        } else {
            PresenceReason::Hidden
        };
        self.debounce.schedule(now + self.settings.debounce, reason);
    }

    pub fn report_focus(&mut self, focused: bool, now: Instant) {
        if !self.attached {
            return;
        }
        self.focused = focused;
        let reason = if focused {
            PresenceReason::Focused
        } else {
            PresenceReason::Blurred
        };
        self.debounce.schedule(now + self.settings.debounce, reason);
    }

    /// Drive debounce expiry and queued retries
    pub fn tick<S: MessageSender + ?Sized>(
        &mut self,
        now: Instant,
        wall_ms: i64,
        sender: &S,
    ) -> Option<PresenceOutcome> {
        if !self.attached {
            return None;
        }
        if let Some(reason) = self.debounce.take_due(now) {
            let message = PresenceMessage {
                away: self.is_away(),
                reason,
                timestamp: wall_ms,
            };
            return Some(self.emit(message, now, sender));
        }
        if self.queued.is_some() && sender.is_open() {
            return self.flush(now, sender);
        }
        None
    }

    /// Retry the queued state after a reconnect, skipping duplicate suppression
    pub fn flush_on_reconnect<S: MessageSender + ?Sized>(
        &mut self,
        now: Instant,
        sender: &S,
    ) -> Option<PresenceOutcome> {
        if !self.attached {
            return None;
        }
        self.flush(now, sender)
    }

    fn flush<S: MessageSender + ?Sized>(
        &mut self,
        now: Instant,
        sender: &S,
    ) -> Option<PresenceOutcome> {
        let message = self.queued.take()?;
        info!(away = message.away, "[PRESENCE] Retrying queued state");
        Some(self.deliver(message, now, sender))
    }

    fn emit<S: MessageSender + ?Sized>(
        &mut self,
        message: PresenceMessage,
        now: Instant,
        sender: &S,
    ) -> PresenceOutcome {
        if let Some((away, at)) = self.last_reported {
            if away == message.away
                && now.saturating_duration_since(at) < self.settings.duplicate_window
            {
                debug!(away, "[PRESENCE] Duplicate suppressed");
                return PresenceOutcome::Suppressed;
            }
        }
        self.deliver(message, now, sender)
    }

    fn deliver<S: MessageSender + ?Sized>(
        &mut self,
        message: PresenceMessage,
        now: Instant,
        sender: &S,
    ) -> PresenceOutcome {
        self.last_reported = Some((message.away, now));
        if sender.is_open() && sender.send(message.to_player_message()) {
            debug!(away = message.away, reason = message.reason.as_str(), "[PRESENCE] Sent");
            self.queued = None;
            PresenceOutcome::Sent(message)
        } else {
            debug!(away = message.away, "[PRESENCE] Link down, queued");
            self.queued = Some(message);
            PresenceOutcome::Queued
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
