//! Protocol constants - timeouts, delays, caps
//!
//! Defaults only. Everything a deployment might want to tune is also exposed
//! through the config file.

use std::time::Duration;

// =============================================================================
// CONNECTION
// =============================================================================

/// Pause before the first connect so startup work settles
pub const INITIAL_CONNECT_DELAY: Duration = Duration::from_millis(500);

/// Bound on TCP connect + WebSocket handshake
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on the `/api/host-info` discovery request
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// First reconnect delay; doubles per attempt
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Reconnect delay ceiling
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Failed attempts before giving up for good
pub const MAX_RECONNECT_ATTEMPTS: u32 = 15;

/// Discovery endpoint path on the host
pub const HOST_INFO_PATH: &str = "/api/host-info";

/// WebSocket path used when discovery is unavailable
pub const EVENTS_PATH: &str = "/events";

/// Reported to the user once the reconnect ceiling is hit
pub const TERMINAL_CONNECT_ERROR: &str = "Unable to connect after multiple attempts";

// =============================================================================
// SESSION TIMING
// =============================================================================

/// Time between "time is up" on screen and inputs actually locking
pub const LOCK_GRACE: Duration = Duration::from_millis(1000);

/// Approval screen dwell before switching to the display screen
pub const APPROVAL_DISPLAY_DELAY: Duration = Duration::from_secs(2);

/// How long the fastest-team overlay stays up
pub const FASTEST_OVERLAY_DURATION: Duration = Duration::from_secs(5);

/// Maximum selections in go-wide mode
pub const GO_WIDE_CAP: usize = 2;

// =============================================================================
// PRESENCE
// =============================================================================

/// Raw visibility/focus events are coalesced over this window
pub const PRESENCE_DEBOUNCE: Duration = Duration::from_millis(100);

/// An identical away/active value is not re-sent within this window
pub const PRESENCE_DUPLICATE_WINDOW: Duration = Duration::from_millis(500);
