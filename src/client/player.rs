//! Player client - main orchestrator
//!
//! Wires the session state machine and presence reporter to the connection
//! manager, persists identity, and exposes the user actions the front end
//! calls.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::config::Config;
use super::discovery::Discovery;
use super::identity::{IdentityError, IdentityStore};
use super::photo::{load_photo, PhotoError};
use super::websocket::{ConnectionHandle, ConnectionHandler, ConnectionManager};
use crate::core::io_traits::{ConnectionStatus, MessageSender};
use crate::core::presence::PresenceReporter;
use crate::core::protocol::{HostMessage, OutboundEnvelope, PlayerMessage};
use crate::core::session::{PlayerSession, SessionEvent, SessionSnapshot, SubmitOutcome};
use crate::core::types::{AnswerValue, SessionIdentity};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

// =============================================================================
// OUTBOX
// =============================================================================

/// Stamps identity and send time onto every outbound message
struct Outbox<'a> {
    handle: Option<&'a ConnectionHandle>,
    identity: &'a SessionIdentity,
}

impl<'a> Outbox<'a> {
    fn new(handle: Option<&'a ConnectionHandle>, identity: &'a IdentityStore) -> Self {
        Self {
            handle,
            identity: identity.identity(),
        }
    }
}

impl MessageSender for Outbox<'_> {
    fn is_open(&self) -> bool {
        self.handle.is_some_and(ConnectionHandle::is_open)
    }

    fn send(&self, message: PlayerMessage) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        handle.send_envelope(OutboundEnvelope {
            player_id: self.identity.player_id.clone(),
            device_id: self.identity.device_id.clone(),
            team_name: self.identity.team_name.clone().unwrap_or_default(),
            message,
            timestamp: Utc::now().timestamp_millis(),
        })
    }
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// Everything the connection events act on
struct PlayerState {
    session: PlayerSession,
    presence: PresenceReporter,
    identity: IdentityStore,
    handle: Option<ConnectionHandle>,
    photo: Option<String>,
    buzzer: Option<String>,
    /// Team name from config, joined on first connect
    pending_team: Option<String>,
    has_connected: bool,
    terminal_error: Option<String>,
    events: Vec<SessionEvent>,
    now: Instant,
    wall_ms: i64,
}

impl PlayerState {
    fn join_team(&mut self, team_name: &str) -> bool {
        if let Err(e) = self.identity.remember_team(team_name) {
            warn!(error = %e, "[PLAYER] Could not persist team name");
        }
        let outbox = Outbox::new(self.handle.as_ref(), &self.identity);
        let sent = self
            .session
            .submit_team_name(team_name, self.photo.clone(), &outbox);
        info!(team = %team_name.trim(), sent, "[PLAYER] Joining");
        sent
    }

    /// Presence only runs once the player is actually in the game
    fn sync_presence(&mut self) {
        let should_attach =
            self.has_connected && self.session.is_approved() && self.session.team_name().is_some();
        if should_attach && !self.presence.is_attached() {
            self.presence.attach();
        } else if !should_attach && self.presence.is_attached() {
            self.presence.detach();
        }
    }

    fn advance(&mut self) {
        self.sync_presence();
        let events = self.session.tick(self.now);
        self.events.extend(events);

        let outbox = Outbox::new(self.handle.as_ref(), &self.identity);
        self.presence.tick(self.now, self.wall_ms, &outbox);
    }
}

impl ConnectionHandler for PlayerState {
    fn on_message(&mut self, message: HostMessage) {
        let events = self.session.handle_message(message, self.now);
        for event in &events {
            if let SessionEvent::IdentityCleared { .. } = event {
                if let Err(e) = self.identity.forget_team() {
                    warn!(error = %e, "[PLAYER] Could not clear cached team name");
                }
            }
        }
        self.events.extend(events);
    }

    fn on_connect(&mut self, handle: &ConnectionHandle) {
        info!(reconnect = self.has_connected, "[PLAYER] Connected");
        self.handle = Some(handle.clone());
        self.terminal_error = None;

        if self.session.team_name().is_some() {
            let outbox = Outbox::new(self.handle.as_ref(), &self.identity);
            self.session.rejoin(self.photo.clone(), &outbox);
        } else if let Some(team) = self.pending_team.take() {
            self.join_team(&team);
        }

        let outbox = Outbox::new(self.handle.as_ref(), &self.identity);
        if self.session.team_name().is_some() {
            if let Some(buzzer) = &self.buzzer {
                self.session.select_buzzer(buzzer, &outbox);
            }
        }
        if self.has_connected {
            self.presence.flush_on_reconnect(self.now, &outbox);
        }
        self.has_connected = true;
    }

    fn on_disconnect(&mut self, reason: &str) {
        warn!(reason = %reason, "[PLAYER] Disconnected");
    }

    fn on_reconnecting(&mut self, attempt: u32, delay: std::time::Duration) {
        debug!(attempt, delay_ms = delay.as_millis() as u64, "[PLAYER] Waiting to reconnect");
    }

    fn on_terminal_error(&mut self, error: &str) {
        error!(error = %error, "[PLAYER] Connection lost for good");
        self.terminal_error = Some(error.to_string());
    }
}

// =============================================================================
// PLAYER CLIENT
// =============================================================================

pub struct PlayerClient {
    connection: ConnectionManager,
    state: PlayerState,
}

impl PlayerClient {
    pub fn new(config: Config) -> Result<Self, ClientError> {
        info!("Initializing PlayerClient...");

        let identity = IdentityStore::load_or_create(&config.player.identity_file)?;
        let mut session = PlayerSession::new(config.timing.to_settings());
        if let Some(team) = identity.team_name() {
            info!(team = %team, "[PLAYER] Restored cached team");
            session.restore_team(team.to_string());
        }

        let photo = match config.player.photo_path.as_str() {
            "" => None,
            path => match load_photo(Path::new(path)) {
                Ok(photo) => Some(photo),
                Err(e) => {
                    warn!(error = %e, path = %path, "[PLAYER] Ignoring team photo");
                    None
                }
            },
        };

        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());
        let pending_team = if identity.team_name().is_none() {
            non_empty(&config.player.team_name)
        } else {
            None
        };

        let connection = ConnectionManager::new(
            Discovery::from_settings(&config.server),
            config.server.reconnect_policy(),
        );

        Ok(Self {
            connection,
            state: PlayerState {
                session,
                presence: PresenceReporter::new(config.presence.to_settings()),
                identity,
                handle: None,
                photo,
                buzzer: non_empty(&config.player.buzzer),
                pending_team,
                has_connected: false,
                terminal_error: None,
                events: Vec::new(),
                now: Instant::now(),
                wall_ms: Utc::now().timestamp_millis(),
            },
        })
    }

    pub fn start(&mut self) {
        self.connection.start();
    }

    /// Process connection events and fire due timers
    pub fn update(&mut self) -> Vec<SessionEvent> {
        self.update_at(Instant::now(), Utc::now().timestamp_millis())
    }

    pub fn update_at(&mut self, now: Instant, wall_ms: i64) -> Vec<SessionEvent> {
        self.state.now = now;
        self.state.wall_ms = wall_ms;
        self.connection.pump(&mut self.state);
        self.state.advance();
        std::mem::take(&mut self.state.events)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.session.snapshot()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Set once reconnection gave up
    pub fn terminal_error(&self) -> Option<&str> {
        self.state.terminal_error.as_deref()
    }

    pub fn identity(&self) -> &SessionIdentity {
        self.state.identity.identity()
    }

    // -------------------------------------------------------------------------
    // User actions
    // -------------------------------------------------------------------------

    pub fn submit_team_name(&mut self, team_name: &str) -> bool {
        if team_name.trim().is_empty() {
            return false;
        }
        self.state.pending_team = None;
        self.state.join_team(team_name)
    }

    pub fn submit_answer(&mut self, value: AnswerValue) -> SubmitOutcome {
        let state = &mut self.state;
        let outbox = Outbox::new(state.handle.as_ref(), &state.identity);
        let outcome = state
            .session
            .submit_answer(value, Utc::now().timestamp_millis(), &outbox);
        info!(outcome = ?outcome, "[PLAYER] Answer");
        outcome
    }

    pub fn select_buzzer(&mut self, buzzer: &str) -> bool {
        let state = &mut self.state;
        state.buzzer = Some(buzzer.to_string());
        let outbox = Outbox::new(state.handle.as_ref(), &state.identity);
        state.session.select_buzzer(buzzer, &outbox)
    }

    /// Load, encode and send a new team photo
    pub fn update_team_photo(&mut self, path: &Path) -> Result<bool, PhotoError> {
        let photo = load_photo(path)?;
        let state = &mut self.state;
        state.photo = Some(photo.clone());
        let outbox = Outbox::new(state.handle.as_ref(), &state.identity);
        Ok(state.session.update_team_photo(photo, &outbox))
    }

    pub fn report_visibility(&mut self, visible: bool) {
        self.state.presence.report_visibility(visible, Instant::now());
    }

    pub fn report_focus(&mut self, focused: bool) {
        self.state.presence.report_focus(focused, Instant::now());
    }

    pub fn shutdown(&mut self) {
        info!("[PLAYER] Shutting down");
        self.state.presence.detach();
        self.state.session.cancel_timers();
        self.connection.stop();
    }
}

impl Drop for PlayerClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// TESTS
// =============================================================================
