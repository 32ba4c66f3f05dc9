//! Player session - the protocol state machine
//!
//! PlayerSession consumes typed host messages and local user actions and
//! drives the screen phase plus the question, timer, reveal and overlay state
//! the renderer reads. It owns no socket and no clock: callers pass `now` in,
//! and outbound messages go through a [`MessageSender`]. Delayed work lives in
//! [`OneShot`]s that `tick` fires and newer host state cancels.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::constants::{
    APPROVAL_DISPLAY_DELAY, FASTEST_OVERLAY_DURATION, GO_WIDE_CAP, LOCK_GRACE,
};
use crate::core::evaluator::is_correct;
use crate::core::io_traits::MessageSender;
use crate::core::protocol::{
    AnswerPayload, DisplayContent, FastestPayload, GameSnapshot, HostMessage, PlayerMessage,
    QuestionPayload, RevealPayload, ScorePayload, TeamApprovedPayload, TeamDeclinedPayload,
};
use crate::core::schedule::OneShot;
use crate::core::timer::TimerSync;
use crate::core::types::{
    AnswerValue, GamePhase, Question, QuestionType, SubmittedAnswer, TimerState,
};

// =============================================================================
// SETTINGS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingSettings {
    /// Delay between "time up" on screen and input lock
    pub lock_grace: Duration,
    /// Approval screen dwell before the display screen
    pub approval_display_delay: Duration,
    pub fastest_overlay: Duration,
    pub go_wide_cap: usize,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            lock_grace: LOCK_GRACE,
            approval_display_delay: APPROVAL_DISPLAY_DELAY,
            fastest_overlay: FASTEST_OVERLAY_DURATION,
            go_wide_cap: GO_WIDE_CAP,
        }
    }
}

// =============================================================================
// SESSION EVENTS
// =============================================================================

/// Events emitted by PlayerSession for the client layer and logging
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged { from: GamePhase, to: GamePhase },
    /// Host let the team in. `late_join` when a game snapshot came with it.
    Approved { late_join: bool },
    /// Host declined the team; the cached team name must be forgotten
    IdentityCleared { reason: Option<String> },
    QuestionShown(QuestionType),
    TimerStarted { duration: u32 },
    InputLocked,
    /// `correct` is `None` when nothing was submitted
    Revealed { correct: Option<bool> },
    FastestShown(String),
    FastestCleared,
    ScoreChanged(i64),
    GoWideDisabled,
}

/// Result of a local answer submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Sent,
    /// Link was down; the answer was not delivered and will not be retried
    SendFailed,
    NoQuestion,
    Locked,
    Empty,
    /// Go-wide selection already made
    AlreadySelected,
    /// Go-wide cap reached
    GoWideFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalState {
    None,
    Pending,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FastestTeam {
    pub team_name: String,
    pub response_time: Option<u64>,
}

/// Read-only view for the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: GamePhase,
    pub approval: ApprovalState,
    pub team_name: Option<String>,
    pub question: Option<Question>,
    pub timer: TimerState,
    pub submitted: Option<SubmittedAnswer>,
    pub answer_correct: Option<bool>,
    pub delivery_failed: bool,
    pub display: Option<DisplayContent>,
    pub fastest: Option<FastestTeam>,
    pub score: Option<i64>,
}

// =============================================================================
// PLAYER SESSION
// =============================================================================

pub struct PlayerSession {
    timing: TimingSettings,
    phase: GamePhase,
    approval: ApprovalState,
    team_name: Option<String>,

    question: Option<Question>,
    /// Question type as it was when the question was shown; reveal grades
    /// against this even if the question is mutated afterwards
    shown_type: Option<QuestionType>,
    timer: TimerSync,
    /// Snapshot of what the host actually received
    submission: Option<SubmittedAnswer>,
    answer_correct: Option<bool>,
    delivery_failed: bool,

    display: Option<DisplayContent>,
    fastest: Option<FastestTeam>,
    score: Option<i64>,

    approval_advance: OneShot,
    display_transition: OneShot<DisplayContent>,
    lock_grace: OneShot,
    fastest_clear: OneShot,
}

impl PlayerSession {
    pub fn new(timing: TimingSettings) -> Self {
        Self {
            timing,
            phase: GamePhase::TeamEntry,
            approval: ApprovalState::None,
            team_name: None,
            question: None,
            shown_type: None,
            timer: TimerSync::new(),
            submission: None,
            answer_correct: None,
            delivery_failed: false,
            display: None,
            fastest: None,
            score: None,
            approval_advance: OneShot::new(),
            display_transition: OneShot::new(),
            lock_grace: OneShot::new(),
            fastest_clear: OneShot::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn approval(&self) -> ApprovalState {
        self.approval
    }

    pub fn is_approved(&self) -> bool {
        self.approval == ApprovalState::Approved
    }

    pub fn team_name(&self) -> Option<&str> {
        self.team_name.as_deref()
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn timer(&self) -> &TimerState {
        self.timer.state()
    }

    pub fn submission(&self) -> Option<&SubmittedAnswer> {
        self.submission.as_ref()
    }

    pub fn answer_correct(&self) -> Option<bool> {
        self.answer_correct
    }

    pub fn delivery_failed(&self) -> bool {
        self.delivery_failed
    }

    pub fn display(&self) -> Option<&DisplayContent> {
        self.display.as_ref()
    }

    pub fn fastest(&self) -> Option<&FastestTeam> {
        self.fastest.as_ref()
    }

    pub fn score(&self) -> Option<i64> {
        self.score
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            approval: self.approval,
            team_name: self.team_name.clone(),
            question: self.question.clone(),
            timer: self.timer.state().clone(),
            submitted: self.submission.clone(),
            answer_correct: self.answer_correct,
            delivery_failed: self.delivery_failed,
            display: self.display.clone(),
            fastest: self.fastest.clone(),
            score: self.score,
        }
    }

    // -------------------------------------------------------------------------
    // Host messages
    // -------------------------------------------------------------------------

    /// Apply one host message. Messages must be fed in delivery order.
    pub fn handle_message(&mut self, message: HostMessage, now: Instant) -> Vec<SessionEvent> {
        debug!(kind = message.kind(), phase = ?self.phase, "[SESSION] Host message");
        let mut events = Vec::new();
        match message {
            HostMessage::TeamApproved(p) => self.on_team_approved(p, now, &mut events),
            HostMessage::ApprovalPending => {
                self.approval = ApprovalState::Pending;
                self.set_phase(GamePhase::Approval, &mut events);
            }
            HostMessage::TeamDeclined(p) => self.on_team_declined(p, &mut events),
            HostMessage::Question(p) => self.on_question(p, &mut events),
            HostMessage::TimerStart(p) => {
                self.lock_grace.cancel();
                self.timer.unlock();
                self.timer.start(p.duration, p.start_time, now);
                events.push(SessionEvent::TimerStarted {
                    duration: p.duration,
                });
            }
            HostMessage::Timer(p) => self.timer.apply_remaining(p.remaining),
            HostMessage::TimeUp => {
                self.timer.expire();
                if let Some(q) = self.question.as_mut() {
                    q.image = None;
                }
                self.schedule_lock(now);
            }
            HostMessage::Lock => {
                self.timer.stop();
                self.schedule_lock(now);
            }
            HostMessage::Reveal(p) => self.on_reveal(p, &mut events),
            HostMessage::Next => self.on_next(&mut events),
            HostMessage::Picture(p) => match self.question.as_mut() {
                Some(q) => q.image = Some(p.image),
                None => debug!("[SESSION] PICTURE without a question, ignored"),
            },
            HostMessage::Display(d) => self.on_display(d, now, &mut events),
            HostMessage::Fastest(p) => self.on_fastest(p, now, &mut events),
            HostMessage::AutoDisableGoWide => {
                if let Some(q) = self.question.as_mut().filter(|q| q.go_wide_enabled) {
                    q.go_wide_enabled = false;
                    events.push(SessionEvent::GoWideDisabled);
                }
            }
            HostMessage::ScoreUpdate(p) => self.on_score(p, &mut events),
        }
        events
    }

    fn on_team_approved(
        &mut self,
        payload: TeamApprovedPayload,
        now: Instant,
        events: &mut Vec<SessionEvent>,
    ) {
        let was_in_game = self.is_approved() && !self.phase.is_pre_game();
        self.approval = ApprovalState::Approved;
        self.approval_advance.cancel();

        match payload.current_game_state {
            Some(snapshot) => {
                info!("[SESSION] Approved mid-game, resynchronising");
                self.resync(snapshot, now, events);
                events.push(SessionEvent::Approved { late_join: true });
            }
            None if was_in_game && self.phase != GamePhase::Approval => {
                debug!("[SESSION] Repeated approval while in game, phase kept");
            }
            None => {
                info!("[SESSION] Team approved");
                self.set_phase(GamePhase::Approval, events);
                self.approval_advance
                    .schedule(now + self.timing.approval_display_delay, ());
                events.push(SessionEvent::Approved { late_join: false });
            }
        }
    }

    /// Seed question and timer state from a late-joiner snapshot
    fn resync(&mut self, snapshot: GameSnapshot, now: Instant, events: &mut Vec<SessionEvent>) {
        self.display_transition.cancel();
        match snapshot.current_question {
            Some(payload) => {
                let incoming = Question::from(payload.clone());
                if self.is_same_question(&incoming) {
                    // Reconnect on the same question: the host still holds our answer
                    debug!("[SESSION] Snapshot matches current question, answer kept");
                    self.lock_grace.cancel();
                    self.timer.reset();
                } else {
                    self.install_question(payload);
                }
                if let Some(q) = self.question.as_mut() {
                    q.revealed = snapshot.is_revealed;
                    q.revealed_answer = snapshot.revealed_answer;
                }
                self.answer_correct = if snapshot.is_revealed {
                    self.grade()
                } else {
                    None
                };
                if let Some(t) = snapshot.timer_state {
                    self.timer
                        .resume(t.total_time, t.time_remaining, t.is_running, t.start_time, now);
                }
                if snapshot.is_locked {
                    self.timer.lock();
                }
                self.set_phase(GamePhase::Question, events);
            }
            None => self.set_phase(GamePhase::Display, events),
        }
    }

    fn on_team_declined(&mut self, payload: TeamDeclinedPayload, events: &mut Vec<SessionEvent>) {
        warn!(reason = ?payload.reason, "[SESSION] Team declined");
        self.approval = ApprovalState::None;
        self.approval_advance.cancel();
        self.team_name = None;
        self.set_phase(GamePhase::Declined, events);
        events.push(SessionEvent::IdentityCleared {
            reason: payload.reason,
        });
    }

    fn on_question(&mut self, payload: QuestionPayload, events: &mut Vec<SessionEvent>) {
        // Newer authoritative state beats any pending ambient transition
        self.approval_advance.cancel();
        self.display_transition.cancel();

        let incoming = Question::from(payload.clone());
        if self.phase == GamePhase::Question && self.is_redelivery(&incoming) {
            debug!("[SESSION] Duplicate QUESTION, state kept");
            return;
        }

        self.install_question(payload);
        info!(question_type = %incoming.question_type, "[SESSION] Question");
        self.set_phase(GamePhase::Question, events);
        events.push(SessionEvent::QuestionShown(incoming.question_type));
    }

    fn is_same_question(&self, other: &Question) -> bool {
        self.question.as_ref().is_some_and(|q| {
            q.question_type == other.question_type
                && q.number == other.number
                && q.text == other.text
                && q.options == other.options
                && q.is_placeholder == other.is_placeholder
        })
    }

    /// Same content and nothing has happened to it since it arrived
    fn is_redelivery(&self, other: &Question) -> bool {
        self.is_same_question(other)
            && self.question.as_ref().is_some_and(|q| !q.revealed)
            && !self.timer.is_locked()
            && !self.lock_grace.is_pending()
    }

    fn install_question(&mut self, payload: QuestionPayload) {
        self.lock_grace.cancel();
        self.timer.reset();
        self.submission = None;
        self.answer_correct = None;
        self.delivery_failed = false;
        self.shown_type = Some(payload.question_type);
        self.question = Some(payload.into());
    }

    fn schedule_lock(&mut self, now: Instant) {
        if self.timer.is_locked() {
            return;
        }
        self.lock_grace.schedule_once(now + self.timing.lock_grace);
    }

    fn on_reveal(&mut self, payload: RevealPayload, events: &mut Vec<SessionEvent>) {
        let Some(question) = self.question.as_mut() else {
            debug!("[SESSION] REVEAL without a question, ignored");
            return;
        };
        question.revealed = true;
        question.revealed_answer = payload.answer;

        let correct = self.grade();
        self.answer_correct = correct;
        info!(correct = ?correct, "[SESSION] Answer revealed");
        events.push(SessionEvent::Revealed { correct });
    }

    /// Grade the stored submission against the revealed answer
    fn grade(&self) -> Option<bool> {
        let revealed = self.question.as_ref()?.revealed_answer.as_ref();
        self.submission
            .as_ref()
            .map(|s| is_correct(Some(s.into()), revealed, self.shown_type))
    }

    fn on_next(&mut self, events: &mut Vec<SessionEvent>) {
        self.lock_grace.cancel();
        self.display_transition.cancel();
        self.approval_advance.cancel();
        self.question = None;
        self.shown_type = None;
        self.timer.reset();
        self.submission = None;
        self.answer_correct = None;
        self.delivery_failed = false;
        self.set_phase(GamePhase::ReadyForQuestion, events);
    }

    fn on_display(&mut self, content: DisplayContent, now: Instant, events: &mut Vec<SessionEvent>) {
        if self.phase.is_game_screen() {
            debug!(phase = ?self.phase, "[SESSION] Display content ignored during game");
            return;
        }
        if self.phase.is_pre_game() {
            self.display = Some(content);
            return;
        }
        self.approval_advance.cancel();
        match content.delay {
            Some(delay) => {
                debug!(delay_ms = delay.as_millis() as u64, "[SESSION] Display transition scheduled");
                self.display_transition.schedule(now + delay, content);
            }
            None => {
                self.display_transition.cancel();
                self.apply_display(content, events);
            }
        }
    }

    fn apply_display(&mut self, content: DisplayContent, events: &mut Vec<SessionEvent>) {
        self.display = Some(content);
        self.set_phase(GamePhase::Display, events);
    }

    fn on_fastest(&mut self, payload: FastestPayload, now: Instant, events: &mut Vec<SessionEvent>) {
        events.push(SessionEvent::FastestShown(payload.team_name.clone()));
        self.fastest = Some(FastestTeam {
            team_name: payload.team_name,
            response_time: payload.response_time,
        });
        self.fastest_clear
            .schedule(now + self.timing.fastest_overlay, ());
    }

    fn on_score(&mut self, payload: ScorePayload, events: &mut Vec<SessionEvent>) {
        let ours = match (&payload.team_name, &self.team_name) {
            (None, _) => true,
            (Some(theirs), Some(mine)) => theirs.trim().eq_ignore_ascii_case(mine.trim()),
            (Some(_), None) => false,
        };
        if ours && self.score != Some(payload.score) {
            self.score = Some(payload.score);
            events.push(SessionEvent::ScoreChanged(payload.score));
        }
    }

    fn set_phase(&mut self, to: GamePhase, events: &mut Vec<SessionEvent>) {
        if self.phase == to {
            return;
        }
        let from = self.phase;
        self.phase = to;
        info!(from = ?from, to = ?to, "[SESSION] Phase");
        events.push(SessionEvent::PhaseChanged { from, to });
    }

    // -------------------------------------------------------------------------
    // Scheduled work
    // -------------------------------------------------------------------------

    /// Fire due one-shots and advance the local countdown
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        if self.approval_advance.take_due(now).is_some() && self.phase == GamePhase::Approval {
            self.set_phase(GamePhase::Display, &mut events);
        }
        if let Some(content) = self.display_transition.take_due(now) {
            if !self.phase.is_game_screen() {
                self.apply_display(content, &mut events);
            }
        }
        if self.lock_grace.take_due(now).is_some() {
            self.timer.lock();
            info!("[SESSION] Input locked");
            events.push(SessionEvent::InputLocked);
        }
        if self.fastest_clear.take_due(now).is_some() {
            self.fastest = None;
            events.push(SessionEvent::FastestCleared);
        }
        self.timer.tick(now);

        events
    }

    /// Drop every pending one-shot (session teardown)
    pub fn cancel_timers(&mut self) {
        self.approval_advance.cancel();
        self.display_transition.cancel();
        self.lock_grace.cancel();
        self.fastest_clear.cancel();
    }

    // -------------------------------------------------------------------------
    // User actions
    // -------------------------------------------------------------------------

    /// Restore a cached team name without contacting the host
    pub fn restore_team(&mut self, team_name: String) {
        self.team_name = Some(team_name);
    }

    /// Submit a team name and ask to join
    pub fn submit_team_name<S: MessageSender + ?Sized>(
        &mut self,
        team_name: &str,
        photo: Option<String>,
        sender: &S,
    ) -> bool {
        let team_name = team_name.trim();
        if team_name.is_empty() {
            return false;
        }
        self.team_name = Some(team_name.to_string());
        self.approval = ApprovalState::None;
        let mut events = Vec::new();
        self.set_phase(GamePhase::Waiting, &mut events);
        self.send_join(photo, false, sender)
    }

    /// Re-announce a cached team after (re)connecting
    pub fn rejoin<S: MessageSender + ?Sized>(&mut self, photo: Option<String>, sender: &S) -> bool {
        if self.team_name.is_none() {
            return false;
        }
        if self.phase == GamePhase::TeamEntry {
            let mut events = Vec::new();
            self.set_phase(GamePhase::Waiting, &mut events);
        }
        self.send_join(photo, true, sender)
    }

    fn send_join<S: MessageSender + ?Sized>(
        &self,
        photo: Option<String>,
        rejoin: bool,
        sender: &S,
    ) -> bool {
        let sent = sender.is_open() && sender.send(PlayerMessage::PlayerJoin { photo, rejoin });
        if !sent {
            warn!(rejoin, "[SESSION] Join not sent, link down");
        }
        sent
    }

    /// Submit an answer for the current question.
    ///
    /// `submitted_at_ms` is local wall-clock time; latency is measured against
    /// the host's timer start. A failed send is flagged once and not retried.
    pub fn submit_answer<S: MessageSender + ?Sized>(
        &mut self,
        value: AnswerValue,
        submitted_at_ms: i64,
        sender: &S,
    ) -> SubmitOutcome {
        let Some(question) = self.question.as_ref().filter(|_| self.phase == GamePhase::Question)
        else {
            return SubmitOutcome::NoQuestion;
        };
        if self.timer.is_locked() || question.revealed {
            return SubmitOutcome::Locked;
        }
        if value.is_blank() {
            return SubmitOutcome::Empty;
        }

        let question_type = self.shown_type.unwrap_or(question.question_type);
        let go_wide = question.go_wide_enabled;

        let all_answers = if go_wide {
            let mut all = self
                .submission
                .as_ref()
                .map(|s| s.all_answers.clone())
                .unwrap_or_default();
            let candidate = value.to_string();
            if all
                .iter()
                .any(|a| a.trim().eq_ignore_ascii_case(candidate.trim()))
            {
                return SubmitOutcome::AlreadySelected;
            }
            if all.len() >= self.timing.go_wide_cap {
                return SubmitOutcome::GoWideFull;
            }
            all.push(candidate);
            all
        } else {
            Vec::new()
        };

        let snapshot = SubmittedAnswer {
            value: value.clone(),
            question_type: Some(question_type),
            all_answers: all_answers.clone(),
        };
        let message = PlayerMessage::PlayerAnswer(AnswerPayload {
            answer: value,
            question_type,
            all_answers: go_wide.then_some(all_answers),
            go_wide,
            response_time: self.timer.response_latency(submitted_at_ms),
        });

        if sender.is_open() && sender.send(message) {
            self.submission = Some(snapshot);
            self.delivery_failed = false;
            SubmitOutcome::Sent
        } else {
            warn!("[SESSION] Answer not delivered, link down");
            self.delivery_failed = true;
            SubmitOutcome::SendFailed
        }
    }

    pub fn select_buzzer<S: MessageSender + ?Sized>(&self, buzzer: &str, sender: &S) -> bool {
        sender.is_open()
            && sender.send(PlayerMessage::PlayerBuzzerSelect {
                buzzer: buzzer.to_string(),
            })
    }

    pub fn update_team_photo<S: MessageSender + ?Sized>(&self, photo: String, sender: &S) -> bool {
        if self.team_name.is_none() {
            return false;
        }
        sender.is_open() && sender.send(PlayerMessage::TeamPhotoUpdate { photo })
    }
}

impl Default for PlayerSession {
    fn default() -> Self {
        Self::new(TimingSettings::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io_traits::mocks::MockSender;
    use crate::core::protocol::{
        DisplayKind, PicturePayload, TimerPayload, TimerSnapshot, TimerStartPayload,
    };
    use serde_json::Value;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn question(t: QuestionType, text: &str) -> HostMessage {
        HostMessage::Question(QuestionPayload {
            question_type: t,
            number: None,
            text: Some(text.to_string()),
            is_placeholder: false,
            options: Vec::new(),
            image: None,
            go_wide_enabled: false,
        })
    }

    fn go_wide_question() -> HostMessage {
        HostMessage::Question(QuestionPayload {
            question_type: QuestionType::MultipleChoice,
            number: Some(3),
            text: Some("Pick two".to_string()),
            is_placeholder: false,
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            image: None,
            go_wide_enabled: true,
        })
    }

    fn placeholder_question() -> HostMessage {
        HostMessage::Question(QuestionPayload {
            question_type: QuestionType::Letters,
            number: None,
            text: None,
            is_placeholder: true,
            options: Vec::new(),
            image: None,
            go_wide_enabled: false,
        })
    }

    fn approved() -> HostMessage {
        HostMessage::TeamApproved(TeamApprovedPayload::default())
    }

    fn display(delay: Option<Duration>) -> HostMessage {
        HostMessage::Display(DisplayContent {
            kind: DisplayKind::Mode,
            mode: Some("leaderboard".to_string()),
            delay,
            content: Value::Null,
        })
    }

    fn reveal(answer: AnswerValue) -> HostMessage {
        HostMessage::Reveal(RevealPayload {
            answer: Some(answer),
        })
    }

    fn timer_start(duration: u32, start: Option<i64>) -> HostMessage {
        HostMessage::TimerStart(TimerStartPayload {
            duration,
            start_time: start,
        })
    }

    /// Session that has joined and sits on a question
    fn in_question(t: QuestionType, now: Instant) -> PlayerSession {
        let mut s = PlayerSession::default();
        s.handle_message(approved(), now);
        s.handle_message(question(t, "Q1"), now);
        s
    }

    // -------------------------------------------------------------------------
    // Joining
    // -------------------------------------------------------------------------

    #[test]
    fn test_starts_on_team_entry() {
        let s = PlayerSession::default();
        assert_eq!(s.phase(), GamePhase::TeamEntry);
        assert_eq!(s.approval(), ApprovalState::None);
    }

    #[test]
    fn test_submit_team_name_waits_and_joins() {
        let sender = MockSender::new();
        let mut s = PlayerSession::default();

        assert!(s.submit_team_name("  Quizzards ", None, &sender));
        assert_eq!(s.phase(), GamePhase::Waiting);
        assert_eq!(s.team_name(), Some("Quizzards"));
        assert_eq!(
            sender.last(),
            Some(PlayerMessage::PlayerJoin {
                photo: None,
                rejoin: false
            })
        );
    }

    #[test]
    fn test_blank_team_name_rejected() {
        let sender = MockSender::new();
        let mut s = PlayerSession::default();
        assert!(!s.submit_team_name("   ", None, &sender));
        assert_eq!(s.phase(), GamePhase::TeamEntry);
        assert_eq!(sender.sent_count(), 0);
    }

    #[test]
    fn test_rejoin_uses_cached_team() {
        let sender = MockSender::new();
        let mut s = PlayerSession::default();
        assert!(!s.rejoin(None, &sender));

        s.restore_team("Quizzards".to_string());
        assert!(s.rejoin(None, &sender));
        assert_eq!(s.phase(), GamePhase::Waiting);
        assert_eq!(
            sender.last(),
            Some(PlayerMessage::PlayerJoin {
                photo: None,
                rejoin: true
            })
        );
    }

    #[test]
    fn test_approval_pending() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        s.handle_message(HostMessage::ApprovalPending, now);
        assert_eq!(s.phase(), GamePhase::Approval);
        assert_eq!(s.approval(), ApprovalState::Pending);
        // Pending approval never auto-advances
        s.tick(now + ms(10_000));
        assert_eq!(s.phase(), GamePhase::Approval);
    }

    #[test]
    fn test_declined_clears_identity() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = PlayerSession::default();
        s.submit_team_name("Taken", None, &sender);

        let events = s.handle_message(
            HostMessage::TeamDeclined(TeamDeclinedPayload {
                reason: Some("name in use".to_string()),
            }),
            now,
        );
        assert_eq!(s.phase(), GamePhase::Declined);
        assert_eq!(s.team_name(), None);
        assert!(events.contains(&SessionEvent::IdentityCleared {
            reason: Some("name in use".to_string())
        }));
    }

    // -------------------------------------------------------------------------
    // Approval auto-advance
    // -------------------------------------------------------------------------

    #[test]
    fn test_end_to_end_approval_then_question() {
        let now = Instant::now();
        let mut s = PlayerSession::default();

        s.handle_message(approved(), now);
        assert_eq!(s.phase(), GamePhase::Approval);

        s.tick(now + ms(1_999));
        assert_eq!(s.phase(), GamePhase::Approval);
        let events = s.tick(now + ms(2_000));
        assert_eq!(s.phase(), GamePhase::Display);
        assert!(events.contains(&SessionEvent::PhaseChanged {
            from: GamePhase::Approval,
            to: GamePhase::Display
        }));

        s.handle_message(question(QuestionType::Numbers, "How many?"), now + ms(3_000));
        assert_eq!(s.phase(), GamePhase::Question);
        assert!(!s.timer().locked);
        assert!(!s.question().unwrap().revealed);
    }

    #[test]
    fn test_question_cancels_approval_advance() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        s.handle_message(approved(), now);
        s.handle_message(question(QuestionType::Letters, "Q"), now + ms(500));
        s.tick(now + ms(5_000));
        assert_eq!(s.phase(), GamePhase::Question);
    }

    #[test]
    fn test_approval_advance_ignored_after_decline() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        s.handle_message(approved(), now);
        s.handle_message(
            HostMessage::TeamDeclined(TeamDeclinedPayload::default()),
            now + ms(100),
        );
        s.tick(now + ms(3_000));
        assert_eq!(s.phase(), GamePhase::Declined);
    }

    #[test]
    fn test_repeated_approval_keeps_game_screen() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(approved(), now + ms(100));
        assert_eq!(s.phase(), GamePhase::Question);
    }

    // -------------------------------------------------------------------------
    // Late joiners
    // -------------------------------------------------------------------------

    #[test]
    fn test_late_joiner_lands_on_question() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        let snapshot = GameSnapshot {
            current_question: Some(QuestionPayload {
                question_type: QuestionType::Letters,
                number: Some(4),
                text: Some("Capital of France?".to_string()),
                is_placeholder: false,
                options: Vec::new(),
                image: None,
                go_wide_enabled: false,
            }),
            timer_state: Some(TimerSnapshot {
                is_running: true,
                time_remaining: 17,
                total_time: 30,
                start_time: Some(1_000),
            }),
            ..Default::default()
        };

        let events = s.handle_message(
            HostMessage::TeamApproved(TeamApprovedPayload {
                current_game_state: Some(snapshot),
            }),
            now,
        );

        assert_eq!(s.phase(), GamePhase::Question);
        assert!(events.contains(&SessionEvent::Approved { late_join: true }));
        assert_eq!(s.timer().remaining, 17);
        assert_eq!(s.timer().total_length, 30);
        assert!(s.timer().running);
        assert_eq!(s.question().unwrap().number, Some(4));

        // No stray auto-advance to display
        s.tick(now + ms(2_500));
        assert_eq!(s.phase(), GamePhase::Question);
        assert_eq!(s.timer().remaining, 15);
    }

    #[test]
    fn test_late_joiner_without_question_goes_to_display() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        s.handle_message(
            HostMessage::TeamApproved(TeamApprovedPayload {
                current_game_state: Some(GameSnapshot::default()),
            }),
            now,
        );
        assert_eq!(s.phase(), GamePhase::Display);
    }

    #[test]
    fn test_late_joiner_locked_and_revealed() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = PlayerSession::default();
        let snapshot = GameSnapshot {
            current_question: Some(QuestionPayload {
                question_type: QuestionType::Numbers,
                number: None,
                text: None,
                is_placeholder: true,
                options: Vec::new(),
                image: None,
                go_wide_enabled: false,
            }),
            is_locked: true,
            is_revealed: true,
            revealed_answer: Some(AnswerValue::Number(12.0)),
            ..Default::default()
        };
        s.handle_message(
            HostMessage::TeamApproved(TeamApprovedPayload {
                current_game_state: Some(snapshot),
            }),
            now,
        );
        assert!(s.timer().locked);
        assert!(s.question().unwrap().revealed);
        assert_eq!(
            s.submit_answer(AnswerValue::from("12"), 0, &sender),
            SubmitOutcome::Locked
        );
    }

    #[test]
    fn test_reconnect_snapshot_keeps_answer() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(timer_start(30, Some(1_000)), now);
        s.submit_answer(AnswerValue::from("Paris"), 0, &sender);

        let snapshot = GameSnapshot {
            current_question: Some(QuestionPayload {
                question_type: QuestionType::Letters,
                number: None,
                text: Some("Q1".to_string()),
                is_placeholder: false,
                options: Vec::new(),
                image: None,
                go_wide_enabled: false,
            }),
            timer_state: Some(TimerSnapshot {
                is_running: true,
                time_remaining: 12,
                total_time: 30,
                start_time: Some(1_000),
            }),
            ..Default::default()
        };
        s.handle_message(
            HostMessage::TeamApproved(TeamApprovedPayload {
                current_game_state: Some(snapshot),
            }),
            now + ms(18_000),
        );
        assert_eq!(s.phase(), GamePhase::Question);
        assert_eq!(s.timer().remaining, 12);
        assert!(s.submission().is_some());

        s.handle_message(reveal(AnswerValue::from("paris")), now + ms(20_000));
        assert_eq!(s.answer_correct(), Some(true));
    }

    #[test]
    fn test_reconnect_snapshot_grades_revealed_answer() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.submit_answer(AnswerValue::from("Rome"), 0, &sender);

        let snapshot = GameSnapshot {
            current_question: Some(QuestionPayload {
                question_type: QuestionType::Letters,
                number: None,
                text: Some("Q1".to_string()),
                is_placeholder: false,
                options: Vec::new(),
                image: None,
                go_wide_enabled: false,
            }),
            is_locked: true,
            is_revealed: true,
            revealed_answer: Some(AnswerValue::from("Paris")),
            ..Default::default()
        };
        s.handle_message(
            HostMessage::TeamApproved(TeamApprovedPayload {
                current_game_state: Some(snapshot),
            }),
            now,
        );
        assert!(s.timer().locked);
        assert_eq!(s.answer_correct(), Some(false));
    }

    #[test]
    fn test_reconnect_snapshot_new_question_clears_answer() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.submit_answer(AnswerValue::from("Paris"), 0, &sender);

        let snapshot = GameSnapshot {
            current_question: Some(QuestionPayload {
                question_type: QuestionType::Numbers,
                number: None,
                text: Some("Q2".to_string()),
                is_placeholder: false,
                options: Vec::new(),
                image: None,
                go_wide_enabled: false,
            }),
            ..Default::default()
        };
        s.handle_message(
            HostMessage::TeamApproved(TeamApprovedPayload {
                current_game_state: Some(snapshot),
            }),
            now,
        );
        assert!(s.submission().is_none());
        assert_eq!(s.question().unwrap().question_type, QuestionType::Numbers);
    }

    // -------------------------------------------------------------------------
    // Timer and lock grace
    // -------------------------------------------------------------------------

    #[test]
    fn test_timer_start_does_not_change_phase() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        let events = s.handle_message(timer_start(30, Some(1_000)), now);
        assert_eq!(s.phase(), GamePhase::Question);
        assert!(s.timer().running);
        assert_eq!(s.timer().host_start_timestamp, Some(1_000));
        assert!(events.contains(&SessionEvent::TimerStarted { duration: 30 }));
    }

    #[test]
    fn test_timer_message_idempotent() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(timer_start(30, None), now);

        s.handle_message(HostMessage::Timer(TimerPayload { remaining: 21 }), now);
        let once = s.timer().clone();
        s.handle_message(HostMessage::Timer(TimerPayload { remaining: 21 }), now);
        assert_eq!(s.timer(), &once);
        assert_eq!(s.timer().remaining, 21);
    }

    #[test]
    fn test_local_countdown_free_runs() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(timer_start(10, None), now);
        s.tick(now + ms(3_000));
        assert_eq!(s.timer().remaining, 7);
    }

    #[test]
    fn test_timeup_grace_window() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(timer_start(30, None), now);

        s.handle_message(HostMessage::TimeUp, now + ms(30_000));
        assert!(!s.timer().running);
        assert_eq!(s.timer().remaining, 0);
        assert!(!s.timer().locked);

        s.tick(now + ms(30_999));
        assert!(!s.timer().locked);
        // Still accepting answers inside the grace window
        assert_eq!(
            s.submit_answer(AnswerValue::from("A"), 0, &sender),
            SubmitOutcome::Sent
        );

        let events = s.tick(now + ms(31_000));
        assert!(s.timer().locked);
        assert!(events.contains(&SessionEvent::InputLocked));
        assert_eq!(
            s.submit_answer(AnswerValue::from("B"), 0, &sender),
            SubmitOutcome::Locked
        );
    }

    #[test]
    fn test_question_during_grace_cancels_lock() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(HostMessage::TimeUp, now);
        s.handle_message(question(QuestionType::Numbers, "Q2"), now + ms(400));
        s.tick(now + ms(2_000));
        assert!(!s.timer().locked);
        assert_eq!(s.phase(), GamePhase::Question);
    }

    #[test]
    fn test_lock_message_also_deferred() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(timer_start(30, None), now);
        s.handle_message(HostMessage::Lock, now + ms(5_000));
        assert!(!s.timer().running);
        assert!(!s.timer().locked);
        assert_eq!(s.timer().remaining, 30);
        s.tick(now + ms(6_000));
        assert!(s.timer().locked);
    }

    #[test]
    fn test_repeated_timeup_does_not_extend_grace() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(HostMessage::TimeUp, now);
        s.handle_message(HostMessage::TimeUp, now + ms(800));
        s.tick(now + ms(1_000));
        assert!(s.timer().locked);
    }

    #[test]
    fn test_timeup_clears_image() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(
            HostMessage::Picture(PicturePayload {
                image: "pic.png".to_string(),
            }),
            now,
        );
        assert_eq!(s.question().unwrap().image.as_deref(), Some("pic.png"));
        s.handle_message(HostMessage::TimeUp, now);
        assert_eq!(s.question().unwrap().image, None);
    }

    #[test]
    fn test_timer_restart_unlocks() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(HostMessage::TimeUp, now);
        s.tick(now + ms(1_000));
        assert!(s.timer().locked);
        s.handle_message(timer_start(10, None), now + ms(2_000));
        assert!(!s.timer().locked);
    }

    // -------------------------------------------------------------------------
    // Answers and reveal
    // -------------------------------------------------------------------------

    #[test]
    fn test_answer_payload_carries_latency() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Numbers, now);
        s.handle_message(timer_start(30, Some(1_000)), now);

        assert_eq!(
            s.submit_answer(AnswerValue::from("07"), 3_500, &sender),
            SubmitOutcome::Sent
        );
        match sender.last().unwrap() {
            PlayerMessage::PlayerAnswer(p) => {
                assert_eq!(p.response_time, 2_500);
                assert_eq!(p.question_type, QuestionType::Numbers);
                assert!(!p.go_wide);
                assert_eq!(p.all_answers, None);
            }
            other => panic!("Expected PlayerAnswer, got {:?}", other),
        }
    }

    #[test]
    fn test_answer_before_timer_has_zero_latency() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.submit_answer(AnswerValue::from("A"), 99_999, &sender);
        match sender.last().unwrap() {
            PlayerMessage::PlayerAnswer(p) => assert_eq!(p.response_time, 0),
            other => panic!("Expected PlayerAnswer, got {:?}", other),
        }
    }

    #[test]
    fn test_reveal_uses_submission_snapshot() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Numbers, now);
        s.submit_answer(AnswerValue::from("07"), 0, &sender);

        let events = s.handle_message(reveal(AnswerValue::Number(7.0)), now);
        assert_eq!(s.answer_correct(), Some(true));
        assert!(events.contains(&SessionEvent::Revealed {
            correct: Some(true)
        }));
        let q = s.question().unwrap();
        assert!(q.revealed);
        assert_eq!(q.revealed_answer, Some(AnswerValue::Number(7.0)));
    }

    #[test]
    fn test_reveal_wrong_answer() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.submit_answer(AnswerValue::from("London"), 0, &sender);
        s.handle_message(reveal(AnswerValue::from("Paris")), now);
        assert_eq!(s.answer_correct(), Some(false));
    }

    #[test]
    fn test_reveal_without_submission() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        let events = s.handle_message(reveal(AnswerValue::from("Paris")), now);
        assert_eq!(s.answer_correct(), None);
        assert!(events.contains(&SessionEvent::Revealed { correct: None }));
    }

    #[test]
    fn test_reveal_is_idempotent() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.submit_answer(AnswerValue::from("paris"), 0, &sender);
        s.handle_message(reveal(AnswerValue::from("Paris")), now);
        let first = s.snapshot();
        s.handle_message(reveal(AnswerValue::from("Paris")), now);
        assert_eq!(s.snapshot(), first);
    }

    #[test]
    fn test_reveal_without_question_ignored() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        let events = s.handle_message(reveal(AnswerValue::from("A")), now);
        assert!(events.is_empty());
    }

    #[test]
    fn test_answer_after_reveal_locked() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(reveal(AnswerValue::from("A")), now);
        assert_eq!(
            s.submit_answer(AnswerValue::from("A"), 0, &sender),
            SubmitOutcome::Locked
        );
    }

    #[test]
    fn test_changing_answer_replaces_snapshot() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.submit_answer(AnswerValue::from("A"), 0, &sender);
        s.submit_answer(AnswerValue::from("B"), 0, &sender);
        assert_eq!(s.submission().unwrap().value, AnswerValue::from("B"));
        s.handle_message(reveal(AnswerValue::from("B")), now);
        assert_eq!(s.answer_correct(), Some(true));
    }

    #[test]
    fn test_send_failure_flagged_not_stored() {
        let now = Instant::now();
        let sender = MockSender::closed();
        let mut s = in_question(QuestionType::Letters, now);
        assert_eq!(
            s.submit_answer(AnswerValue::from("A"), 0, &sender),
            SubmitOutcome::SendFailed
        );
        assert!(s.delivery_failed());
        assert!(s.submission().is_none());
        assert_eq!(*sender.rejected.borrow(), 0);
    }

    #[test]
    fn test_empty_answer_rejected() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        assert_eq!(
            s.submit_answer(AnswerValue::from(""), 0, &sender),
            SubmitOutcome::Empty
        );
    }

    #[test]
    fn test_duplicate_question_keeps_answer() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.submit_answer(AnswerValue::from("A"), 0, &sender);
        let events = s.handle_message(question(QuestionType::Letters, "Q1"), now);
        assert!(events.is_empty());
        assert!(s.submission().is_some());
    }

    #[test]
    fn test_repeated_placeholder_after_reveal_resets() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = PlayerSession::default();
        s.handle_message(approved(), now);
        s.handle_message(placeholder_question(), now);
        s.submit_answer(AnswerValue::from("A"), 0, &sender);
        s.handle_message(HostMessage::TimeUp, now);
        s.tick(now + ms(1_000));
        assert!(s.timer().locked);
        s.handle_message(reveal(AnswerValue::from("A")), now + ms(2_000));

        // Next read-aloud question looks identical on the wire
        let events = s.handle_message(placeholder_question(), now + ms(3_000));
        assert!(events.contains(&SessionEvent::QuestionShown(QuestionType::Letters)));
        assert!(!s.timer().locked);
        assert!(!s.question().unwrap().revealed);
        assert!(s.submission().is_none());
        assert_eq!(s.answer_correct(), None);
        assert_eq!(
            s.submit_answer(AnswerValue::from("B"), 0, &sender),
            SubmitOutcome::Sent
        );
    }

    #[test]
    fn test_same_question_during_grace_resets() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.submit_answer(AnswerValue::from("A"), 0, &sender);
        s.handle_message(HostMessage::TimeUp, now);

        s.handle_message(question(QuestionType::Letters, "Q1"), now + ms(500));
        assert!(s.submission().is_none());
        s.tick(now + ms(2_000));
        assert!(!s.timer().locked);
    }

    #[test]
    fn test_new_question_resets_answer_state() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.submit_answer(AnswerValue::from("A"), 0, &sender);
        s.handle_message(reveal(AnswerValue::from("A")), now);
        s.handle_message(question(QuestionType::Numbers, "Q2"), now);
        assert!(s.submission().is_none());
        assert_eq!(s.answer_correct(), None);
        assert!(!s.question().unwrap().revealed);
    }

    // -------------------------------------------------------------------------
    // Go-wide
    // -------------------------------------------------------------------------

    #[test]
    fn test_go_wide_accumulates_up_to_cap() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = PlayerSession::default();
        s.handle_message(go_wide_question(), now);

        assert_eq!(
            s.submit_answer(AnswerValue::from("B"), 0, &sender),
            SubmitOutcome::Sent
        );
        assert_eq!(
            s.submit_answer(AnswerValue::from("b"), 0, &sender),
            SubmitOutcome::AlreadySelected
        );
        assert_eq!(
            s.submit_answer(AnswerValue::from("D"), 0, &sender),
            SubmitOutcome::Sent
        );
        assert_eq!(
            s.submit_answer(AnswerValue::from("A"), 0, &sender),
            SubmitOutcome::GoWideFull
        );
        assert_eq!(s.submission().unwrap().all_answers, vec!["B", "D"]);
        match sender.last().unwrap() {
            PlayerMessage::PlayerAnswer(p) => {
                assert!(p.go_wide);
                assert_eq!(p.all_answers, Some(vec!["B".to_string(), "D".to_string()]));
            }
            other => panic!("Expected PlayerAnswer, got {:?}", other),
        }
    }

    #[test]
    fn test_go_wide_reveal() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = PlayerSession::default();
        s.handle_message(go_wide_question(), now);
        s.submit_answer(AnswerValue::from("B"), 0, &sender);
        s.submit_answer(AnswerValue::from("D"), 0, &sender);

        s.handle_message(reveal(AnswerValue::from("D")), now);
        assert_eq!(s.answer_correct(), Some(true));
    }

    #[test]
    fn test_go_wide_reveal_miss() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = PlayerSession::default();
        s.handle_message(go_wide_question(), now);
        s.submit_answer(AnswerValue::from("B"), 0, &sender);
        s.submit_answer(AnswerValue::from("D"), 0, &sender);

        s.handle_message(reveal(AnswerValue::from("C")), now);
        assert_eq!(s.answer_correct(), Some(false));
    }

    #[test]
    fn test_auto_disable_go_wide() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        s.handle_message(go_wide_question(), now);
        let events = s.handle_message(HostMessage::AutoDisableGoWide, now);
        assert!(!s.question().unwrap().go_wide_enabled);
        assert_eq!(events, vec![SessionEvent::GoWideDisabled]);
        // Second delivery is a no-op
        assert!(s.handle_message(HostMessage::AutoDisableGoWide, now).is_empty());
    }

    // -------------------------------------------------------------------------
    // NEXT
    // -------------------------------------------------------------------------

    #[test]
    fn test_next_clears_everything() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(timer_start(30, Some(5)), now);
        s.submit_answer(AnswerValue::from("A"), 0, &sender);
        s.handle_message(HostMessage::TimeUp, now);

        s.handle_message(HostMessage::Next, now);
        assert_eq!(s.phase(), GamePhase::ReadyForQuestion);
        assert!(s.question().is_none());
        assert!(s.submission().is_none());
        assert_eq!(s.timer(), &TimerState::default());

        // Pending lock from TIMEUP must not fire
        s.tick(now + ms(2_000));
        assert!(!s.timer().locked);
        assert_eq!(
            s.submit_answer(AnswerValue::from("A"), 0, &sender),
            SubmitOutcome::NoQuestion
        );
    }

    // -------------------------------------------------------------------------
    // Display content
    // -------------------------------------------------------------------------

    #[test]
    fn test_display_ignored_during_question() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(display(None), now);
        assert_eq!(s.phase(), GamePhase::Question);
        assert!(s.display().is_none());
    }

    #[test]
    fn test_display_ignored_while_ready_for_question() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        s.handle_message(HostMessage::Next, now);
        s.handle_message(display(None), now);
        assert_eq!(s.phase(), GamePhase::ReadyForQuestion);
    }

    #[test]
    fn test_display_immediate_from_approval() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        s.handle_message(approved(), now);
        s.handle_message(display(None), now + ms(100));
        assert_eq!(s.phase(), GamePhase::Display);
        assert_eq!(s.display().unwrap().mode.as_deref(), Some("leaderboard"));
    }

    #[test]
    fn test_display_delayed() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        s.handle_message(approved(), now);
        s.handle_message(display(Some(ms(1_500))), now);
        s.tick(now + ms(1_000));
        assert_eq!(s.phase(), GamePhase::Approval);
        s.tick(now + ms(1_500));
        assert_eq!(s.phase(), GamePhase::Display);
    }

    #[test]
    fn test_question_cancels_delayed_display() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        s.handle_message(approved(), now);
        s.tick(now + ms(2_000));
        assert_eq!(s.phase(), GamePhase::Display);

        s.handle_message(display(Some(ms(1_000))), now + ms(2_100));
        s.handle_message(question(QuestionType::Letters, "Q"), now + ms(2_200));
        s.tick(now + ms(10_000));
        assert_eq!(s.phase(), GamePhase::Question);
    }

    #[test]
    fn test_display_before_approval_keeps_phase() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        s.handle_message(display(None), now);
        assert_eq!(s.phase(), GamePhase::TeamEntry);
        assert!(s.display().is_some());
    }

    // -------------------------------------------------------------------------
    // Overlays and score
    // -------------------------------------------------------------------------

    #[test]
    fn test_fastest_overlay_expires() {
        let now = Instant::now();
        let mut s = in_question(QuestionType::Letters, now);
        let events = s.handle_message(
            HostMessage::Fastest(FastestPayload {
                team_name: "Speedy".to_string(),
                response_time: Some(812),
            }),
            now,
        );
        assert!(events.contains(&SessionEvent::FastestShown("Speedy".to_string())));
        assert_eq!(s.phase(), GamePhase::Question);

        s.tick(now + ms(4_999));
        assert!(s.fastest().is_some());
        let events = s.tick(now + ms(5_000));
        assert!(s.fastest().is_none());
        assert!(events.contains(&SessionEvent::FastestCleared));
    }

    #[test]
    fn test_fastest_redelivery_restarts_overlay() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        let fastest = || {
            HostMessage::Fastest(FastestPayload {
                team_name: "Speedy".to_string(),
                response_time: None,
            })
        };
        s.handle_message(fastest(), now);
        s.handle_message(fastest(), now + ms(3_000));
        s.tick(now + ms(5_000));
        assert!(s.fastest().is_some());
        s.tick(now + ms(8_000));
        assert!(s.fastest().is_none());
    }

    #[test]
    fn test_score_update_for_own_team_only() {
        let now = Instant::now();
        let sender = MockSender::new();
        let mut s = PlayerSession::default();
        s.submit_team_name("Quizzards", None, &sender);

        s.handle_message(
            HostMessage::ScoreUpdate(ScorePayload {
                score: 10,
                team_name: Some("Other".to_string()),
            }),
            now,
        );
        assert_eq!(s.score(), None);

        let events = s.handle_message(
            HostMessage::ScoreUpdate(ScorePayload {
                score: 12,
                team_name: Some("quizzards".to_string()),
            }),
            now,
        );
        assert_eq!(s.score(), Some(12));
        assert_eq!(events, vec![SessionEvent::ScoreChanged(12)]);
    }

    // -------------------------------------------------------------------------
    // Other user actions
    // -------------------------------------------------------------------------

    #[test]
    fn test_buzzer_and_photo() {
        let sender = MockSender::new();
        let mut s = PlayerSession::default();
        assert!(s.select_buzzer("airhorn", &sender));
        assert!(!s.update_team_photo("data:image/png;base64,AA".to_string(), &sender));
        s.restore_team("Quizzards".to_string());
        assert!(s.update_team_photo("data:image/png;base64,AA".to_string(), &sender));
        assert_eq!(
            sender.kinds(),
            vec!["PLAYER_BUZZER_SELECT", "TEAM_PHOTO_UPDATE"]
        );
    }

    #[test]
    fn test_cancel_timers_on_teardown() {
        let now = Instant::now();
        let mut s = PlayerSession::default();
        s.handle_message(approved(), now);
        s.cancel_timers();
        s.tick(now + ms(5_000));
        assert_eq!(s.phase(), GamePhase::Approval);
    }
}
