//! WebSocket protocol types
//!
//! JSON envelopes exchanged between the player client and the quiz host.
//! Inbound messages are validated here, at the boundary: anything that does
//! not match its per-type schema becomes a [`ProtocolError`] and never reaches
//! the session state machine.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::types::{AnswerValue, Question, QuestionType};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown question type `{0}`")]
    QuestionType(String),
}

// =============================================================================
// PAYLOADS (host → player)
// =============================================================================

/// Question as sent by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default, alias = "questionNumber")]
    pub number: Option<u32>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "placeholder")]
    pub is_placeholder: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, alias = "imageUrl")]
    pub image: Option<String>,
    #[serde(default)]
    pub go_wide_enabled: bool,
}

impl From<QuestionPayload> for Question {
    fn from(p: QuestionPayload) -> Self {
        Question {
            question_type: p.question_type,
            number: p.number,
            text: p.text,
            is_placeholder: p.is_placeholder,
            options: p.options,
            image: p.image,
            go_wide_enabled: p.go_wide_enabled,
            revealed: false,
            revealed_answer: None,
        }
    }
}

/// Timer as embedded in a late-joiner snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    #[serde(default)]
    pub is_running: bool,
    pub time_remaining: u32,
    pub total_time: u32,
    #[serde(default)]
    pub start_time: Option<i64>,
}

/// Game state a late joiner needs to land directly on the right screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    #[serde(default)]
    pub current_question: Option<QuestionPayload>,
    #[serde(default, alias = "timer")]
    pub timer_state: Option<TimerSnapshot>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_revealed: bool,
    #[serde(default)]
    pub revealed_answer: Option<AnswerValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamApprovedPayload {
    #[serde(default, alias = "gameState")]
    pub current_game_state: Option<GameSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDeclinedPayload {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStartPayload {
    /// Countdown length in seconds
    #[serde(alias = "totalTime")]
    pub duration: u32,
    /// Host wall-clock start, epoch milliseconds. Falls back to the envelope
    /// timestamp when the payload omits it.
    #[serde(default)]
    pub start_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPayload {
    #[serde(alias = "timeRemaining")]
    pub remaining: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealPayload {
    #[serde(default, alias = "correctAnswer")]
    pub answer: Option<AnswerValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PicturePayload {
    #[serde(alias = "imageUrl", alias = "url")]
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastestPayload {
    pub team_name: String,
    #[serde(default)]
    pub response_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePayload {
    pub score: i64,
    #[serde(default)]
    pub team_name: Option<String>,
}

/// Which ambient message produced a display update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayKind {
    Mode,
    Update,
    Leaderboard,
    Slideshow,
}

/// Ambient display content. `content` keeps the raw payload for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayContent {
    pub kind: DisplayKind,
    pub mode: Option<String>,
    /// Host-requested delay before the display screen appears
    pub delay: Option<Duration>,
    pub content: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisplayHeader {
    #[serde(default, alias = "displayMode")]
    mode: Option<String>,
    #[serde(default, alias = "delay")]
    delay_ms: Option<u64>,
}

// =============================================================================
// HOST MESSAGES (host → player)
// =============================================================================

/// Every message type the player consumes, keyed by the envelope `type`
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    TeamApproved(TeamApprovedPayload),
    ApprovalPending,
    TeamDeclined(TeamDeclinedPayload),
    Question(QuestionPayload),
    TimerStart(TimerStartPayload),
    Timer(TimerPayload),
    TimeUp,
    Lock,
    Reveal(RevealPayload),
    Next,
    Picture(PicturePayload),
    Display(DisplayContent),
    Fastest(FastestPayload),
    AutoDisableGoWide,
    ScoreUpdate(ScorePayload),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    timestamp: Option<f64>,
}

fn payload<T: DeserializeOwned>(kind: &str, data: &Option<Value>) -> Result<T, ProtocolError> {
    let value = match data {
        Some(Value::Null) | None => Value::Object(Default::default()),
        Some(v) => v.clone(),
    };
    serde_json::from_value(value).map_err(|source| ProtocolError::Payload {
        kind: kind.to_string(),
        source,
    })
}

fn display(
    kind: DisplayKind,
    name: &str,
    data: Option<Value>,
) -> Result<HostMessage, ProtocolError> {
    let header: DisplayHeader = payload(name, &data)?;
    Ok(HostMessage::Display(DisplayContent {
        kind,
        mode: header.mode,
        delay: header
            .delay_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis),
        content: data.unwrap_or(Value::Null),
    }))
}

impl HostMessage {
    /// Parse one inbound text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let env: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::Envelope)?;
        let kind = env.kind.as_str();
        let msg = match kind {
            "TEAM_APPROVED" => HostMessage::TeamApproved(payload(kind, &env.data)?),
            "APPROVAL_PENDING" => HostMessage::ApprovalPending,
            "TEAM_DECLINED" => HostMessage::TeamDeclined(payload(kind, &env.data)?),
            "QUESTION" => HostMessage::Question(payload(kind, &env.data)?),
            "TIMER_START" => {
                let mut p: TimerStartPayload = payload(kind, &env.data)?;
                if p.start_time.is_none() {
                    p.start_time = env.timestamp.map(|t| t as i64);
                }
                HostMessage::TimerStart(p)
            }
            "TIMER" => HostMessage::Timer(payload(kind, &env.data)?),
            "TIMEUP" => HostMessage::TimeUp,
            "LOCK" => HostMessage::Lock,
            "REVEAL" => HostMessage::Reveal(payload(kind, &env.data)?),
            "NEXT" => HostMessage::Next,
            "PICTURE" => HostMessage::Picture(payload(kind, &env.data)?),
            "DISPLAY_MODE" => display(DisplayKind::Mode, kind, env.data)?,
            "DISPLAY_UPDATE" => display(DisplayKind::Update, kind, env.data)?,
            "LEADERBOARD_UPDATE" => display(DisplayKind::Leaderboard, kind, env.data)?,
            "SLIDESHOW_UPDATE" => display(DisplayKind::Slideshow, kind, env.data)?,
            "FASTEST" => HostMessage::Fastest(payload(kind, &env.data)?),
            "AUTO_DISABLE_GO_WIDE" => HostMessage::AutoDisableGoWide,
            "SCORE_UPDATE" => HostMessage::ScoreUpdate(payload(kind, &env.data)?),
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        };
        Ok(msg)
    }

    /// Wire name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            HostMessage::TeamApproved(_) => "TEAM_APPROVED",
            HostMessage::ApprovalPending => "APPROVAL_PENDING",
            HostMessage::TeamDeclined(_) => "TEAM_DECLINED",
            HostMessage::Question(_) => "QUESTION",
            HostMessage::TimerStart(_) => "TIMER_START",
            HostMessage::Timer(_) => "TIMER",
            HostMessage::TimeUp => "TIMEUP",
            HostMessage::Lock => "LOCK",
            HostMessage::Reveal(_) => "REVEAL",
            HostMessage::Next => "NEXT",
            HostMessage::Picture(_) => "PICTURE",
            HostMessage::Display(d) => match d.kind {
                DisplayKind::Mode => "DISPLAY_MODE",
                DisplayKind::Update => "DISPLAY_UPDATE",
                DisplayKind::Leaderboard => "LEADERBOARD_UPDATE",
                DisplayKind::Slideshow => "SLIDESHOW_UPDATE",
            },
            HostMessage::Fastest(_) => "FASTEST",
            HostMessage::AutoDisableGoWide => "AUTO_DISABLE_GO_WIDE",
            HostMessage::ScoreUpdate(_) => "SCORE_UPDATE",
        }
    }
}

// =============================================================================
// PLAYER MESSAGES (player → host)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub answer: AnswerValue,
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_answers: Option<Vec<String>>,
    #[serde(default)]
    pub go_wide: bool,
    /// Milliseconds since the host started the timer
    pub response_time: u64,
}

/// Messages sent to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerMessage {
    #[serde(rename_all = "camelCase")]
    PlayerJoin {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        photo: Option<String>,
        #[serde(default)]
        rejoin: bool,
    },
    PlayerAnswer(AnswerPayload),
    #[serde(rename_all = "camelCase")]
    PlayerAway { reason: String, changed_at: i64 },
    #[serde(rename_all = "camelCase")]
    PlayerActive { reason: String, changed_at: i64 },
    TeamPhotoUpdate { photo: String },
    PlayerBuzzerSelect { buzzer: String },
}

impl PlayerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerMessage::PlayerJoin { .. } => "PLAYER_JOIN",
            PlayerMessage::PlayerAnswer(_) => "PLAYER_ANSWER",
            PlayerMessage::PlayerAway { .. } => "PLAYER_AWAY",
            PlayerMessage::PlayerActive { .. } => "PLAYER_ACTIVE",
            PlayerMessage::TeamPhotoUpdate { .. } => "TEAM_PHOTO_UPDATE",
            PlayerMessage::PlayerBuzzerSelect { .. } => "PLAYER_BUZZER_SELECT",
        }
    }
}

/// Full outbound frame: identity, message body, send time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    pub player_id: String,
    pub device_id: String,
    pub team_name: String,
    #[serde(flatten)]
    pub message: PlayerMessage,
    pub timestamp: i64,
}

// =============================================================================
// DISCOVERY
// =============================================================================

/// Response of the host's `/api/host-info` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub ws_url: String,
    #[serde(default, rename = "localIP")]
    pub local_ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

// =============================================================================
// TESTS
// =============================================================================
