//! Core types - platform-independent data structures
//!
//! These types describe the player's view of the game and are shared by the
//! session state machine, the evaluator and the rendering snapshot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::protocol::ProtocolError;

// =============================================================================
// GAME PHASE
// =============================================================================

/// Which screen the player is looking at. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GamePhase {
    /// Choosing a team name
    TeamEntry,
    /// Team name submitted, no answer from the host yet
    Waiting,
    /// Approval screen (pending or approved)
    Approval,
    /// Host declined the team name
    Declined,
    /// A question is on screen
    Question,
    /// Keypad visible between questions, waiting for the next `QUESTION`
    ReadyForQuestion,
    /// Ambient display content (leaderboard, slideshow, scores)
    Display,
}

impl GamePhase {
    /// Phases during which ambient display content must not take over the screen
    pub fn is_game_screen(self) -> bool {
        matches!(self, GamePhase::Question | GamePhase::ReadyForQuestion)
    }

    /// Phases before the host has let the team into the game
    pub fn is_pre_game(self) -> bool {
        matches!(
            self,
            GamePhase::TeamEntry | GamePhase::Waiting | GamePhase::Declined
        )
    }
}

// =============================================================================
// QUESTION TYPE
// =============================================================================

/// Question semantics. Parsed case-insensitively from the host's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QuestionType {
    Letters,
    Numbers,
    MultipleChoice,
    Sequence,
    Buzzin,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Letters => "letters",
            QuestionType::Numbers => "numbers",
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::Sequence => "sequence",
            QuestionType::Buzzin => "buzzin",
        }
    }
}

impl FromStr for QuestionType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "letters" => Ok(QuestionType::Letters),
            "numbers" => Ok(QuestionType::Numbers),
            "multiple-choice" | "multiplechoice" => Ok(QuestionType::MultipleChoice),
            "sequence" => Ok(QuestionType::Sequence),
            "buzzin" | "buzz-in" => Ok(QuestionType::Buzzin),
            _ => Err(ProtocolError::QuestionType(s.to_string())),
        }
    }
}

impl TryFrom<String> for QuestionType {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuestionType> for String {
    fn from(value: QuestionType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ANSWER VALUES
// =============================================================================

/// An answer as it appears on the wire: the host may send numbers or strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
}

impl AnswerValue {
    /// True when there is nothing to compare against.
    /// Numeric zero is a real answer, an empty string is not.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Number(n) => n.is_nan(),
            AnswerValue::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Number(n) => write!(f, "{}", n),
            AnswerValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        AnswerValue::Number(value as f64)
    }
}

/// Immutable record of what the player submitted, captured at submit time.
///
/// The reveal handler evaluates against this snapshot, never against whatever
/// the input field happens to hold when `REVEAL` arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    #[serde(rename = "answer")]
    pub value: AnswerValue,
    #[serde(default)]
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    pub all_answers: Vec<String>,
}

impl SubmittedAnswer {
    pub fn single(value: impl Into<AnswerValue>, question_type: QuestionType) -> Self {
        Self {
            value: value.into(),
            question_type: Some(question_type),
            all_answers: Vec::new(),
        }
    }
}

// =============================================================================
// QUESTION
// =============================================================================

/// The question currently on screen
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_type: QuestionType,
    pub number: Option<u32>,
    pub text: Option<String>,
    /// Host is hiding the question text (e.g. read aloud)
    pub is_placeholder: bool,
    pub options: Vec<String>,
    pub image: Option<String>,
    pub go_wide_enabled: bool,
    pub revealed: bool,
    pub revealed_answer: Option<AnswerValue>,
}

// =============================================================================
// TIMER STATE
// =============================================================================

/// Countdown state. `host_start_timestamp` only feeds latency computation;
/// the visible countdown runs locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub total_length: u32,
    pub remaining: u32,
    pub running: bool,
    pub locked: bool,
    pub host_start_timestamp: Option<i64>,
}

// =============================================================================
// SESSION IDENTITY
// =============================================================================

/// Who this client is. The host keys reconnection on `device_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Fresh per process launch
    pub player_id: String,
    /// Durable across restarts
    pub device_id: String,
    /// Chosen by the user, cached for auto-rejoin
    pub team_name: Option<String>,
}

// =============================================================================
// TESTS
// =============================================================================
