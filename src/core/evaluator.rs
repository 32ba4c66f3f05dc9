//! Answer correctness
//!
//! Mirrors the host's scoring rules exactly so player-side feedback never
//! disagrees with the scoreboard. Pure functions only.

use super::types::{AnswerValue, QuestionType, SubmittedAnswer};

/// What the player submitted: either a bare value or the full snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Submission<'a> {
    Raw(&'a AnswerValue),
    Wrapped(&'a SubmittedAnswer),
}

impl<'a> From<&'a AnswerValue> for Submission<'a> {
    fn from(value: &'a AnswerValue) -> Self {
        Submission::Raw(value)
    }
}

impl<'a> From<&'a SubmittedAnswer> for Submission<'a> {
    fn from(value: &'a SubmittedAnswer) -> Self {
        Submission::Wrapped(value)
    }
}

/// Decide whether `submitted` matches `correct`.
///
/// Rules, first match wins:
/// 1. nothing submitted, or no correct answer (numeric 0 counts as an answer) → false
/// 2. type is the submission's own recorded type, else `question_type`
/// 3. go-wide: any of `all_answers` matches (trimmed, case-insensitive)
/// 4. numbers: both sides parse as integers and are equal
/// 5. otherwise trimmed, case-insensitive string equality
pub fn is_correct(
    submitted: Option<Submission<'_>>,
    correct: Option<&AnswerValue>,
    question_type: Option<QuestionType>,
) -> bool {
    let Some(submitted) = submitted else {
        return false;
    };
    let Some(correct) = correct.filter(|c| !c.is_blank()) else {
        return false;
    };

    let (value, all_answers, recorded_type) = match submitted {
        Submission::Raw(v) => (v, &[][..], None),
        Submission::Wrapped(s) => (&s.value, s.all_answers.as_slice(), s.question_type),
    };
    if value.is_blank() && all_answers.is_empty() {
        return false;
    }

    let correct_text = normalize(&correct.to_string());

    if !all_answers.is_empty() {
        return all_answers.iter().any(|a| normalize(a) == correct_text);
    }

    match recorded_type.or(question_type) {
        Some(QuestionType::Numbers) => {
            match (parse_leading_int(&value.to_string()), parse_leading_int(&correct.to_string())) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => normalize(&value.to_string()) == correct_text,
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Integer parse with leading-integer semantics: optional leading whitespace,
/// optional sign, then as many digits as present. Anything after the digits is
/// ignored, so `"7.0"` is 7 and `"12abc"` is 12. No digits means no number.
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: &str = {
        let end = rest
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(rest.len());
        &rest[..end]
    };
    if digits.is_empty() {
        return None;
    }
    let magnitude: i64 = digits.parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

// =============================================================================
// TESTS
// =============================================================================
