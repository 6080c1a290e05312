//! Validation of the deep-evaluation completion output.
//!
//! Any shape violation becomes a typed [`EvaluationFailure`]; the evaluator
//! treats every failure as "no interruption".

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::participant::Participant;
use crate::trigger::TriggerReason;

/// Reasoning/internal tags stripped together with their content.
const TAGS_TO_STRIP: &[&str] = &[
    "thinking",
    "think",
    "reflection",
    "reflect",
    "internal",
    "reasoning",
    "thought",
    "scratch",
    "scratchpad",
    "plan",
    "analysis",
];

lazy_static! {
    static ref RE_REASONING: Regex = Regex::new(&format!(
        r"(?is)<({})\b[^>]*>.*?</({})>",
        TAGS_TO_STRIP.join("|"),
        TAGS_TO_STRIP.join("|")
    ))
    .expect("reasoning tag regex");
    static ref RE_ORPHAN_TAG: Regex =
        Regex::new(r"</?[A-Za-z]\w*[^>]*>").expect("orphan tag regex");
    static ref RE_CODE_FENCE: Regex = Regex::new(r"```[A-Za-z]*").expect("code fence regex");
    static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace regex");
}

/// Why a deep evaluation produced no decision.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationFailure {
    #[error("no completion client configured")]
    Unavailable,

    #[error("completion transport failed: {0}")]
    Transport(String),

    #[error("completion timed out after {0}ms")]
    TimedOut(u64),

    #[error("no JSON object in response")]
    NoJson,

    #[error("malformed JSON: {0}")]
    Malformed(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid urgency: {0}")]
    InvalidUrgency(String),

    #[error("participant '{0}' is not eligible to interrupt")]
    IneligibleParticipant(String),
}

/// A decision that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDecision {
    /// Id of an eligible participant.
    pub interrupter_id: String,
    pub reason: TriggerReason,
    /// Clamped into [0, 1].
    pub urgency: f32,
    pub trigger_phrase: Option<String>,
    pub suggested_opener: Option<String>,
}

/// Result of a well-formed deep evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum DeepEvaluation {
    Interrupt(ValidatedDecision),
    Declined,
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(alias = "shouldInterrupt", alias = "interrupt")]
    should_interrupt: Option<bool>,
    #[serde(alias = "interrupterId", alias = "participant_id", alias = "participantId")]
    interrupter_id: Option<String>,
    reason: Option<String>,
    #[serde(alias = "confidence")]
    urgency: Option<Value>,
    #[serde(alias = "triggerPhrase")]
    trigger_phrase: Option<String>,
    #[serde(alias = "suggestedOpener", alias = "opener")]
    suggested_opener: Option<String>,
}

/// Strip reasoning tags, stray markup and code fences, and collapse whitespace.
pub fn sanitize_response(response: &str) -> String {
    let result = RE_REASONING.replace_all(response, "");
    let result = RE_ORPHAN_TAG.replace_all(&result, "");
    let result = RE_CODE_FENCE.replace_all(&result, "");
    let result = RE_WHITESPACE.replace_all(&result, " ");
    result.trim().to_string()
}

/// The outermost `{...}` span of the text.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_urgency(value: &Value) -> Result<f32, EvaluationFailure> {
    let urgency = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|u| u.is_finite())
    .ok_or_else(|| EvaluationFailure::InvalidUrgency(value.to_string()))?;

    Ok(urgency.clamp(0.0, 1.0) as f32)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse and validate a completion against the eligible participants.
/// The interrupter may be named by id or, case-insensitively, by name.
pub fn parse_decision(
    raw: &str,
    eligible: &[&Participant],
) -> Result<DeepEvaluation, EvaluationFailure> {
    let cleaned = sanitize_response(raw);
    let json = extract_json_object(&cleaned).ok_or(EvaluationFailure::NoJson)?;
    let decision: RawDecision =
        serde_json::from_str(json).map_err(|e| EvaluationFailure::Malformed(e.to_string()))?;

    let should_interrupt = decision
        .should_interrupt
        .ok_or(EvaluationFailure::MissingField("should_interrupt"))?;
    if !should_interrupt {
        return Ok(DeepEvaluation::Declined);
    }

    let named = non_empty(decision.interrupter_id)
        .ok_or(EvaluationFailure::MissingField("interrupter_id"))?;
    let interrupter = eligible
        .iter()
        .find(|p| p.id == named)
        .or_else(|| eligible.iter().find(|p| p.name.eq_ignore_ascii_case(&named)))
        .ok_or_else(|| EvaluationFailure::IneligibleParticipant(named.clone()))?;

    let urgency = decision
        .urgency
        .as_ref()
        .ok_or(EvaluationFailure::MissingField("urgency"))
        .and_then(parse_urgency)?;

    let reason = decision
        .reason
        .as_deref()
        .and_then(|r| r.parse::<TriggerReason>().ok())
        .unwrap_or_else(|| {
            tracing::debug!(
                reason = ?decision.reason,
                "Unknown interruption reason, using direct_challenge"
            );
            TriggerReason::DirectChallenge
        });

    Ok(DeepEvaluation::Interrupt(ValidatedDecision {
        interrupter_id: interrupter.id.clone(),
        reason,
        urgency,
        trigger_phrase: non_empty(decision.trigger_phrase),
        suggested_opener: non_empty(decision.suggested_opener),
    }))
}
