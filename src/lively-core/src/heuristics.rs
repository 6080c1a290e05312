//! Fast, local pre-filter run before any completion call.
//!
//! An ordered table of `(pattern, reason, confidence)` rules is scanned
//! against the fragment and the first match wins. A secondary check flags
//! critiques that never engage with the opponent's strongest position.

use lazy_static::lazy_static;
use regex::Regex;

use crate::trigger::TriggerReason;

/// Default rule table, in priority order.
pub const DEFAULT_RULES: &[(&str, TriggerReason, f32)] = &[
    (
        r"(?i)\b(they|you|my opponents?|the other side|people like (?:you|them))\s+(?:just|only|simply|really)\s+(?:want|wants|care|cares|believe|believes|think|thinks)\b",
        TriggerReason::StrawManDetected,
        0.75,
    ),
    (
        r"(?i)\b(so what you'?re (?:really )?saying is|in other words,? you (?:think|believe|want))\b",
        TriggerReason::StrawManDetected,
        0.7,
    ),
    (
        r"(?i)(\d+(?:\.\d+)?\s?(?:%|percent)|\b(?:studies|statistics|the data|research) (?:shows?|proves?)\b|\baccording to\b)",
        TriggerReason::FactualCorrection,
        0.6,
    ),
    (
        r"(?i)\b(how can (?:you|anyone)|why would (?:you|anyone)|do you (?:really|honestly)|can you (?:explain|name|show))\b",
        TriggerReason::DirectChallenge,
        0.65,
    ),
    (
        r"(?i)\b(the (?:real|key|fundamental|central) (?:issue|question|point|problem)|the heart of (?:the|this) (?:matter|debate)|what (?:really )?matters (?:most|here))\b",
        TriggerReason::PivotalPoint,
        0.6,
    ),
    (
        r"(?i)\b(always|never|everyone knows|no one|nobody|every single)\b",
        TriggerReason::FactualCorrection,
        0.5,
    ),
    (
        r"(?i)\b(exactly right|absolutely right|i (?:completely|totally|fully) agree|precisely)\b",
        TriggerReason::StrongAgreement,
        0.5,
    ),
    (
        r"(?i)\b(sort of|kind of|basically|somehow|in some sense|more or less)\b",
        TriggerReason::ClarificationNeeded,
        0.4,
    ),
];

/// Minimum fragment length before the straw-man fallback applies.
pub const STRAW_MAN_MIN_CHARS: usize = 80;
const STRAW_MAN_FALLBACK_CONFIDENCE: f32 = 0.45;

lazy_static! {
    static ref COMPILED_DEFAULT_RULES: Vec<HeuristicRule> = DEFAULT_RULES
        .iter()
        .map(|(pattern, reason, confidence)| {
            HeuristicRule::new(pattern, *reason, *confidence).expect("default heuristic rule")
        })
        .collect();

    static ref RE_CONTRASTIVE: Regex = Regex::new(
        r"(?i)\b(but|however|disagree|wrong|mistaken|misguided|nonsense)\b"
    ).expect("contrastive regex");

    static ref RE_STEEL_MAN: Regex = Regex::new(
        r"(?i)\b(i understand|i appreciate|fair point|to be fair|granted|i agree that|(?:they|you)(?:'re| are) right that|the strongest (?:case|argument|version)|i acknowledge|i concede|makes a good point)\b"
    ).expect("steel-man regex");
}

/// One entry of the rule table.
#[derive(Debug, Clone)]
pub struct HeuristicRule {
    pub pattern: Regex,
    pub reason: TriggerReason,
    pub confidence: f32,
}

impl HeuristicRule {
    pub fn new(
        pattern: &str,
        reason: TriggerReason,
        confidence: f32,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            reason,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }
}

/// Outcome of the fast heuristic pass.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicResult {
    pub potential_trigger: bool,
    pub likely_reason: Option<TriggerReason>,
    pub confidence: f32,
    /// The text the winning rule matched, if any.
    pub matched_text: Option<String>,
}

impl HeuristicResult {
    pub fn miss() -> Self {
        Self {
            potential_trigger: false,
            likely_reason: None,
            confidence: 0.0,
            matched_text: None,
        }
    }
}

/// Ordered rule table plus the straw-man fallback.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    rules: Vec<HeuristicRule>,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self {
            rules: COMPILED_DEFAULT_RULES.clone(),
        }
    }
}

impl HeuristicClassifier {
    /// Use a custom rule table, scanned in the given order.
    pub fn with_rules(rules: Vec<HeuristicRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[HeuristicRule] {
        &self.rules
    }

    pub fn classify(&self, fragment: &str) -> HeuristicResult {
        for rule in &self.rules {
            if let Some(m) = rule.pattern.find(fragment) {
                return HeuristicResult {
                    potential_trigger: true,
                    likely_reason: Some(rule.reason),
                    confidence: rule.confidence,
                    matched_text: Some(m.as_str().to_string()),
                };
            }
        }

        if looks_like_straw_man(fragment) {
            return HeuristicResult {
                potential_trigger: true,
                likely_reason: Some(TriggerReason::StrawManDetected),
                confidence: STRAW_MAN_FALLBACK_CONFIDENCE,
                matched_text: None,
            };
        }

        HeuristicResult::miss()
    }
}

/// A critique long enough to matter that never steel-mans the other side.
pub fn looks_like_straw_man(fragment: &str) -> bool {
    fragment.trim().chars().count() >= STRAW_MAN_MIN_CHARS
        && RE_CONTRASTIVE.is_match(fragment)
        && !RE_STEEL_MAN.is_match(fragment)
}
