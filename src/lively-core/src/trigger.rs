//! Why one participant cuts in on another, and the resulting candidate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed taxonomy of interruption reasons.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    FactualCorrection,
    StrawManDetected,
    DirectChallenge,
    ClarificationNeeded,
    StrongAgreement,
    PivotalPoint,
}

impl TriggerReason {
    pub const ALL: [TriggerReason; 6] = [
        TriggerReason::FactualCorrection,
        TriggerReason::StrawManDetected,
        TriggerReason::DirectChallenge,
        TriggerReason::ClarificationNeeded,
        TriggerReason::StrongAgreement,
        TriggerReason::PivotalPoint,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerReason::FactualCorrection => "factual_correction",
            TriggerReason::StrawManDetected => "straw_man_detected",
            TriggerReason::DirectChallenge => "direct_challenge",
            TriggerReason::ClarificationNeeded => "clarification_needed",
            TriggerReason::StrongAgreement => "strong_agreement",
            TriggerReason::PivotalPoint => "pivotal_point",
        }
    }

    /// Human-readable description used in the evaluation prompt.
    pub fn description(self) -> &'static str {
        match self {
            TriggerReason::FactualCorrection => {
                "The speaker states something factually wrong or cites a misleading statistic."
            }
            TriggerReason::StrawManDetected => {
                "The speaker misrepresents an opponent's position as weaker or more extreme than it is."
            }
            TriggerReason::DirectChallenge => {
                "The speaker makes a claim that demands an immediate pointed rebuttal or question."
            }
            TriggerReason::ClarificationNeeded => {
                "The speaker is vague or ambiguous enough that the argument cannot be engaged with."
            }
            TriggerReason::StrongAgreement => {
                "The speaker makes a point another participant wants to emphatically reinforce."
            }
            TriggerReason::PivotalPoint => {
                "The speaker reaches the crux of the debate and another participant must weigh in now."
            }
        }
    }

    /// Opener used when none was suggested.
    pub fn default_opener(self) -> &'static str {
        match self {
            TriggerReason::FactualCorrection => "Sorry, but that's not accurate.",
            TriggerReason::StrawManDetected => "That's not what we're arguing.",
            TriggerReason::DirectChallenge => "Let me challenge that right there.",
            TriggerReason::ClarificationNeeded => "Can you clarify what you mean?",
            TriggerReason::StrongAgreement => "I have to agree with that.",
            TriggerReason::PivotalPoint => "This is the crux of it, so let me jump in.",
        }
    }

    /// A worked example fragment and opener for the evaluation prompt.
    pub fn example(self) -> (&'static str, &'static str) {
        match self {
            TriggerReason::FactualCorrection => (
                "Crime has tripled in every major city since 2010.",
                "Sorry, that's simply not what the data shows.",
            ),
            TriggerReason::StrawManDetected => (
                "My opponent just wants to tear down every business in the country.",
                "Hold on, that's not my position at all.",
            ),
            TriggerReason::DirectChallenge => (
                "There is no evidence that this policy has ever worked anywhere.",
                "Then how do you explain the results in Denmark?",
            ),
            TriggerReason::ClarificationNeeded => (
                "We need to basically fix the system somehow, in some sense.",
                "Wait, what exactly are you proposing?",
            ),
            TriggerReason::StrongAgreement => (
                "Whatever we decide, the people most affected must have a say.",
                "Yes, exactly, and that's the point I made earlier.",
            ),
            TriggerReason::PivotalPoint => (
                "The real question is who pays for this in the end.",
                "Let me jump in here, because this is the heart of it.",
            ),
        }
    }
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        TriggerReason::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| format!("unknown trigger reason: {}", s))
    }
}

/// A proposed interruption. Built per evaluation, kept only if accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptionCandidate {
    /// Id of the participant who cuts in.
    pub interrupting_participant: String,
    /// Id of the participant holding the floor.
    pub interrupted_participant: String,
    pub trigger_reason: TriggerReason,
    /// The phrase that provoked the interruption.
    pub trigger_content: String,
    /// How strongly the interruption is warranted, in [0, 1].
    pub urgency: f32,
    /// Short line the interrupter opens with.
    pub suggested_opener: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_round_trips_through_str() {
        for reason in TriggerReason::ALL {
            assert_eq!(reason.as_str().parse::<TriggerReason>().unwrap(), reason);
        }
    }

    #[test]
    fn test_reason_parse_is_lenient_on_case_and_separators() {
        assert_eq!(
            "Straw-Man Detected".parse::<TriggerReason>().unwrap(),
            TriggerReason::StrawManDetected
        );
        assert!("ad_hominem".parse::<TriggerReason>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&TriggerReason::PivotalPoint).unwrap();
        assert_eq!(json, "\"pivotal_point\"");
    }
}
