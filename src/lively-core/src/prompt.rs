//! Prompt for the deep interruption evaluation.

use std::fmt::Write;

use crate::heuristics::HeuristicResult;
use crate::participant::{DebateMessage, Participant};
use crate::trigger::TriggerReason;

/// Transcript entries included before the fragment.
pub const TRANSCRIPT_WINDOW: usize = 6;

/// Everything the prompt needs to describe the moment.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub topic: &'a str,
    pub aggressiveness: u8,
    pub current_speaker: &'a Participant,
    pub eligible: &'a [&'a Participant],
    pub recent_transcript: &'a [DebateMessage],
    pub fragment: &'a str,
    pub heuristic: &'a HeuristicResult,
}

fn aggressiveness_guidance(level: u8) -> &'static str {
    match level {
        0 | 1 => "Only interrupt for egregious errors or misrepresentations. Almost always let the speaker finish.",
        2 => "Interrupt rarely, only when something clearly demands a response.",
        3 => "Interrupt when there is a real reason to, as in a lively but civil debate.",
        4 => "Interrupt readily. This is a heated debate and participants push back often.",
        _ => "Interrupt freely. This is a combative debate; any contestable claim is fair game.",
    }
}

/// Build the evaluation prompt. The model must answer with one JSON object.
pub fn build_evaluation_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are the live moderator's assistant in a multi-party debate on: {}",
        input.topic
    );
    let _ = writeln!(
        prompt,
        "\nDecide whether another participant should interrupt {} right now.",
        input.current_speaker.display_name_with_role()
    );
    let _ = writeln!(
        prompt,
        "\nAGGRESSIVENESS: {} of 5. {}",
        input.aggressiveness,
        aggressiveness_guidance(input.aggressiveness)
    );

    prompt.push_str("\nINTERRUPTION REASONS (use exactly one of these identifiers):\n");
    for reason in TriggerReason::ALL {
        let (fragment, opener) = reason.example();
        let _ = writeln!(prompt, "- {}: {}", reason.as_str(), reason.description());
        let _ = writeln!(prompt, "  Example: \"{}\" -> \"{}\"", fragment, opener);
    }

    prompt.push_str("\nPARTICIPANTS WHO MAY INTERRUPT:\n");
    for p in input.eligible {
        let _ = writeln!(
            prompt,
            "- id: {}, name: {}, side: {}",
            p.id,
            p.name,
            p.role.display_name()
        );
    }

    let transcript = input.recent_transcript;
    if !transcript.is_empty() {
        prompt.push_str("\nRECENT TRANSCRIPT:\n");
        let start = transcript.len().saturating_sub(TRANSCRIPT_WINDOW);
        for msg in &transcript[start..] {
            let _ = writeln!(prompt, "[{}]: {}", msg.speaker_name, msg.content);
        }
    }

    let _ = writeln!(
        prompt,
        "\nWHAT {} IS SAYING RIGHT NOW:\n\"{}\"",
        input.current_speaker.name.to_uppercase(),
        input.fragment.trim()
    );

    if let Some(reason) = input.heuristic.likely_reason {
        let _ = writeln!(
            prompt,
            "\nA quick scan suggests a possible {} (confidence {:.2}). Confirm or reject it.",
            reason.as_str(),
            input.heuristic.confidence
        );
    }

    prompt.push_str(
        r#"
Respond with ONLY a JSON object, no other text:
{
  "should_interrupt": true or false,
  "interrupter_id": "<id of one participant listed above>",
  "reason": "<one reason identifier>",
  "urgency": <number from 0.0 to 1.0>,
  "trigger_phrase": "<the exact words that prompted the interruption>",
  "suggested_opener": "<a short, natural line to cut in with, under 15 words>"
}
"#,
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantRole;

    fn build(aggressiveness: u8, heuristic: &HeuristicResult) -> String {
        let speaker = Participant::new("pro", "Avery", ParticipantRole::For);
        let con = Participant::new("con", "Blake", ParticipantRole::Against);
        let moderator = Participant::new("mod", "Casey", ParticipantRole::Moderator);
        let eligible = [&con, &moderator];
        let transcript: Vec<DebateMessage> = (0..10)
            .map(|i| DebateMessage::new(&con, format!("line {}", i)))
            .collect();
        build_evaluation_prompt(&PromptInput {
            topic: "Carbon taxes",
            aggressiveness,
            current_speaker: &speaker,
            eligible: &eligible,
            recent_transcript: &transcript,
            fragment: "  They just want to avoid regulation entirely. ",
            heuristic,
        })
    }

    #[test]
    fn test_prompt_states_aggressiveness() {
        let prompt = build(4, &HeuristicResult::miss());
        assert!(prompt.contains("AGGRESSIVENESS: 4 of 5"));
        assert!(prompt.contains("Interrupt readily"));
    }

    #[test]
    fn test_prompt_describes_every_reason_with_example() {
        let prompt = build(3, &HeuristicResult::miss());
        for reason in TriggerReason::ALL {
            assert!(prompt.contains(reason.description()));
            assert!(prompt.contains(reason.example().0));
        }
    }

    #[test]
    fn test_prompt_lists_only_eligible_participants() {
        let prompt = build(3, &HeuristicResult::miss());
        assert!(prompt.contains("id: con, name: Blake"));
        assert!(prompt.contains("id: mod, name: Casey"));
        assert!(!prompt.contains("id: pro"));
    }

    #[test]
    fn test_prompt_keeps_recent_transcript_window() {
        let prompt = build(3, &HeuristicResult::miss());
        assert!(prompt.contains("line 9"));
        assert!(prompt.contains("line 4"));
        assert!(!prompt.contains("line 3"));
    }

    #[test]
    fn test_prompt_includes_trimmed_fragment_and_hint() {
        let hint = HeuristicResult {
            potential_trigger: true,
            likely_reason: Some(TriggerReason::StrawManDetected),
            confidence: 0.75,
            matched_text: Some("They just want".to_string()),
        };
        let prompt = build(3, &hint);
        assert!(prompt.contains("\"They just want to avoid regulation entirely.\""));
        assert!(prompt.contains("possible straw_man_detected (confidence 0.75)"));
    }
}
