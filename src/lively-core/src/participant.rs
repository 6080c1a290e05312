//! Debate participants as the scheduler sees them.
//!
//! Participants are owned by the orchestrator; the scheduler only needs an
//! identifier, a display name and the side they argue.

use serde::{Deserialize, Serialize};

/// Role of a participant in the debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// Arguing in favor of the topic.
    For,
    /// Arguing against the topic.
    Against,
    /// Neutral panelist.
    Neutral,
    /// Runs the debate; may also interrupt.
    Moderator,
}

impl ParticipantRole {
    pub fn display_name(&self) -> &str {
        match self {
            ParticipantRole::For => "FOR",
            ParticipantRole::Against => "AGAINST",
            ParticipantRole::Neutral => "NEUTRAL",
            ParticipantRole::Moderator => "MODERATOR",
        }
    }
}

/// A participant who can hold the floor or interrupt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Stable identifier, unique within a debate.
    pub id: String,
    /// Display name.
    pub name: String,
    /// The side this participant argues.
    pub role: ParticipantRole,
}

impl Participant {
    /// Create a new participant with the given id, name, and role.
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: ParticipantRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    /// Get the full display name with role.
    pub fn display_name_with_role(&self) -> String {
        format!("{} ({})", self.name, self.role.display_name())
    }
}

/// Per-participant floor state, independent of who is currently active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerState {
    #[default]
    Ready,
    Speaking,
    Interrupted,
}

/// A finished utterance in the debate transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateMessage {
    /// Id of the participant who spoke.
    pub speaker_id: String,
    /// Speaker's name.
    pub speaker_name: String,
    /// The content of the message.
    pub content: String,
}

impl DebateMessage {
    pub fn new(speaker: &Participant, content: impl Into<String>) -> Self {
        Self {
            speaker_id: speaker.id.clone(),
            speaker_name: speaker.name.clone(),
            content: content.into(),
        }
    }
}
