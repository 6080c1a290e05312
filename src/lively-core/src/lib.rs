//! Lively Core Library
//!
//! Live turn-taking and interruption scheduling for AI debates: tracks who
//! holds the floor, finds safe places to cut them off, and decides when
//! another participant should jump in.

pub mod boundary;
pub mod clock;
pub mod completion;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod heuristics;
pub mod orchestrator;
pub mod pacing;
pub mod participant;
pub mod prompt;
pub mod response;
pub mod store;
pub mod trigger;
pub mod turn_state;

pub use boundary::BoundaryStrength;
pub use clock::{Clock, ManualClock, SystemClock};
pub use completion::{CompletionClient, CompletionOptions, OpenAICompletionClient};
pub use config::{CompletionSettings, InterruptionConfig, LivelyConfig, LivelySettings};
pub use error::LivelyError;
pub use evaluator::{
    EvaluationContext, InterruptStats, InterruptionEvaluator, ParticipantInterruptCount,
};
pub use events::{EventBus, EventCallback, LivelyEvent};
pub use heuristics::{HeuristicClassifier, HeuristicResult};
pub use orchestrator::{LivelySession, TurnOutcome};
pub use pacing::{PacingConfig, PacingMode};
pub use participant::{DebateMessage, Participant, ParticipantRole, SpeakerState};
pub use store::{InMemoryInterruptionStore, InterruptionRecord, InterruptionStore};
pub use trigger::{InterruptionCandidate, TriggerReason};
pub use turn_state::{ActiveSpeakerState, SafeBoundary, TurnStateTracker};
