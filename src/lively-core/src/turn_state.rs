//! Who holds the floor, and where it is safe to cut them off.
//!
//! The tracker owns the single active speaker, ingests streamed chunks,
//! detects safe boundaries and opens the interrupt window once per turn.
//! Every operation is a benign no-op when nobody is speaking, since the
//! driving loop may race with the end of a turn.

use std::collections::HashMap;
use std::sync::Arc;

use crate::boundary::{BoundaryDetector, BoundaryStrength};
use crate::clock::Clock;
use crate::config::LivelySettings;
use crate::events::{EventBus, LivelyEvent};
use crate::pacing::PacingConfig;
use crate::participant::{Participant, SpeakerState};

/// A recorded safe cut point within the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeBoundary {
    /// Token position at which the boundary was detected.
    pub token_position: usize,
    /// Byte offset in the partial content just past the cut point.
    pub char_offset: usize,
    pub strength: BoundaryStrength,
    pub at_ms: u64,
}

/// State of the participant currently holding the floor.
#[derive(Debug, Clone)]
pub struct ActiveSpeakerState {
    pub speaker: Participant,
    pub started_at_ms: u64,
    pub token_position: usize,
    pub partial_content: String,
    pub interrupt_window_open: bool,
    pub last_safe_boundary: Option<SafeBoundary>,
    window_opened: bool,
    detector: BoundaryDetector,
}

/// Tracks turns for one debate session.
pub struct TurnStateTracker {
    settings: LivelySettings,
    pacing: PacingConfig,
    clock: Arc<dyn Clock>,
    events: EventBus,
    running: bool,
    session_started_at: Option<u64>,
    active: Option<ActiveSpeakerState>,
    speaker_states: HashMap<String, SpeakerState>,
    turn_id: u64,
}

impl TurnStateTracker {
    pub fn new(settings: LivelySettings, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        let pacing = settings.pacing();
        Self {
            settings,
            pacing,
            clock,
            events,
            running: false,
            session_started_at: None,
            active: None,
            speaker_states: HashMap::new(),
            turn_id: 0,
        }
    }

    /// Begin the debate session.
    pub fn start(&mut self, epoch_ms: u64) {
        self.running = true;
        self.session_started_at = Some(epoch_ms);
        tracing::debug!(epoch_ms, "Turn tracker started");
    }

    /// End the debate session, closing any active turn.
    pub fn stop(&mut self) {
        self.end_speaker();
        self.running = false;
        tracing::debug!("Turn tracker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn session_started_at(&self) -> Option<u64> {
        self.session_started_at
    }

    /// Give the floor to `speaker`, ending the previous turn first.
    /// No-op if `speaker` already holds the floor.
    pub fn start_speaker(&mut self, speaker: &Participant) {
        if self.active_speaker().is_some_and(|a| a.id == speaker.id) {
            return;
        }
        self.end_speaker();

        let now = self.clock.now_ms();
        self.turn_id += 1;
        self.speaker_states
            .insert(speaker.id.clone(), SpeakerState::Speaking);
        self.active = Some(ActiveSpeakerState {
            speaker: speaker.clone(),
            started_at_ms: now,
            token_position: 0,
            partial_content: String::new(),
            interrupt_window_open: false,
            last_safe_boundary: None,
            window_opened: false,
            detector: BoundaryDetector::new(
                self.settings.pacing_mode.allows_weak_boundaries(),
                self.pacing.min_boundary_gap_ms,
            ),
        });

        tracing::debug!(speaker = %speaker.id, turn = self.turn_id, "Speaker started");
        self.events.emit(LivelyEvent::SpeakerStarted {
            speaker_id: speaker.id.clone(),
            at_ms: now,
        });
    }

    /// Close the current turn normally.
    pub fn end_speaker(&mut self) {
        self.finish_turn(false);
    }

    /// Mark `speaker_id` as interrupted, ending their turn if they hold the floor.
    pub fn mark_interrupted(&mut self, speaker_id: &str) {
        self.speaker_states
            .insert(speaker_id.to_string(), SpeakerState::Interrupted);
        if self.active_speaker().is_some_and(|a| a.id == speaker_id) {
            self.finish_turn(true);
        }
    }

    fn finish_turn(&mut self, interrupted: bool) {
        let Some(active) = self.active.take() else {
            return;
        };
        let speaker_id = active.speaker.id;
        let duration_ms = self.clock.now_ms().saturating_sub(active.started_at_ms);

        if active.interrupt_window_open {
            let reason = if interrupted { "interrupted" } else { "turn_ended" };
            self.events.emit(LivelyEvent::InterruptWindowClosed {
                speaker_id: speaker_id.clone(),
                reason: reason.to_string(),
            });
        }
        if !interrupted {
            self.speaker_states
                .insert(speaker_id.clone(), SpeakerState::Ready);
        }

        tracing::debug!(speaker = %speaker_id, duration_ms, interrupted, "Speaker ended");
        self.events.emit(LivelyEvent::SpeakerEnded {
            speaker_id,
            duration_ms,
            interrupted,
        });
    }

    /// Feed one streamed chunk of the active speaker's text. Returns true
    /// when a new safe boundary was recorded.
    pub fn process_token_chunk(&mut self, chunk: &str) -> bool {
        let now = self.clock.now_ms();
        let min_speaking_time_ms = self.settings.min_speaking_time_ms;
        let Some(active) = self.active.as_mut() else {
            return false;
        };

        active.partial_content.push_str(chunk);
        active.token_position += 1;
        self.events.emit(LivelyEvent::TokenChunk {
            speaker_id: active.speaker.id.clone(),
            chunk: chunk.to_string(),
            position: active.token_position,
        });

        if !active.window_opened
            && now.saturating_sub(active.started_at_ms) >= min_speaking_time_ms
        {
            active.window_opened = true;
            active.interrupt_window_open = true;
            tracing::debug!(speaker = %active.speaker.id, "Interrupt window opened");
            self.events.emit(LivelyEvent::InterruptWindowOpened {
                speaker_id: active.speaker.id.clone(),
                at_ms: now,
            });
        }

        let Some(found) = active.detector.push(chunk, now) else {
            return false;
        };
        let buffer_start = active.partial_content.len() - found.content.len();
        active.last_safe_boundary = Some(SafeBoundary {
            token_position: active.token_position,
            char_offset: buffer_start + found.end,
            strength: found.strength,
            at_ms: found.at_ms,
        });
        self.events.emit(LivelyEvent::BoundarySafe {
            speaker_id: active.speaker.id.clone(),
            position: active.token_position,
            content: found.content,
        });
        true
    }

    /// True only while a speaker is active, the session runs and the
    /// interrupt window is open.
    pub fn can_interrupt(&self) -> bool {
        self.running
            && self
                .active
                .as_ref()
                .is_some_and(|a| a.interrupt_window_open)
    }

    /// Close the interrupt window for the rest of this turn.
    pub fn close_interrupt_window(&mut self, reason: &str) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !active.interrupt_window_open {
            return;
        }
        active.interrupt_window_open = false;
        tracing::debug!(speaker = %active.speaker.id, reason, "Interrupt window closed");
        self.events.emit(LivelyEvent::InterruptWindowClosed {
            speaker_id: active.speaker.id.clone(),
            reason: reason.to_string(),
        });
    }

    pub fn active(&self) -> Option<&ActiveSpeakerState> {
        self.active.as_ref()
    }

    pub fn active_speaker(&self) -> Option<&Participant> {
        self.active.as_ref().map(|a| &a.speaker)
    }

    pub fn partial_content(&self) -> &str {
        self.active
            .as_ref()
            .map(|a| a.partial_content.as_str())
            .unwrap_or("")
    }

    /// Partial content cut at the last safe boundary, or everything spoken
    /// so far when no boundary has been found yet.
    pub fn content_through_boundary(&self) -> &str {
        match &self.active {
            Some(active) => match active.last_safe_boundary {
                Some(b) => &active.partial_content[..b.char_offset],
                None => &active.partial_content,
            },
            None => "",
        }
    }

    pub fn token_position(&self) -> usize {
        self.active.as_ref().map(|a| a.token_position).unwrap_or(0)
    }

    pub fn speaking_duration_ms(&self) -> u64 {
        self.active
            .as_ref()
            .map(|a| self.clock.now_ms().saturating_sub(a.started_at_ms))
            .unwrap_or(0)
    }

    /// Token position of the last safe boundary in this turn.
    pub fn last_safe_boundary(&self) -> Option<usize> {
        self.active
            .as_ref()
            .and_then(|a| a.last_safe_boundary)
            .map(|b| b.token_position)
    }

    pub fn speaker_state(&self, speaker_id: &str) -> SpeakerState {
        self.speaker_states
            .get(speaker_id)
            .copied()
            .unwrap_or_default()
    }

    /// Increments on every new turn.
    pub fn turn_id(&self) -> u64 {
        self.turn_id
    }

    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    pub fn settings(&self) -> &LivelySettings {
        &self.settings
    }
}
