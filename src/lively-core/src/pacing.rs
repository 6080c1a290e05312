//! Pacing modes and their timing constants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LivelyError;

/// Named timing profile for a lively debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PacingMode {
    Slow,
    #[default]
    Medium,
    Fast,
    Frantic,
}

/// Timing constants selected by a [`PacingMode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingConfig {
    /// How often the orchestrator may ask the evaluator for a decision.
    pub evaluation_interval_ms: u64,
    /// Scales the configured aggression level.
    pub base_aggression_multiplier: f32,
    /// Characters per streamed chunk when text is replayed.
    pub chunk_size: usize,
    /// Minimum time between two reported safe boundaries.
    pub min_boundary_gap_ms: u64,
}

impl PacingMode {
    pub fn config(self) -> PacingConfig {
        match self {
            PacingMode::Slow => PacingConfig {
                evaluation_interval_ms: 2000,
                base_aggression_multiplier: 0.5,
                chunk_size: 50,
                min_boundary_gap_ms: 1500,
            },
            PacingMode::Medium => PacingConfig {
                evaluation_interval_ms: 1000,
                base_aggression_multiplier: 1.0,
                chunk_size: 30,
                min_boundary_gap_ms: 800,
            },
            PacingMode::Fast => PacingConfig {
                evaluation_interval_ms: 500,
                base_aggression_multiplier: 1.5,
                chunk_size: 20,
                min_boundary_gap_ms: 400,
            },
            PacingMode::Frantic => PacingConfig {
                evaluation_interval_ms: 250,
                base_aggression_multiplier: 2.0,
                chunk_size: 10,
                min_boundary_gap_ms: 200,
            },
        }
    }

    /// Fast modes accept clause-level cut points.
    pub fn allows_weak_boundaries(self) -> bool {
        matches!(self, PacingMode::Fast | PacingMode::Frantic)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PacingMode::Slow => "slow",
            PacingMode::Medium => "medium",
            PacingMode::Fast => "fast",
            PacingMode::Frantic => "frantic",
        }
    }
}

impl fmt::Display for PacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PacingMode {
    type Err = LivelyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "slow" => Ok(PacingMode::Slow),
            "medium" => Ok(PacingMode::Medium),
            "fast" => Ok(PacingMode::Fast),
            "frantic" => Ok(PacingMode::Frantic),
            other => Err(LivelyError::UnknownPacingMode(other.to_string())),
        }
    }
}

impl PacingConfig {
    /// Evaluation cadence once the aggression level (1-5, 3 is neutral) has
    /// been applied. Clamped to a quarter and four times the base interval.
    pub fn evaluation_interval_for(&self, aggression_level: u8) -> u64 {
        let base = self.evaluation_interval_ms as f32;
        let scale = self.base_aggression_multiplier * f32::from(aggression_level.max(1)) / 3.0;
        let interval = base / scale.max(f32::EPSILON);
        interval.clamp(base / 4.0, base * 4.0).round() as u64
    }
}
