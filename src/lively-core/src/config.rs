//! Configuration module for loading TOML config files.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::LivelyError;
use crate::pacing::{PacingConfig, PacingMode};

/// Urgency a deep evaluation must reach, indexed by aggressiveness 1..=5.
pub const DEFAULT_URGENCY_THRESHOLDS: [f32; 5] = [0.9, 0.8, 0.7, 0.55, 0.4];

/// Aggressiveness at which the heuristic pre-filter is bypassed.
pub const MAX_AGGRESSIVENESS: u8 = 5;

/// Longest cooldown accepted from configuration, one day.
pub const MAX_COOLDOWN_SECONDS: u64 = 86_400;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LivelyConfig {
    pub lively: LivelySettings,
    pub interruptions: InterruptionConfig,
    pub completion: CompletionSettings,
}

/// Session-level pacing of a lively debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivelySettings {
    pub pacing_mode: PacingMode,
    /// 1 (calm) to 5 (combative); 3 leaves the pacing cadence unchanged.
    pub aggression_level: u8,
    /// Continuous speaking time before the interrupt window may open.
    pub min_speaking_time_ms: u64,
    pub max_interrupts_per_minute: u32,
}

impl Default for LivelySettings {
    fn default() -> Self {
        Self {
            pacing_mode: PacingMode::Medium,
            aggression_level: 3,
            min_speaking_time_ms: 3000,
            max_interrupts_per_minute: 2,
        }
    }
}

impl LivelySettings {
    pub fn pacing(&self) -> PacingConfig {
        self.pacing_mode.config()
    }
}

/// Interruption policy for one debate session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterruptionConfig {
    pub enabled: bool,
    pub allow_participant_interruptions: bool,
    /// 1 (rarely interrupt) to 5 (interrupt readily).
    pub aggressiveness: u8,
    pub cooldown_seconds: u64,
    pub urgency_thresholds: [f32; 5],
    /// Upper bound on one deep evaluation, transport retries included.
    pub evaluation_timeout_ms: u64,
}

impl Default for InterruptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_participant_interruptions: true,
            aggressiveness: 3,
            cooldown_seconds: 30,
            urgency_thresholds: DEFAULT_URGENCY_THRESHOLDS,
            evaluation_timeout_ms: 20_000,
        }
    }
}

impl InterruptionConfig {
    /// Aggressiveness clamped into 1..=5.
    pub fn effective_aggressiveness(&self) -> u8 {
        self.aggressiveness.clamp(1, MAX_AGGRESSIVENESS)
    }

    /// Threshold for the effective aggressiveness, clamped into [0, 1].
    /// A NaN entry accepts nothing.
    pub fn urgency_threshold(&self) -> f32 {
        let idx = usize::from(self.effective_aggressiveness() - 1);
        let threshold = self.urgency_thresholds[idx];
        if threshold.is_nan() {
            return 1.0;
        }
        threshold.clamp(0.0, 1.0)
    }
}

/// Settings for the deep-evaluation completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 300,
        }
    }
}

impl LivelyConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LivelyError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| LivelyError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, LivelyError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| LivelyError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot honor.
    pub fn validate(&self) -> Result<(), LivelyError> {
        let agg = self.interruptions.aggressiveness;
        if !(1..=MAX_AGGRESSIVENESS).contains(&agg) {
            return Err(LivelyError::ConfigError(format!(
                "aggressiveness must be between 1 and {}, got {}",
                MAX_AGGRESSIVENESS, agg
            )));
        }

        let level = self.lively.aggression_level;
        if !(1..=5).contains(&level) {
            return Err(LivelyError::ConfigError(format!(
                "aggression_level must be between 1 and 5, got {}",
                level
            )));
        }

        let thresholds = &self.interruptions.urgency_thresholds;
        if thresholds
            .iter()
            .any(|t| !t.is_finite() || !(0.0..=1.0).contains(t))
        {
            return Err(LivelyError::ConfigError(
                "urgency_thresholds must lie within [0, 1]".to_string(),
            ));
        }
        if thresholds.windows(2).any(|w| w[1] > w[0]) {
            return Err(LivelyError::ConfigError(
                "urgency_thresholds must not increase with aggressiveness".to_string(),
            ));
        }

        let cooldown = self.interruptions.cooldown_seconds;
        if cooldown > MAX_COOLDOWN_SECONDS {
            return Err(LivelyError::ConfigError(format!(
                "cooldown_seconds must be at most {}, got {}",
                MAX_COOLDOWN_SECONDS, cooldown
            )));
        }

        if self.lively.max_interrupts_per_minute == 0 {
            return Err(LivelyError::ConfigError(
                "max_interrupts_per_minute must be at least 1".to_string(),
            ));
        }

        if self.interruptions.evaluation_timeout_ms == 0 {
            return Err(LivelyError::ConfigError(
                "evaluation_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
