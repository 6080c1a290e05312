//! Decides whether, by whom and why the current speaker gets interrupted.
//!
//! One evaluator per debate session. A proposal walks the same path every
//! time: eligibility, a local heuristic pass, an optional deep evaluation
//! through the completion client, validation and the urgency threshold.
//! Every failure along the way is logged and reported as "no interruption";
//! nothing here can stall the debate.
//!
//! Cooldowns, counters and the audit trail only change when a candidate is
//! recorded, so a caller that proposes and then drops the candidate leaves
//! no trace.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::completion::{CompletionClient, CompletionOptions};
use crate::config::{CompletionSettings, InterruptionConfig, MAX_AGGRESSIVENESS};
use crate::error::LivelyError;
use crate::heuristics::{HeuristicClassifier, HeuristicResult};
use crate::participant::{DebateMessage, Participant};
use crate::prompt::{PromptInput, build_evaluation_prompt};
use crate::response::{DeepEvaluation, EvaluationFailure, parse_decision};
use crate::store::InterruptionStore;
use crate::trigger::{InterruptionCandidate, TriggerReason};

/// Attempts made to persist one accepted interruption.
const PERSIST_ATTEMPTS: u32 = 3;

/// The moment being evaluated.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub current_speaker: Participant,
    pub other_participants: Vec<Participant>,
    /// The most recent text from the current speaker.
    pub recent_fragment: String,
    pub recent_transcript: Vec<DebateMessage>,
    pub topic: String,
}

impl EvaluationContext {
    pub fn new(
        current_speaker: Participant,
        other_participants: Vec<Participant>,
        recent_fragment: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            current_speaker,
            other_participants,
            recent_fragment: recent_fragment.into(),
            recent_transcript: Vec::new(),
            topic: topic.into(),
        }
    }

    pub fn with_transcript(mut self, transcript: Vec<DebateMessage>) -> Self {
        self.recent_transcript = transcript;
        self
    }
}

/// Aggregate interruption counts for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InterruptStats {
    pub total: u32,
    pub by_participant: BTreeMap<String, u32>,
    pub by_reason: BTreeMap<TriggerReason, u32>,
}

/// Per-participant counters combined with live cooldown state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantInterruptCount {
    pub participant_id: String,
    pub count: u32,
    pub last_interrupt_ms: Option<u64>,
    pub cooldown_remaining_secs: u64,
}

/// Interruption decisions and cooldown bookkeeping for one session.
pub struct InterruptionEvaluator {
    session_id: String,
    config: InterruptionConfig,
    completion_options: CompletionOptions,
    clock: Arc<dyn Clock>,
    heuristics: HeuristicClassifier,
    completion: Option<Arc<dyn CompletionClient>>,
    store: Option<Arc<dyn InterruptionStore>>,
    last_interrupt: HashMap<String, u64>,
    counts: HashMap<String, u32>,
    reason_counts: BTreeMap<TriggerReason, u32>,
    pending_writes: Vec<JoinHandle<()>>,
}

impl InterruptionEvaluator {
    pub fn new(
        session_id: impl Into<String>,
        config: InterruptionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            config,
            completion_options: CompletionOptions::from(&CompletionSettings::default()),
            clock,
            heuristics: HeuristicClassifier::default(),
            completion: None,
            store: None,
            last_interrupt: HashMap::new(),
            counts: HashMap::new(),
            reason_counts: BTreeMap::new(),
            pending_writes: Vec::new(),
        }
    }

    /// Enable deep evaluation through `client`.
    pub fn with_completion(
        mut self,
        client: Arc<dyn CompletionClient>,
        options: CompletionOptions,
    ) -> Self {
        self.completion = Some(client);
        self.completion_options = options;
        self
    }

    /// Persist accepted interruptions to `store`.
    pub fn with_store(mut self, store: Arc<dyn InterruptionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_heuristics(mut self, heuristics: HeuristicClassifier) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &InterruptionConfig {
        &self.config
    }

    /// Decide whether someone should interrupt the current speaker now and
    /// record the accepted candidate straight away.
    pub async fn evaluate_interrupt(
        &mut self,
        ctx: &EvaluationContext,
    ) -> Option<InterruptionCandidate> {
        let candidate = self.propose_interrupt(ctx).await?;
        self.record_accepted(&candidate).then_some(candidate)
    }

    /// Same decision as [`evaluate_interrupt`](Self::evaluate_interrupt)
    /// without touching cooldowns, counters or the store. Call
    /// [`record_accepted`](Self::record_accepted) once the interruption
    /// actually happens.
    pub async fn propose_interrupt(
        &self,
        ctx: &EvaluationContext,
    ) -> Option<InterruptionCandidate> {
        if !self.config.enabled {
            tracing::debug!("Interruptions disabled");
            return None;
        }
        if !self.config.allow_participant_interruptions {
            tracing::debug!("Participant interruptions disallowed");
            return None;
        }

        let eligible = self.eligible_interrupters(ctx);
        if eligible.is_empty() {
            tracing::debug!(speaker = %ctx.current_speaker.id, "No eligible interrupters");
            return None;
        }

        let heuristic = self.heuristics.classify(&ctx.recent_fragment);
        if !heuristic.potential_trigger
            && self.config.effective_aggressiveness() < MAX_AGGRESSIVENESS
        {
            tracing::debug!("Heuristic miss, skipping deep evaluation");
            return None;
        }

        let decision = match self.deep_evaluate(ctx, &eligible, &heuristic).await {
            Ok(DeepEvaluation::Interrupt(decision)) => decision,
            Ok(DeepEvaluation::Declined) => {
                tracing::debug!("Deep evaluation declined to interrupt");
                return None;
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "Interrupt evaluation failed");
                return None;
            }
        };

        let threshold = self.urgency_threshold();
        if decision.urgency < threshold {
            tracing::debug!(
                urgency = decision.urgency,
                threshold,
                "Interruption below urgency threshold"
            );
            return None;
        }

        Some(InterruptionCandidate {
            interrupting_participant: decision.interrupter_id,
            interrupted_participant: ctx.current_speaker.id.clone(),
            trigger_reason: decision.reason,
            trigger_content: decision
                .trigger_phrase
                .or(heuristic.matched_text)
                .unwrap_or_else(|| ctx.recent_fragment.trim().to_string()),
            urgency: decision.urgency,
            suggested_opener: decision
                .suggested_opener
                .unwrap_or_else(|| decision.reason.default_opener().to_string()),
        })
    }

    /// Commit a proposed candidate: start the interrupter's cooldown, bump
    /// the counters and queue the audit write. Returns false, recording
    /// nothing, if the interrupter is already cooling down.
    pub fn record_accepted(&mut self, candidate: &InterruptionCandidate) -> bool {
        if !self.can_interrupt(&candidate.interrupting_participant) {
            tracing::debug!(
                interrupter = %candidate.interrupting_participant,
                "Interrupter already cooling down, not recording"
            );
            return false;
        }
        self.record_interrupt(candidate);
        true
    }

    /// Other participants who are out of cooldown.
    pub fn eligible_interrupters<'a>(&self, ctx: &'a EvaluationContext) -> Vec<&'a Participant> {
        ctx.other_participants
            .iter()
            .filter(|p| p.id != ctx.current_speaker.id && self.can_interrupt(&p.id))
            .collect()
    }

    async fn deep_evaluate(
        &self,
        ctx: &EvaluationContext,
        eligible: &[&Participant],
        heuristic: &HeuristicResult,
    ) -> Result<DeepEvaluation, EvaluationFailure> {
        let client = self.completion.as_ref().ok_or(EvaluationFailure::Unavailable)?;

        let prompt = build_evaluation_prompt(&PromptInput {
            topic: &ctx.topic,
            aggressiveness: self.config.effective_aggressiveness(),
            current_speaker: &ctx.current_speaker,
            eligible,
            recent_transcript: &ctx.recent_transcript,
            fragment: &ctx.recent_fragment,
            heuristic,
        });

        let timeout_ms = self.config.evaluation_timeout_ms;
        let completion = client.complete(&prompt, self.completion_options);
        let raw = match tokio::time::timeout(Duration::from_millis(timeout_ms), completion).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(EvaluationFailure::Transport(e.to_string())),
            Err(_) => return Err(EvaluationFailure::TimedOut(timeout_ms)),
        };

        parse_decision(&raw, eligible)
    }

    /// Cooldown, counters and the audit write for an accepted candidate.
    fn record_interrupt(&mut self, candidate: &InterruptionCandidate) {
        let now = self.clock.now_ms();
        let id = candidate.interrupting_participant.clone();

        self.last_interrupt.insert(id.clone(), now);
        *self.counts.entry(id).or_insert(0) += 1;
        *self.reason_counts.entry(candidate.trigger_reason).or_insert(0) += 1;

        tracing::info!(
            session = %self.session_id,
            interrupter = %candidate.interrupting_participant,
            interrupted = %candidate.interrupted_participant,
            reason = %candidate.trigger_reason,
            urgency = candidate.urgency,
            "Interruption accepted"
        );

        self.persist(candidate.clone(), now);
    }

    /// Hand the audit write to a background task. The outcome never
    /// reaches the caller; after the last attempt the record is logged.
    fn persist(&mut self, candidate: InterruptionCandidate, fired_at_ms: u64) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, interruption not persisted");
            return;
        };

        self.pending_writes.retain(|h| !h.is_finished());
        let session_id = self.session_id.clone();
        self.pending_writes.push(handle.spawn(async move {
            for attempt in 0..PERSIST_ATTEMPTS {
                if attempt > 0 {
                    tokio::time::sleep(Duration::from_millis(100 << attempt)).await;
                }
                match store
                    .save_interruption(&session_id, &candidate, fired_at_ms)
                    .await
                {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::warn!(attempt, error = %e, "Failed to persist interruption");
                    }
                }
            }
            tracing::error!(
                session = %session_id,
                record = %serde_json::to_string(&candidate).unwrap_or_default(),
                fired_at_ms,
                "Dropping interruption record after {} attempts",
                PERSIST_ATTEMPTS
            );
        }));
    }

    /// Wait for outstanding audit writes.
    pub async fn flush(&mut self) {
        for handle in self.pending_writes.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Persistence task failed");
            }
        }
    }

    /// False while `participant_id` is still cooling down.
    pub fn can_interrupt(&self, participant_id: &str) -> bool {
        match self.last_interrupt.get(participant_id) {
            Some(&last) => self.clock.now_ms().saturating_sub(last) >= self.cooldown_ms(),
            None => true,
        }
    }

    /// Whole seconds left in `participant_id`'s cooldown, rounded up.
    pub fn cooldown_remaining(&self, participant_id: &str) -> u64 {
        let Some(&last) = self.last_interrupt.get(participant_id) else {
            return 0;
        };
        last.saturating_add(self.cooldown_ms())
            .saturating_sub(self.clock.now_ms())
            .div_ceil(1000)
    }

    fn cooldown_ms(&self) -> u64 {
        self.config.cooldown_seconds.saturating_mul(1000)
    }

    /// Minimum urgency for acceptance at the configured aggressiveness.
    pub fn urgency_threshold(&self) -> f32 {
        self.config.urgency_threshold()
    }

    pub fn reset_cooldowns(&mut self) {
        self.last_interrupt.clear();
    }

    pub fn reset_counts(&mut self) {
        self.counts.clear();
        self.reason_counts.clear();
    }

    /// Operator escape hatch: record a maximum-urgency interruption without
    /// any evaluation.
    pub fn trigger_manual_interrupt(
        &mut self,
        interrupter: &Participant,
        interrupted: &Participant,
        reason: TriggerReason,
        trigger_content: &str,
        suggested_opener: Option<&str>,
    ) -> InterruptionCandidate {
        let candidate = InterruptionCandidate {
            interrupting_participant: interrupter.id.clone(),
            interrupted_participant: interrupted.id.clone(),
            trigger_reason: reason,
            trigger_content: trigger_content.to_string(),
            urgency: 1.0,
            suggested_opener: suggested_opener
                .unwrap_or(reason.default_opener())
                .to_string(),
        };
        self.record_interrupt(&candidate);
        candidate
    }

    /// Counts by participant and reason. Read from the store when one is
    /// configured, otherwise from this evaluator's counters.
    pub async fn interrupt_stats(&self) -> Result<InterruptStats, LivelyError> {
        let (by_participant, by_reason) = match &self.store {
            Some(store) => (
                store
                    .interruption_counts_by_participant(&self.session_id)
                    .await?,
                store.interruption_counts_by_reason(&self.session_id).await?,
            ),
            None => (
                self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                self.reason_counts.clone(),
            ),
        };

        Ok(InterruptStats {
            total: by_reason.values().sum(),
            by_participant,
            by_reason,
        })
    }

    /// Per-participant counts with their current cooldown.
    pub async fn detailed_interrupt_counts(
        &self,
    ) -> Result<Vec<ParticipantInterruptCount>, LivelyError> {
        let counts: BTreeMap<String, u32> = match &self.store {
            Some(store) => {
                store
                    .interruption_counts_by_participant(&self.session_id)
                    .await?
            }
            None => self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        };

        let ids: BTreeSet<&String> = counts.keys().chain(self.last_interrupt.keys()).collect();
        Ok(ids
            .into_iter()
            .map(|id| ParticipantInterruptCount {
                participant_id: id.clone(),
                count: counts.get(id).copied().unwrap_or(0),
                last_interrupt_ms: self.last_interrupt.get(id).copied(),
                cooldown_remaining_secs: self.cooldown_remaining(id),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::participant::ParticipantRole;
    use crate::store::InMemoryInterruptionStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedCompletion {
        reply: Result<String, String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedCompletion {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(error: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(error.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(interrupt_json("con", 0.95)),
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(
            &self,
            _prompt: &str,
            _options: CompletionOptions,
        ) -> Result<String, LivelyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone().map_err(LivelyError::CompletionError)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl InterruptionStore for BrokenStore {
        async fn save_interruption(
            &self,
            _: &str,
            _: &InterruptionCandidate,
            _: u64,
        ) -> Result<(), LivelyError> {
            Err(LivelyError::PersistenceError("disk full".to_string()))
        }

        async fn interruptions_by_session(
            &self,
            _: &str,
        ) -> Result<Vec<crate::store::InterruptionRecord>, LivelyError> {
            Err(LivelyError::PersistenceError("disk full".to_string()))
        }

        async fn interruption_counts_by_reason(
            &self,
            _: &str,
        ) -> Result<BTreeMap<TriggerReason, u32>, LivelyError> {
            Err(LivelyError::PersistenceError("disk full".to_string()))
        }

        async fn interruption_counts_by_participant(
            &self,
            _: &str,
        ) -> Result<BTreeMap<String, u32>, LivelyError> {
            Err(LivelyError::PersistenceError("disk full".to_string()))
        }
    }

    fn interrupt_json(id: &str, urgency: f32) -> String {
        format!(
            r#"{{"should_interrupt": true, "interrupter_id": "{}", "reason": "straw_man_detected", "urgency": {}, "trigger_phrase": "just want", "suggested_opener": "That's not our position."}}"#,
            id, urgency
        )
    }

    fn config(aggressiveness: u8) -> InterruptionConfig {
        InterruptionConfig {
            aggressiveness,
            cooldown_seconds: 20,
            ..InterruptionConfig::default()
        }
    }

    fn build_evaluator(
        config: InterruptionConfig,
        completion: Arc<ScriptedCompletion>,
    ) -> (InterruptionEvaluator, ManualClock) {
        let clock = ManualClock::new(100_000);
        let evaluator = InterruptionEvaluator::new("session-1", config, Arc::new(clock.clone()))
            .with_completion(completion, CompletionOptions::from(&CompletionSettings::default()));
        (evaluator, clock)
    }

    fn context(fragment: &str) -> EvaluationContext {
        EvaluationContext::new(
            Participant::new("pro", "Avery", ParticipantRole::For),
            vec![Participant::new("con", "Blake", ParticipantRole::Against)],
            fragment,
            "Carbon taxes",
        )
    }

    const STRAW_MAN: &str = "They just want to avoid regulation entirely.";
    const NEUTRAL: &str = "Our plan invests in rural broadband and job training.";

    #[tokio::test]
    async fn test_accepts_and_records_candidate() {
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 0.9));
        let (mut evaluator, _) = build_evaluator(config(3), completion.clone());

        let candidate = evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.unwrap();
        assert_eq!(candidate.interrupting_participant, "con");
        assert_eq!(candidate.interrupted_participant, "pro");
        assert_eq!(candidate.trigger_reason, TriggerReason::StrawManDetected);
        assert_eq!(candidate.trigger_content, "just want");
        assert_eq!(candidate.suggested_opener, "That's not our position.");
        assert!(!evaluator.can_interrupt("con"));
        assert_eq!(evaluator.cooldown_remaining("con"), 20);
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_short_circuits() {
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 1.0));
        let disabled = InterruptionConfig { enabled: false, ..config(5) };
        let (mut evaluator, _) = build_evaluator(disabled, completion.clone());
        assert!(evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.is_none());

        let no_participants = InterruptionConfig {
            allow_participant_interruptions: false,
            ..config(5)
        };
        let (mut evaluator, _) = build_evaluator(no_participants, completion.clone());
        assert!(evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.is_none());
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_speaker_is_never_eligible() {
        let completion = ScriptedCompletion::replying(&interrupt_json("pro", 1.0));
        let (mut evaluator, _) = build_evaluator(config(5), completion.clone());
        let mut ctx = context(STRAW_MAN);
        ctx.other_participants = vec![ctx.current_speaker.clone()];
        assert!(evaluator.evaluate_interrupt(&ctx).await.is_none());
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_heuristic_miss_skips_network_below_top_tier() {
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 1.0));
        let (mut evaluator, _) = build_evaluator(config(4), completion.clone());
        assert!(evaluator.evaluate_interrupt(&context(NEUTRAL)).await.is_none());
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_top_tier_bypasses_heuristic() {
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 0.6));
        let (mut evaluator, _) = build_evaluator(config(5), completion.clone());
        let candidate = evaluator.evaluate_interrupt(&context(NEUTRAL)).await.unwrap();
        assert_eq!(completion.calls(), 1);
        assert_eq!(candidate.urgency, 0.6);
    }

    #[tokio::test]
    async fn test_threshold_depends_on_aggressiveness() {
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 0.5));
        let (mut timid, _) = build_evaluator(config(1), completion.clone());
        assert!(timid.evaluate_interrupt(&context(STRAW_MAN)).await.is_none());
        assert!(timid.can_interrupt("con"));

        let (mut combative, _) = build_evaluator(config(5), completion);
        assert!(combative.evaluate_interrupt(&context(STRAW_MAN)).await.is_some());
    }

    #[tokio::test]
    async fn test_failures_degrade_to_none() {
        for completion in [
            ScriptedCompletion::replying("I'd rather not say."),
            ScriptedCompletion::replying(r#"{"should_interrupt": true, "urgency": 0.9}"#),
            ScriptedCompletion::replying(&interrupt_json("ghost", 0.9)),
            ScriptedCompletion::replying(r#"{"should_interrupt": false}"#),
            ScriptedCompletion::failing("connection reset"),
        ] {
            let (mut evaluator, _) = build_evaluator(config(5), completion);
            assert!(evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.is_none());
            assert!(evaluator.can_interrupt("con"));
        }
    }

    #[tokio::test]
    async fn test_no_completion_client_means_no_interrupt() {
        let clock = ManualClock::new(0);
        let mut evaluator = InterruptionEvaluator::new("s", config(5), Arc::new(clock));
        assert!(evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_none() {
        let completion = ScriptedCompletion::slow(Duration::from_secs(5));
        let fast_timeout = InterruptionConfig {
            evaluation_timeout_ms: 20,
            ..config(5)
        };
        let (mut evaluator, _) = build_evaluator(fast_timeout, completion.clone());
        assert!(evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.is_none());
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_phrase_and_opener_fall_back() {
        let completion = ScriptedCompletion::replying(
            r#"{"should_interrupt": true, "interrupter_id": "con", "reason": "nonsense", "urgency": 0.9}"#,
        );
        let (mut evaluator, _) = build_evaluator(config(3), completion);
        let candidate = evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.unwrap();
        assert_eq!(candidate.trigger_reason, TriggerReason::DirectChallenge);
        assert_eq!(candidate.trigger_content, "They just want");
        assert_eq!(
            candidate.suggested_opener,
            TriggerReason::DirectChallenge.default_opener()
        );
    }

    #[tokio::test]
    async fn test_cooldown_expires_exactly_at_threshold() {
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 0.9));
        let (mut evaluator, clock) = build_evaluator(config(3), completion);
        evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.unwrap();

        clock.advance(19_999);
        assert!(!evaluator.can_interrupt("con"));
        assert_eq!(evaluator.cooldown_remaining("con"), 1);

        clock.advance(1);
        assert!(evaluator.can_interrupt("con"));
        assert_eq!(evaluator.cooldown_remaining("con"), 0);
    }

    #[tokio::test]
    async fn test_cooldown_remaining_rounds_up() {
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 0.9));
        let (mut evaluator, clock) = build_evaluator(config(3), completion);
        evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.unwrap();
        clock.advance(5_500);
        assert_eq!(evaluator.cooldown_remaining("con"), 15);
        assert_eq!(evaluator.cooldown_remaining("never"), 0);
    }

    #[tokio::test]
    async fn test_huge_cooldown_saturates() {
        let completion = ScriptedCompletion::replying("unused");
        let endless = InterruptionConfig {
            cooldown_seconds: i64::MAX as u64,
            ..config(3)
        };
        let (mut evaluator, clock) = build_evaluator(endless, completion);
        let pro = Participant::new("pro", "Avery", ParticipantRole::For);
        let con = Participant::new("con", "Blake", ParticipantRole::Against);

        evaluator.trigger_manual_interrupt(&con, &pro, TriggerReason::FactualCorrection, "70%", None);
        clock.advance(3_600_000);

        assert!(!evaluator.can_interrupt("con"));
        assert_eq!(
            evaluator.cooldown_remaining("con"),
            (u64::MAX - 3_700_000).div_ceil(1000)
        );
        let detailed = evaluator.detailed_interrupt_counts().await.unwrap();
        assert!(detailed[0].cooldown_remaining_secs > 0);
    }

    #[tokio::test]
    async fn test_nan_threshold_rejects_everything() {
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 0.99));
        let broken = InterruptionConfig {
            urgency_thresholds: [f32::NAN; 5],
            ..config(3)
        };
        let (mut evaluator, _) = build_evaluator(broken, completion.clone());
        assert_eq!(evaluator.urgency_threshold(), 1.0);
        assert!(evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.is_none());
        assert!(evaluator.can_interrupt("con"));
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_proposal_leaves_no_trace_until_recorded() {
        let store = Arc::new(InMemoryInterruptionStore::new());
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 0.9));
        let (evaluator, _) = build_evaluator(config(3), completion);
        let mut evaluator = evaluator.with_store(store.clone());

        let candidate = evaluator.propose_interrupt(&context(STRAW_MAN)).await.unwrap();
        evaluator.flush().await;
        assert!(evaluator.can_interrupt("con"));
        assert_eq!(evaluator.cooldown_remaining("con"), 0);
        assert!(store.is_empty().await);

        assert!(evaluator.record_accepted(&candidate));
        assert!(!evaluator.record_accepted(&candidate));
        evaluator.flush().await;
        assert!(!evaluator.can_interrupt("con"));
        assert_eq!(store.len().await, 1);
        assert_eq!(evaluator.interrupt_stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_resets() {
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 0.9));
        let (mut evaluator, _) = build_evaluator(config(3), completion);
        evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.unwrap();

        evaluator.reset_cooldowns();
        assert!(evaluator.can_interrupt("con"));
        assert_eq!(evaluator.interrupt_stats().await.unwrap().total, 1);

        evaluator.reset_counts();
        assert_eq!(evaluator.interrupt_stats().await.unwrap(), InterruptStats::default());
    }

    #[tokio::test]
    async fn test_manual_interrupt_bypasses_evaluation() {
        let completion = ScriptedCompletion::replying("unused");
        let (mut evaluator, _) = build_evaluator(config(1), completion.clone());
        let pro = Participant::new("pro", "Avery", ParticipantRole::For);
        let moderator = Participant::new("mod", "Casey", ParticipantRole::Moderator);

        let candidate = evaluator.trigger_manual_interrupt(
            &moderator,
            &pro,
            TriggerReason::PivotalPoint,
            "time is up",
            None,
        );
        assert_eq!(candidate.urgency, 1.0);
        assert_eq!(candidate.suggested_opener, TriggerReason::PivotalPoint.default_opener());
        assert!(!evaluator.can_interrupt("mod"));
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_stats_from_store() {
        let store = Arc::new(InMemoryInterruptionStore::new());
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 0.9));
        let (evaluator, _) = build_evaluator(config(3), completion);
        let mut evaluator = evaluator.with_store(store.clone());

        evaluator.evaluate_interrupt(&context(STRAW_MAN)).await.unwrap();
        evaluator.flush().await;

        let stats = evaluator.interrupt_stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_participant["con"], 1);
        assert_eq!(stats.by_reason[&TriggerReason::StrawManDetected], 1);
        assert_eq!(store.len().await, 1);

        let detailed = evaluator.detailed_interrupt_counts().await.unwrap();
        assert_eq!(
            detailed,
            vec![ParticipantInterruptCount {
                participant_id: "con".to_string(),
                count: 1,
                last_interrupt_ms: Some(100_000),
                cooldown_remaining_secs: 20,
            }]
        );
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_unaccept() {
        let completion = ScriptedCompletion::replying(&interrupt_json("con", 0.9));
        let (evaluator, _) = build_evaluator(config(3), completion);
        let mut evaluator = evaluator.with_store(Arc::new(BrokenStore));

        let candidate = evaluator.evaluate_interrupt(&context(STRAW_MAN)).await;
        assert!(candidate.is_some());
        assert!(!evaluator.can_interrupt("con"));
        evaluator.flush().await;
        assert!(evaluator.interrupt_stats().await.is_err());
    }
}
