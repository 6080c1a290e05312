//! Live session orchestration.
//!
//! Drives one speaker's streamed turn through the tracker and, at safe
//! boundaries, runs interruption evaluations in the background while the
//! stream keeps flowing. A background evaluation only proposes; the
//! interruption is recorded when it fires.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinError, JoinHandle};

use crate::clock::Clock;
use crate::completion::{CompletionClient, CompletionOptions};
use crate::config::LivelyConfig;
use crate::error::LivelyError;
use crate::evaluator::{EvaluationContext, InterruptionEvaluator};
use crate::events::{EventBus, LivelyEvent};
use crate::participant::{DebateMessage, Participant};
use crate::store::InterruptionStore;
use crate::trigger::InterruptionCandidate;
use crate::turn_state::TurnStateTracker;

/// Sliding window for the per-minute interruption cap.
const RATE_WINDOW_MS: u64 = 60_000;

type PendingEvaluation = JoinHandle<Option<InterruptionCandidate>>;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Cut off by another participant. `content` stops at the last safe
    /// boundary.
    Interrupted {
        content: String,
        candidate: InterruptionCandidate,
    },
    /// The stream ran to its end.
    Completed { content: String },
}

impl TurnOutcome {
    pub fn content(&self) -> &str {
        match self {
            TurnOutcome::Interrupted { content, .. } | TurnOutcome::Completed { content } => {
                content
            }
        }
    }

    pub fn candidate(&self) -> Option<&InterruptionCandidate> {
        match self {
            TurnOutcome::Interrupted { candidate, .. } => Some(candidate),
            TurnOutcome::Completed { .. } => None,
        }
    }
}

/// One live debate session: tracker, evaluator and event bus.
pub struct LivelySession {
    session_id: String,
    clock: Arc<dyn Clock>,
    events: EventBus,
    tracker: TurnStateTracker,
    evaluator: Arc<Mutex<InterruptionEvaluator>>,
    fired_at: VecDeque<u64>,
    last_evaluation_ms: Option<u64>,
}

impl LivelySession {
    /// Build a session. `completion` enables deep evaluation and `store`
    /// enables the interruption audit trail; both are optional.
    pub fn new(
        session_id: impl Into<String>,
        config: LivelyConfig,
        clock: Arc<dyn Clock>,
        completion: Option<Arc<dyn CompletionClient>>,
        store: Option<Arc<dyn InterruptionStore>>,
    ) -> Result<Self, LivelyError> {
        config.validate()?;
        let session_id = session_id.into();
        let events = EventBus::new();

        let tracker = TurnStateTracker::new(config.lively.clone(), clock.clone(), events.clone());

        let mut evaluator =
            InterruptionEvaluator::new(session_id.clone(), config.interruptions, clock.clone());
        if let Some(completion) = completion {
            evaluator =
                evaluator.with_completion(completion, CompletionOptions::from(&config.completion));
        }
        if let Some(store) = store {
            evaluator = evaluator.with_store(store);
        }

        Ok(Self {
            session_id,
            clock,
            events,
            tracker,
            evaluator: Arc::new(Mutex::new(evaluator)),
            fired_at: VecDeque::new(),
            last_evaluation_ms: None,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn tracker(&self) -> &TurnStateTracker {
        &self.tracker
    }

    pub fn evaluator(&self) -> &Arc<Mutex<InterruptionEvaluator>> {
        &self.evaluator
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn start(&mut self) {
        self.tracker.start(self.clock.now_ms());
        tracing::info!(session = %self.session_id, "Lively session started");
    }

    /// Close any active turn and wait for outstanding audit writes.
    pub async fn stop(&mut self) {
        self.tracker.stop();
        self.evaluator.lock().await.flush().await;
        tracing::info!(session = %self.session_id, "Lively session stopped");
    }

    /// Stream one turn for `speaker` until the chunks run out or someone
    /// interrupts.
    pub async fn run_turn(
        &mut self,
        speaker: &Participant,
        others: &[Participant],
        mut chunks: mpsc::Receiver<String>,
        transcript: &[DebateMessage],
        topic: &str,
    ) -> TurnOutcome {
        self.tracker.start_speaker(speaker);
        let mut pending: Option<PendingEvaluation> = None;
        let mut fragment_start = 0;

        loop {
            tokio::select! {
                chunk = chunks.recv() => {
                    let Some(chunk) = chunk else {
                        break;
                    };
                    if !self.tracker.process_token_chunk(&chunk) {
                        continue;
                    }

                    let cut = self
                        .tracker
                        .active()
                        .and_then(|a| a.last_safe_boundary)
                        .map(|b| b.char_offset)
                        .unwrap_or(fragment_start);
                    let fragment = self.tracker.partial_content()[fragment_start..cut].to_string();
                    fragment_start = cut;

                    if pending.is_none() && !fragment.trim().is_empty() && self.should_evaluate() {
                        self.last_evaluation_ms = Some(self.clock.now_ms());
                        let ctx = EvaluationContext::new(
                            speaker.clone(),
                            others.to_vec(),
                            fragment,
                            topic,
                        )
                        .with_transcript(transcript.to_vec());
                        pending = Some(self.spawn_evaluation(ctx));
                    }
                }
                joined = join_pending(&mut pending), if pending.is_some() => {
                    pending = None;
                    match joined {
                        Ok(Some(candidate)) => {
                            if let Some(outcome) = self.fire(speaker, candidate).await {
                                return outcome;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => tracing::warn!(error = %e, "Evaluation task failed"),
                    }
                }
            }
        }

        // Proposals are only recorded by fire.
        if let Some(handle) = pending.take() {
            handle.abort();
            tracing::debug!("Turn ended with an evaluation in flight, discarding it");
        }
        let content = self.tracker.partial_content().to_string();
        self.tracker.end_speaker();
        TurnOutcome::Completed { content }
    }

    fn spawn_evaluation(&self, ctx: EvaluationContext) -> PendingEvaluation {
        let evaluator = self.evaluator.clone();
        tokio::spawn(async move { evaluator.lock().await.propose_interrupt(&ctx).await })
    }

    /// Window open, cadence elapsed and the per-minute cap not reached.
    fn should_evaluate(&mut self) -> bool {
        if !self.tracker.can_interrupt() {
            return false;
        }

        let now = self.clock.now_ms();
        let interval = self
            .tracker
            .pacing()
            .evaluation_interval_for(self.tracker.settings().aggression_level);
        if self
            .last_evaluation_ms
            .is_some_and(|last| now.saturating_sub(last) < interval)
        {
            return false;
        }

        while self
            .fired_at
            .front()
            .is_some_and(|&t| now.saturating_sub(t) >= RATE_WINDOW_MS)
        {
            self.fired_at.pop_front();
        }
        let cap = self.tracker.settings().max_interrupts_per_minute as usize;
        if self.fired_at.len() >= cap {
            tracing::debug!(cap, "Per-minute interruption cap reached");
            return false;
        }
        true
    }

    /// Record `candidate` and cut the turn. `None` if the evaluator refuses
    /// it because the interrupter started a cooldown in the meantime.
    async fn fire(
        &mut self,
        speaker: &Participant,
        candidate: InterruptionCandidate,
    ) -> Option<TurnOutcome> {
        if !self.evaluator.lock().await.record_accepted(&candidate) {
            return None;
        }

        self.fired_at.push_back(self.clock.now_ms());
        self.tracker.close_interrupt_window("interruption");
        let content = self.tracker.content_through_boundary().to_string();

        tracing::info!(
            session = %self.session_id,
            interrupter = %candidate.interrupting_participant,
            interrupted = %speaker.id,
            reason = %candidate.trigger_reason,
            "Interruption fired"
        );
        self.events.emit(LivelyEvent::InterruptionFired {
            candidate: candidate.clone(),
        });
        self.tracker.mark_interrupted(&speaker.id);

        Some(TurnOutcome::Interrupted { content, candidate })
    }
}

async fn join_pending(
    pending: &mut Option<PendingEvaluation>,
) -> Result<Option<InterruptionCandidate>, JoinError> {
    match pending {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::participant::{ParticipantRole, SpeakerState};
    use async_trait::async_trait;

    struct Reply(&'static str);

    #[async_trait]
    impl CompletionClient for Reply {
        async fn complete(
            &self,
            _prompt: &str,
            _options: CompletionOptions,
        ) -> Result<String, LivelyError> {
            Ok(self.0.to_string())
        }
    }

    /// Gives the runtime one chance to switch tasks before answering.
    struct YieldThenReply(&'static str);

    #[async_trait]
    impl CompletionClient for YieldThenReply {
        async fn complete(
            &self,
            _prompt: &str,
            _options: CompletionOptions,
        ) -> Result<String, LivelyError> {
            tokio::task::yield_now().await;
            Ok(self.0.to_string())
        }
    }

    const ACCEPT: &str = r#"{"should_interrupt": true, "interrupter_id": "con", "reason": "straw_man_detected", "urgency": 0.9}"#;
    const DECLINE: &str = r#"{"should_interrupt": false}"#;

    fn session(reply: &'static str) -> LivelySession {
        session_with(Arc::new(Reply(reply)))
    }

    fn session_with(completion: Arc<dyn CompletionClient>) -> LivelySession {
        let mut config = LivelyConfig::default();
        config.lively.min_speaking_time_ms = 0;
        let mut session = LivelySession::new(
            "session-1",
            config,
            Arc::new(ManualClock::new(1_000)),
            Some(completion),
            None,
        )
        .unwrap();
        session.start();
        session
    }

    fn people() -> (Participant, Vec<Participant>) {
        (
            Participant::new("pro", "Avery", ParticipantRole::For),
            vec![Participant::new("con", "Blake", ParticipantRole::Against)],
        )
    }

    #[tokio::test]
    async fn test_turn_completes_when_nobody_interrupts() {
        let mut session = session(DECLINE);
        let (pro, others) = people();
        let (tx, rx) = mpsc::channel(8);
        for chunk in ["They just want chaos. ", "That is all."] {
            tx.send(chunk.to_string()).await.unwrap();
        }
        drop(tx);

        let outcome = session.run_turn(&pro, &others, rx, &[], "Carbon taxes").await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                content: "They just want chaos. That is all.".to_string()
            }
        );
        assert!(session.tracker().active().is_none());
        assert_eq!(session.tracker().speaker_state("pro"), SpeakerState::Ready);
    }

    #[tokio::test]
    async fn test_accepted_interruption_cuts_at_boundary() {
        let mut session = session(ACCEPT);
        let mut events = session.events().subscribe();
        let (pro, others) = people();
        let (tx, rx) = mpsc::channel(8);
        for chunk in ["They just want to avoid regulation entirely. ", "And next"] {
            tx.send(chunk.to_string()).await.unwrap();
        }

        let outcome = session.run_turn(&pro, &others, rx, &[], "Carbon taxes").await;
        drop(tx);

        assert_eq!(
            outcome.content().trim(),
            "They just want to avoid regulation entirely."
        );
        let candidate = outcome.candidate().unwrap();
        assert_eq!(candidate.interrupting_participant, "con");
        assert_eq!(candidate.interrupted_participant, "pro");
        assert_eq!(session.tracker().speaker_state("pro"), SpeakerState::Interrupted);
        assert!(session.tracker().active().is_none());

        let mut fired = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, LivelyEvent::InterruptionFired { .. }) {
                fired = true;
            }
        }
        assert!(fired);
    }

    #[tokio::test]
    async fn test_per_minute_cap_blocks_evaluation() {
        let mut session = session(ACCEPT);
        session.fired_at.extend([1_000, 1_000]);
        let (pro, others) = people();
        let (tx, rx) = mpsc::channel(8);
        tx.send("They just want chaos. ".to_string()).await.unwrap();
        drop(tx);

        let outcome = session.run_turn(&pro, &others, rx, &[], "Carbon taxes").await;
        assert!(outcome.candidate().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_completed_turn_leaves_no_interrupt_bookkeeping() {
        let (pro, others) = people();
        for _ in 0..50 {
            let mut session = session_with(Arc::new(YieldThenReply(ACCEPT)));
            let (tx, rx) = mpsc::channel(8);
            tx.send("They just want chaos. ".to_string()).await.unwrap();
            drop(tx);

            let outcome = session.run_turn(&pro, &others, rx, &[], "Carbon taxes").await;
            let evaluator = session.evaluator().lock().await;
            let total = evaluator.interrupt_stats().await.unwrap().total;
            match outcome {
                TurnOutcome::Completed { .. } => {
                    assert!(evaluator.can_interrupt("con"));
                    assert_eq!(total, 0);
                }
                TurnOutcome::Interrupted { .. } => {
                    assert!(!evaluator.can_interrupt("con"));
                    assert_eq!(total, 1);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = LivelyConfig::default();
        config.interruptions.aggressiveness = 9;
        let result = LivelySession::new("s", config, Arc::new(ManualClock::new(0)), None, None);
        assert!(matches!(result, Err(LivelyError::ConfigError(_))));
    }
}
