//! What the scheduler needs from persistence.
//!
//! Storage is never consulted for the decision itself; an evaluator built
//! without a store behaves identically apart from the audit trail.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::LivelyError;
use crate::trigger::{InterruptionCandidate, TriggerReason};

/// An accepted interruption as written to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptionRecord {
    pub id: Uuid,
    pub session_id: String,
    pub candidate: InterruptionCandidate,
    pub fired_at_ms: u64,
}

/// Persistence collaborator for accepted interruptions.
#[async_trait]
pub trait InterruptionStore: Send + Sync {
    async fn save_interruption(
        &self,
        session_id: &str,
        candidate: &InterruptionCandidate,
        fired_at_ms: u64,
    ) -> Result<(), LivelyError>;

    async fn interruptions_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<InterruptionRecord>, LivelyError>;

    async fn interruption_counts_by_reason(
        &self,
        session_id: &str,
    ) -> Result<BTreeMap<TriggerReason, u32>, LivelyError>;

    async fn interruption_counts_by_participant(
        &self,
        session_id: &str,
    ) -> Result<BTreeMap<String, u32>, LivelyError>;
}

/// Process-local store, mostly for tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemoryInterruptionStore {
    records: RwLock<Vec<InterruptionRecord>>,
}

impl InMemoryInterruptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl InterruptionStore for InMemoryInterruptionStore {
    async fn save_interruption(
        &self,
        session_id: &str,
        candidate: &InterruptionCandidate,
        fired_at_ms: u64,
    ) -> Result<(), LivelyError> {
        let record = InterruptionRecord {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            candidate: candidate.clone(),
            fired_at_ms,
        };
        self.records.write().await.push(record);
        tracing::debug!(session_id, "Interruption saved");
        Ok(())
    }

    async fn interruptions_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<InterruptionRecord>, LivelyError> {
        let mut records: Vec<InterruptionRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.fired_at_ms);
        Ok(records)
    }

    async fn interruption_counts_by_reason(
        &self,
        session_id: &str,
    ) -> Result<BTreeMap<TriggerReason, u32>, LivelyError> {
        let mut counts = BTreeMap::new();
        for record in self.records.read().await.iter() {
            if record.session_id == session_id {
                *counts.entry(record.candidate.trigger_reason).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn interruption_counts_by_participant(
        &self,
        session_id: &str,
    ) -> Result<BTreeMap<String, u32>, LivelyError> {
        let mut counts = BTreeMap::new();
        for record in self.records.read().await.iter() {
            if record.session_id == session_id {
                *counts
                    .entry(record.candidate.interrupting_participant.clone())
                    .or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
