use std::sync::Arc;

use tokio::sync::broadcast;

use concord_content::{ContentStore, InMemoryContentStore};
use concord_directory::AgentDirectory;
use concord_journal::{InMemoryJournal, Journal};
use concord_ledger::ConsensusLedger;
use concord_reputation::{ReputationEngine, ScoreChange};
use concord_types::DomainEvent;

use crate::config::ConcordConfig;

/// Capacity of the push-event fanout; slow dashboard subscribers lag rather
/// than block mutations.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub config: ConcordConfig,
    pub directory: Arc<AgentDirectory>,
    pub reputation: Arc<ReputationEngine>,
    pub ledger: Arc<ConsensusLedger>,
    pub journal: Arc<dyn Journal>,
    pub content_store: Arc<dyn ContentStore>,
    pub events: broadcast::Sender<DomainEvent>,
}

impl AppState {
    pub fn new(config: ConcordConfig) -> Self {
        let journal: Arc<dyn Journal> = Arc::new(InMemoryJournal::new());
        let directory = Arc::new(AgentDirectory::new(
            config.directory_config(),
            journal.clone(),
        ));
        let reputation = Arc::new(ReputationEngine::new(directory.clone(), config.policy));
        let ledger = Arc::new(ConsensusLedger::new(
            directory.clone(),
            reputation.clone(),
            journal.clone(),
        ));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            directory,
            reputation,
            ledger,
            journal,
            content_store: Arc::new(InMemoryContentStore::new()),
            events,
        }
    }

    /// Publish a push notification; dropped silently when nobody listens.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.events.send(event);
    }

    /// Publish one `ReputationChanged` notification per applied delta.
    pub fn publish_score_changes(&self, changes: &[ScoreChange]) {
        for change in changes {
            self.publish(DomainEvent::ReputationChanged {
                agent_id: change.agent_id.clone(),
                new_score: change.new_score,
                reason: change.reason,
            });
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ConcordConfig::default())
    }
}
