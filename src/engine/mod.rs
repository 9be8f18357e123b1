//! Engine services: the orchestration layer between the pure algorithms in
//! `core` and the collaborators in `services`.

pub mod cards;
pub mod matching;
pub mod notifications;
pub mod reputation;
pub mod results;
pub mod statistics;

pub use cards::CardService;
pub use matching::MatchingService;
pub use notifications::NotificationService;
pub use reputation::{ReputationFeedback, ReputationService};
pub use results::{MatchResultService, NewMatch};
pub use statistics::StatisticsService;

use std::sync::Arc;

use crate::core::{Matcher, ReputationModel};
use crate::services::{Notifier, ProfileSource, Store};

/// Tunables that are not part of the scoring or reputation models
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub matcher: Matcher,
    pub reputation: ReputationModel,
    /// Profiles requested from the profile source per matching call
    pub candidate_pool_size: usize,
    /// Distinct participants that must confirm a result before it is trusted
    pub required_confirmations: usize,
    pub recent_matches_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matcher: Matcher::default(),
            reputation: ReputationModel::default(),
            candidate_pool_size: 500,
            required_confirmations: 2,
            recent_matches_limit: 10,
        }
    }
}

/// Every engine service wired to the same store, profile source and notifier
pub struct Engine {
    pub matching: MatchingService,
    pub cards: CardService,
    pub reputation: Arc<ReputationService>,
    pub results: MatchResultService,
    pub statistics: StatisticsService,
    pub notifications: NotificationService,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        profiles: Arc<dyn ProfileSource>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        let reputation = Arc::new(ReputationService::new(
            Arc::clone(&store),
            Arc::clone(&profiles),
            config.reputation,
        ));

        Self {
            matching: MatchingService::new(
                profiles,
                Arc::clone(&store),
                config.matcher,
                config.candidate_pool_size,
            ),
            cards: CardService::new(Arc::clone(&store), Arc::clone(&notifier)),
            results: MatchResultService::new(
                Arc::clone(&store),
                Arc::clone(&reputation),
                notifier,
                config.required_confirmations,
            ),
            statistics: StatisticsService::new(Arc::clone(&store), config.recent_matches_limit),
            notifications: NotificationService::new(store),
            reputation,
        }
    }
}
