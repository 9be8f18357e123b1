use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use crate::core::{MatchOutcome, Matcher};
use crate::error::{EngineError, EngineResult};
use crate::models::{Candidate, MatchingCriteria, PlayerProfile, ReputationScore};
use crate::services::{ProfileSource, Store};

/// Pulls a candidate pool from the profile source, overlays the engine's own
/// skill levels and reputation, then hands it to the `Matcher`.
pub struct MatchingService {
    profiles: Arc<dyn ProfileSource>,
    store: Arc<dyn Store>,
    matcher: Matcher,
    candidate_pool_size: usize,
}

impl MatchingService {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        store: Arc<dyn Store>,
        matcher: Matcher,
        candidate_pool_size: usize,
    ) -> Self {
        Self {
            profiles,
            store,
            matcher,
            candidate_pool_size,
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    async fn load_pool(&self, criteria: &MatchingCriteria) -> EngineResult<(PlayerProfile, Vec<Candidate>)> {
        if criteria.requester_id.is_empty() {
            return Err(EngineError::validation("requester id is required"));
        }

        let mut requester = self.profiles.get_profile(&criteria.requester_id).await?;
        let pool = self
            .profiles
            .query_candidates(&requester, criteria, self.candidate_pool_size)
            .await?;

        let mut ids: Vec<String> = pool.iter().map(|p| p.user_id.clone()).collect();
        ids.push(requester.user_id.clone());

        let levels = self.store.skill_levels(&ids).await?;
        let reputations = self.store.reputation_scores(&ids).await?;
        // Users without a row yet get the lazily created default
        let default_overall = ReputationScore::new("").overall_score;

        if let Some(level) = levels.get(&requester.user_id) {
            requester.skill_level = *level;
        }

        let candidates = pool
            .into_iter()
            .map(|mut profile| {
                if let Some(level) = levels.get(&profile.user_id) {
                    profile.skill_level = *level;
                }
                let reputation = reputations
                    .get(&profile.user_id)
                    .map(|r| r.overall_score)
                    .unwrap_or(default_overall);
                Candidate::new(profile, reputation)
            })
            .collect();

        Ok((requester, candidates))
    }

    /// Ranked matches for the requester named in `criteria`
    pub async fn find_matches(&self, criteria: &MatchingCriteria, include_breakdown: bool) -> EngineResult<MatchOutcome> {
        let (requester, candidates) = self.load_pool(criteria).await?;

        tracing::debug!(
            "Scoring {} candidates for {}",
            candidates.len(),
            requester.user_id
        );

        let mut outcome = self.matcher.find_matches(&requester, candidates, criteria, criteria.limit);
        if !include_breakdown {
            outcome.results.iter_mut().for_each(|r| r.breakdown = None);
        }

        tracing::info!(
            "Returning {} matches for user {} ({} eligible of {} candidates)",
            outcome.results.len(),
            requester.user_id,
            outcome.eligible_candidates,
            outcome.total_candidates
        );

        Ok(outcome)
    }

    /// Score-weighted random draw of up to `count` eligible candidates.
    /// A fixed `seed` makes the draw reproducible.
    pub async fn find_random_matches(
        &self,
        criteria: &MatchingCriteria,
        count: usize,
        seed: Option<u64>,
        include_breakdown: bool,
    ) -> EngineResult<MatchOutcome> {
        let (requester, candidates) = self.load_pool(criteria).await?;

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut outcome = self
            .matcher
            .generate_random_matches(&requester, candidates, criteria, count, &mut rng);
        if !include_breakdown {
            outcome.results.iter_mut().for_each(|r| r.breakdown = None);
        }

        tracing::info!(
            "Drew {} random matches for user {} from {} eligible",
            outcome.results.len(),
            requester.user_id,
            outcome.eligible_candidates
        );

        Ok(outcome)
    }
}
