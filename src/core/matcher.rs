use rand::Rng;

use crate::core::{
    distance::distance_between,
    filters::filter_candidates,
    ranking::rank_candidates,
    sampling::weighted_sample,
    scoring::calculate_matching_score,
};
use crate::models::{Candidate, MatchingCriteria, MatchingResult, PlayerProfile, ScoringParams, ScoringWeights};

/// Result of a matching pass
#[derive(Debug)]
pub struct MatchOutcome {
    pub results: Vec<MatchingResult>,
    /// Candidates handed in before filtering
    pub total_candidates: usize,
    /// Candidates that survived the hard filters
    pub eligible_candidates: usize,
}

/// Matching orchestrator: hard filters, scoring, then ranking or sampling.
///
/// Holds no state besides its immutable weight and parameter configuration,
/// so a single instance is shared by every request.
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
    params: ScoringParams,
}

impl Matcher {
    pub fn new(weights: ScoringWeights, params: ScoringParams) -> Self {
        Self { weights, params }
    }

    pub fn with_default_weights() -> Self {
        Self::new(ScoringWeights::default(), ScoringParams::default())
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    /// Score one candidate against the requester
    pub fn score_candidate(
        &self,
        requester: &PlayerProfile,
        candidate: &Candidate,
        criteria: &MatchingCriteria,
    ) -> MatchingResult {
        let (raw_score, breakdown) =
            calculate_matching_score(requester, candidate, criteria, &self.weights, &self.params);
        let profile = &candidate.profile;

        MatchingResult {
            user_id: profile.user_id.clone(),
            name: profile.name.clone(),
            skill_level: profile.skill_level,
            distance_km: distance_between(requester, profile),
            raw_score,
            match_score: raw_score * 100.0,
            reputation_score: candidate.reputation,
            last_login_at: profile.last_login_at,
            breakdown: Some(breakdown),
        }
    }

    /// Filter, score and rank, keeping the best `limit`
    pub fn find_matches(
        &self,
        requester: &PlayerProfile,
        candidates: Vec<Candidate>,
        criteria: &MatchingCriteria,
        limit: usize,
    ) -> MatchOutcome {
        let total_candidates = candidates.len();
        let eligible = filter_candidates(requester, candidates, criteria);
        let eligible_candidates = eligible.len();

        let scored: Vec<MatchingResult> = eligible
            .iter()
            .map(|candidate| self.score_candidate(requester, candidate, criteria))
            .collect();

        let mut results = rank_candidates(scored);
        results.truncate(limit);

        MatchOutcome {
            results,
            total_candidates,
            eligible_candidates,
        }
    }

    /// Filter and score, then draw `count` results by score-weighted sampling
    /// without replacement
    pub fn generate_random_matches<R>(
        &self,
        requester: &PlayerProfile,
        candidates: Vec<Candidate>,
        criteria: &MatchingCriteria,
        count: usize,
        rng: &mut R,
    ) -> MatchOutcome
    where
        R: Rng + ?Sized,
    {
        let total_candidates = candidates.len();
        let eligible = filter_candidates(requester, candidates, criteria);
        let eligible_candidates = eligible.len();

        let scored: Vec<MatchingResult> = eligible
            .iter()
            .map(|candidate| self.score_candidate(requester, candidate, criteria))
            .collect();

        let results = weighted_sample(
            scored,
            |result| result.raw_score,
            self.params.sampling_epsilon,
            count,
            rng,
        );

        MatchOutcome {
            results,
            total_candidates,
            eligible_candidates,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn profile(id: &str, level: f64, lat: f64, lon: f64) -> PlayerProfile {
        PlayerProfile {
            user_id: id.to_string(),
            name: format!("Player {}", id),
            skill_level: level,
            playing_styles: vec!["baseline".to_string()],
            play_frequency: Some("weekly".to_string()),
            preferred_times: vec![],
            latitude: Some(lat),
            longitude: Some(lon),
            location_private: false,
            gender: "female".to_string(),
            birth_date: None,
            last_login_at: None,
        }
    }

    fn candidate(id: &str, level: f64, lat: f64, lon: f64) -> Candidate {
        Candidate::new(profile(id, level, lat, lon), 100.0)
    }

    fn requester() -> PlayerProfile {
        profile("me", 4.0, 40.7128, -74.0060)
    }

    #[test]
    fn test_find_matches_basic() {
        let matcher = Matcher::with_default_weights();
        let criteria = MatchingCriteria {
            min_skill_level: Some(3.5),
            max_skill_level: Some(4.5),
            max_distance_km: Some(20.0),
            ..MatchingCriteria::for_requester("me")
        };

        let candidates = vec![
            candidate("1", 4.0, 40.72, -74.01),
            candidate("2", 6.0, 40.72, -74.01),
            candidate("3", 4.0, 45.0, -74.0),
        ];

        let outcome = matcher.find_matches(&requester(), candidates, &criteria, 10);

        assert_eq!(outcome.total_candidates, 3);
        assert_eq!(outcome.eligible_candidates, 1);
        assert_eq!(outcome.results[0].user_id, "1");
    }

    #[test]
    fn test_respects_limit() {
        let matcher = Matcher::with_default_weights();
        let candidates: Vec<Candidate> = (0..20)
            .map(|i| candidate(&i.to_string(), 3.0 + (i % 5) as f64 * 0.5, 40.72, -74.01))
            .collect();

        let outcome = matcher.find_matches(&requester(), candidates, &MatchingCriteria::default(), 5);
        assert_eq!(outcome.results.len(), 5);
        for pair in outcome.results.windows(2) {
            assert!(pair[0].raw_score >= pair[1].raw_score);
        }
    }

    #[test]
    fn test_display_score_scaled() {
        let matcher = Matcher::with_default_weights();
        let outcome = matcher.find_matches(
            &requester(),
            vec![candidate("1", 4.0, 40.7128, -74.0060)],
            &MatchingCriteria::default(),
            1,
        );
        let result = &outcome.results[0];
        assert!((result.match_score - result.raw_score * 100.0).abs() < 1e-9);
        assert!(result.match_score <= 100.0);
    }

    #[test]
    fn test_random_matches_seeded() {
        let matcher = Matcher::with_default_weights();
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| candidate(&i.to_string(), 4.0, 40.72, -74.01))
            .collect();

        let first = matcher.generate_random_matches(
            &requester(),
            candidates.clone(),
            &MatchingCriteria::default(),
            4,
            &mut StdRng::seed_from_u64(5),
        );
        let second = matcher.generate_random_matches(
            &requester(),
            candidates,
            &MatchingCriteria::default(),
            4,
            &mut StdRng::seed_from_u64(5),
        );

        let ids = |o: &MatchOutcome| o.results.iter().map(|r| r.user_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.results.len(), 4);
    }
}
