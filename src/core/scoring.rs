use crate::core::distance::distance_between;
use crate::models::{Candidate, MatchingCriteria, PlayerProfile, ScoreBreakdown, ScoringParams, ScoringWeights};

/// Distance closeness used when either side hides its location
pub const NEUTRAL_DISTANCE_SCORE: f64 = 0.5;

/// Raw matching score in [0, 1] plus its per-factor breakdown.
///
/// The score is the weighted mean of the factors that were actually
/// evaluated: tag overlap and age drop out (and the remaining weights are
/// renormalized) when the requester expressed no preference for them.
pub fn calculate_matching_score(
    requester: &PlayerProfile,
    candidate: &Candidate,
    criteria: &MatchingCriteria,
    weights: &ScoringWeights,
    params: &ScoringParams,
) -> (f64, ScoreBreakdown) {
    let profile = &candidate.profile;

    let skill = skill_closeness(requester.skill_level, profile.skill_level, params.max_skill_spread);

    let max_distance = criteria
        .max_distance_km
        .unwrap_or(params.max_considered_distance_km);
    let distance = distance_between(requester, profile)
        .map(|km| distance_closeness(km, max_distance))
        .unwrap_or(NEUTRAL_DISTANCE_SCORE);

    let tag_overlap = tag_overlap(&criteria.requested_tags(), profile);

    let age = if criteria.has_age_range() {
        profile
            .age()
            .map(|age| age_closeness(age, criteria.min_age, criteria.max_age, params.age_tolerance_years))
    } else {
        None
    };

    let reputation = (candidate.reputation / 100.0).clamp(0.0, 1.0);

    let breakdown = ScoreBreakdown {
        skill,
        distance,
        tag_overlap,
        age,
        reputation,
    };

    (weighted_score(&breakdown, weights), breakdown)
}

/// Weighted mean over the evaluated factors
pub fn weighted_score(breakdown: &ScoreBreakdown, weights: &ScoringWeights) -> f64 {
    let mut factors = vec![
        (breakdown.skill, weights.skill),
        (breakdown.distance, weights.distance),
        (breakdown.reputation, weights.reputation),
    ];
    if let Some(overlap) = breakdown.tag_overlap {
        factors.push((overlap, weights.tag_overlap));
    }
    if let Some(age) = breakdown.age {
        factors.push((age, weights.age));
    }

    let total_weight: f64 = factors.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }

    let sum: f64 = factors.iter().map(|(f, w)| f * w).sum();
    (sum / total_weight).clamp(0.0, 1.0)
}

#[inline]
pub fn skill_closeness(requester_level: f64, candidate_level: f64, max_spread: f64) -> f64 {
    if max_spread <= 0.0 {
        return if requester_level == candidate_level { 1.0 } else { 0.0 };
    }
    1.0 - ((requester_level - candidate_level).abs() / max_spread).min(1.0)
}

#[inline]
pub fn distance_closeness(distance_km: f64, max_distance_km: f64) -> f64 {
    if max_distance_km <= 0.0 {
        return 0.0;
    }
    1.0 - (distance_km / max_distance_km).min(1.0)
}

/// Fraction of requested tags the candidate advertises, `None` without a request
pub fn tag_overlap(requested: &[&str], profile: &PlayerProfile) -> Option<f64> {
    if requested.is_empty() {
        return None;
    }

    let present = requested
        .iter()
        .filter(|tag| profile.tags().any(|t| t.eq_ignore_ascii_case(tag)))
        .count();

    Some(present as f64 / requested.len() as f64)
}

/// 1.0 inside the range, decaying linearly to 0 at `tolerance` years past an edge
#[inline]
pub fn age_closeness(age: u32, min_age: Option<u32>, max_age: Option<u32>, tolerance: f64) -> f64 {
    let age = age as f64;
    let below = min_age.map_or(0.0, |min| (min as f64 - age).max(0.0));
    let above = max_age.map_or(0.0, |max| (age - max as f64).max(0.0));
    let gap = below.max(above);

    if gap == 0.0 {
        return 1.0;
    }
    if tolerance <= 0.0 {
        return 0.0;
    }
    (1.0 - gap / tolerance).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, Utc};

    fn profile(id: &str, level: f64, lat: f64, lon: f64) -> PlayerProfile {
        PlayerProfile {
            user_id: id.to_string(),
            name: String::new(),
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

    #[test]
    fn test_skill_closeness() {
        assert_eq!(skill_closeness(4.0, 4.0, 3.0), 1.0);
        assert!((skill_closeness(4.0, 4.5, 3.0) - (1.0 - 0.5 / 3.0)).abs() < 1e-9);
        assert_eq!(skill_closeness(1.0, 7.0, 3.0), 0.0);
    }

    #[test]
    fn test_distance_closeness() {
        assert_eq!(distance_closeness(0.0, 10.0), 1.0);
        assert!((distance_closeness(5.0, 10.0) - 0.5).abs() < 1e-9);
        assert_eq!(distance_closeness(25.0, 10.0), 0.0);
    }

    #[test]
    fn test_age_closeness_decay() {
        assert_eq!(age_closeness(30, Some(25), Some(35), 5.0), 1.0);
        assert!((age_closeness(38, Some(25), Some(35), 5.0) - 0.4).abs() < 1e-9);
        assert_eq!(age_closeness(45, Some(25), Some(35), 5.0), 0.0);
        assert!((age_closeness(22, Some(25), None, 5.0) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_tag_overlap_fraction() {
        let p = profile("c", 4.0, 0.0, 0.0);
        assert_eq!(tag_overlap(&[], &p), None);
        assert_eq!(tag_overlap(&["baseline", "doubles"], &p), Some(0.5));
        assert_eq!(tag_overlap(&["Weekly"], &p), Some(1.0));
    }

    #[test]
    fn test_hidden_location_scores_neutral() {
        let requester = profile("r", 4.0, 40.7128, -74.0060);
        let mut hidden = profile("c", 4.0, 40.72, -74.01);
        hidden.location_private = true;

        let (_, breakdown) = calculate_matching_score(
            &requester,
            &Candidate::new(hidden, 100.0),
            &MatchingCriteria::default(),
            &ScoringWeights::default(),
            &ScoringParams::default(),
        );
        assert_eq!(breakdown.distance, NEUTRAL_DISTANCE_SCORE);
    }

    #[test]
    fn test_weights_renormalized_without_preferences() {
        let breakdown = ScoreBreakdown {
            skill: 1.0,
            distance: 1.0,
            tag_overlap: None,
            age: None,
            reputation: 1.0,
        };
        let score = weighted_score(&breakdown, &ScoringWeights::default());
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_age_factor_uses_birth_date() {
        let requester = profile("r", 4.0, 40.7128, -74.0060);
        let mut older = profile("c", 4.0, 40.7128, -74.0060);
        let year = Utc::now().year() - 50;
        older.birth_date = NaiveDate::from_ymd_opt(year, 1, 1);

        let criteria = MatchingCriteria {
            min_age: Some(20),
            max_age: Some(30),
            ..Default::default()
        };
        let (score, breakdown) = calculate_matching_score(
            &requester,
            &Candidate::new(older, 100.0),
            &criteria,
            &ScoringWeights::default(),
            &ScoringParams::default(),
        );
        assert_eq!(breakdown.age, Some(0.0));
        assert!(score < 1.0);
    }
}
