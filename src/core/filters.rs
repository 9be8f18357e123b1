use std::collections::HashSet;

use crate::core::distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box};
use crate::models::{Candidate, MatchingCriteria, PlayerProfile};

/// Apply the hard filters, in order, before any scoring.
///
/// 1. requester and explicitly excluded users, duplicate rows
/// 2. skill range (inclusive)
/// 3. maximum distance
/// 4. gender
/// 5. minimum reputation
pub fn filter_candidates(
    requester: &PlayerProfile,
    candidates: Vec<Candidate>,
    criteria: &MatchingCriteria,
) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());

    candidates
        .into_iter()
        .filter(|c| c.user_id() != requester.user_id)
        .filter(|c| !criteria.exclude_user_ids.iter().any(|id| id == c.user_id()))
        .filter(|c| seen.insert(c.user_id().to_string()))
        .filter(|c| within_skill_range(&c.profile, criteria))
        .filter(|c| within_distance(requester, &c.profile, criteria))
        .filter(|c| matches_gender(&c.profile, criteria))
        .filter(|c| meets_min_reputation(c, criteria))
        .collect()
}

#[inline]
pub fn within_skill_range(profile: &PlayerProfile, criteria: &MatchingCriteria) -> bool {
    if let Some(min) = criteria.min_skill_level {
        if profile.skill_level < min {
            return false;
        }
    }
    if let Some(max) = criteria.max_skill_level {
        if profile.skill_level > max {
            return false;
        }
    }
    true
}

/// Distance check. A pair without usable coordinates passes unless the
/// criteria make location mandatory.
#[inline]
pub fn within_distance(
    requester: &PlayerProfile,
    profile: &PlayerProfile,
    criteria: &MatchingCriteria,
) -> bool {
    let Some(max_km) = criteria.max_distance_km else {
        return true;
    };

    let (Some((lat1, lon1)), Some((lat2, lon2))) = (requester.coordinates(), profile.coordinates())
    else {
        return !criteria.require_location;
    };

    let bbox = calculate_bounding_box(lat1, lon1, max_km);
    if !is_within_bounding_box(lat2, lon2, &bbox) {
        return false;
    }

    haversine_distance(lat1, lon1, lat2, lon2) <= max_km
}

#[inline]
pub fn matches_gender(profile: &PlayerProfile, criteria: &MatchingCriteria) -> bool {
    match criteria.gender_filter() {
        Some(gender) => profile.gender.eq_ignore_ascii_case(gender),
        None => true,
    }
}

#[inline]
pub fn meets_min_reputation(candidate: &Candidate, criteria: &MatchingCriteria) -> bool {
    criteria
        .min_reputation
        .map_or(true, |threshold| candidate.reputation >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, level: f64, gender: &str, lat: f64, lon: f64) -> PlayerProfile {
        PlayerProfile {
            user_id: id.to_string(),
            name: format!("Player {}", id),
            skill_level: level,
            playing_styles: vec![],
            play_frequency: None,
            preferred_times: vec![],
            latitude: Some(lat),
            longitude: Some(lon),
            location_private: false,
            gender: gender.to_string(),
            birth_date: None,
            last_login_at: None,
        }
    }

    fn candidate(id: &str, level: f64, gender: &str, lat: f64, lon: f64) -> Candidate {
        Candidate::new(profile(id, level, gender, lat, lon), 100.0)
    }

    fn requester() -> PlayerProfile {
        profile("me", 4.0, "male", 40.7128, -74.0060)
    }

    #[test]
    fn test_skill_range_inclusive() {
        let criteria = MatchingCriteria {
            min_skill_level: Some(3.5),
            max_skill_level: Some(4.5),
            ..Default::default()
        };
        let candidates = vec![
            candidate("low", 3.0, "female", 40.71, -74.0),
            candidate("edge", 3.5, "female", 40.71, -74.0),
            candidate("top", 4.5, "female", 40.71, -74.0),
            candidate("high", 5.0, "female", 40.71, -74.0),
        ];

        let kept: Vec<_> = filter_candidates(&requester(), candidates, &criteria)
            .into_iter()
            .map(|c| c.profile.user_id)
            .collect();
        assert_eq!(kept, vec!["edge", "top"]);
    }

    #[test]
    fn test_distance_filter_keeps_hidden_location() {
        let criteria = MatchingCriteria {
            max_distance_km: Some(10.0),
            ..Default::default()
        };
        let mut hidden = candidate("hidden", 4.0, "female", 60.0, 10.0);
        hidden.profile.location_private = true;
        let candidates = vec![
            candidate("near", 4.0, "female", 40.72, -74.01),
            candidate("far", 4.0, "female", 41.5, -74.0),
            hidden,
        ];

        let kept: Vec<_> = filter_candidates(&requester(), candidates, &criteria)
            .into_iter()
            .map(|c| c.profile.user_id)
            .collect();
        assert_eq!(kept, vec!["near", "hidden"]);
    }

    #[test]
    fn test_distance_filter_rejects_hidden_when_required() {
        let criteria = MatchingCriteria {
            max_distance_km: Some(10.0),
            require_location: true,
            ..Default::default()
        };
        let mut hidden = candidate("hidden", 4.0, "female", 40.72, -74.01);
        hidden.profile.location_private = true;

        assert!(filter_candidates(&requester(), vec![hidden], &criteria).is_empty());
    }

    #[test]
    fn test_gender_and_reputation() {
        let criteria = MatchingCriteria {
            gender: Some("female".to_string()),
            min_reputation: Some(70.0),
            ..Default::default()
        };
        let mut shady = candidate("shady", 4.0, "female", 40.71, -74.0);
        shady.reputation = 55.0;
        let candidates = vec![
            candidate("ok", 4.0, "Female", 40.71, -74.0),
            candidate("male", 4.0, "male", 40.71, -74.0),
            shady,
        ];

        let kept: Vec<_> = filter_candidates(&requester(), candidates, &criteria)
            .into_iter()
            .map(|c| c.profile.user_id)
            .collect();
        assert_eq!(kept, vec!["ok"]);
    }

    #[test]
    fn test_self_excluded_and_duplicates_dropped() {
        let criteria = MatchingCriteria {
            exclude_user_ids: vec!["blocked".to_string()],
            ..Default::default()
        };
        let candidates = vec![
            candidate("me", 4.0, "male", 40.71, -74.0),
            candidate("a", 4.0, "female", 40.71, -74.0),
            candidate("a", 4.0, "female", 40.71, -74.0),
            candidate("blocked", 4.0, "female", 40.71, -74.0),
        ];

        let kept = filter_candidates(&requester(), candidates, &criteria);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].user_id(), "a");
    }
}
