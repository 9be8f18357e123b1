// Unit tests for Rally Algo

use chrono::{Duration, Utc};
use rally_algo::core::{
    distance::{calculate_bounding_box, distance_between, haversine_distance, is_within_bounding_box},
    filters::{filter_candidates, within_distance},
    ranking::rank_candidates,
    scoring::calculate_matching_score,
    Matcher, ReputationModel,
};
use rally_algo::models::{
    Candidate, MatchingCriteria, MatchingResult, PlayerProfile, ReputationScore, ScoringParams, ScoringWeights,
    SkillAccuracyRecord,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

/// Degrees of latitude per kilometre
const KM: f64 = 1.0 / 111.195;

const HOME_LAT: f64 = 40.7128;
const HOME_LON: f64 = -74.0060;

fn create_test_profile(id: &str, skill_level: f64, lat: f64, lon: f64) -> PlayerProfile {
    PlayerProfile {
        user_id: id.to_string(),
        name: format!("Player {}", id),
        skill_level,
        playing_styles: vec!["singles".to_string()],
        play_frequency: Some("weekly".to_string()),
        preferred_times: vec!["evenings".to_string()],
        latitude: Some(lat),
        longitude: Some(lon),
        location_private: false,
        gender: "female".to_string(),
        birth_date: None,
        last_login_at: None,
    }
}

fn requester() -> PlayerProfile {
    create_test_profile("me", 4.0, HOME_LAT, HOME_LON)
}

fn result(id: &str, raw_score: f64, reputation: f64) -> MatchingResult {
    MatchingResult {
        user_id: id.to_string(),
        name: id.to_string(),
        skill_level: 4.0,
        distance_km: None,
        raw_score,
        match_score: raw_score * 100.0,
        reputation_score: reputation,
        last_login_at: None,
        breakdown: None,
    }
}

#[test]
fn test_haversine_distance_zero() {
    let distance = haversine_distance(HOME_LAT, HOME_LON, HOME_LAT, HOME_LON);
    assert!(distance < 0.01);
}

#[test]
fn test_haversine_distance_manhattan_to_brooklyn() {
    let distance = haversine_distance(40.7580, -73.9855, 40.6782, -73.9442);
    assert!(distance > 5.0 && distance < 15.0);
}

#[test]
fn test_point_within_bbox() {
    let bbox = calculate_bounding_box(HOME_LAT, HOME_LON, 10.0);

    assert!(is_within_bounding_box(HOME_LAT, HOME_LON, &bbox));
    assert!(is_within_bounding_box(40.71, -74.0, &bbox));
    assert!(!is_within_bounding_box(50.0, -80.0, &bbox));
    assert!(!is_within_bounding_box(bbox.max_lat + 0.01, -74.0, &bbox));
}

#[test]
fn test_hidden_location_has_no_distance() {
    let mut hidden = create_test_profile("h", 4.0, HOME_LAT, HOME_LON);
    hidden.location_private = true;
    assert_eq!(distance_between(&requester(), &hidden), None);

    let criteria = MatchingCriteria {
        max_distance_km: Some(10.0),
        ..MatchingCriteria::for_requester("me")
    };
    assert!(within_distance(&requester(), &hidden, &criteria));

    let strict = MatchingCriteria {
        require_location: true,
        ..criteria
    };
    assert!(!within_distance(&requester(), &hidden, &strict));
}

#[test]
fn test_distance_filter_across_antimeridian() {
    let fiji = create_test_profile("me", 4.0, -17.0, 179.99);
    let neighbour = create_test_profile("east", 4.0, -17.0, -179.99);
    let criteria = MatchingCriteria {
        max_distance_km: Some(10.0),
        ..MatchingCriteria::for_requester("me")
    };

    let km = haversine_distance(-17.0, 179.99, -17.0, -179.99);
    assert!(km < 3.0, "got {} km", km);

    let kept = filter_candidates(&fiji, vec![Candidate::new(neighbour.clone(), 80.0)], &criteria);
    assert_eq!(kept.len(), 1);

    // and from the other side of the line
    let mut west = fiji;
    west.user_id = "west".to_string();
    let mut requester = neighbour;
    requester.user_id = "me".to_string();
    let outcome =
        Matcher::with_default_weights().find_matches(&requester, vec![Candidate::new(west, 80.0)], &criteria, 10);
    assert_eq!(outcome.results.len(), 1);
}

#[test]
fn test_distance_filter_near_pole() {
    let requester = create_test_profile("me", 4.0, 89.95, 10.0);
    let across = create_test_profile("across", 4.0, 89.95, -170.0);
    let criteria = MatchingCriteria {
        max_distance_km: Some(20.0),
        ..MatchingCriteria::for_requester("me")
    };

    assert!(within_distance(&requester, &across, &criteria));
    let kept = filter_candidates(&requester, vec![Candidate::new(across, 80.0)], &criteria);
    assert_eq!(kept.len(), 1);
}

#[test]
fn test_find_matches_respects_skill_and_distance_bounds() {
    let matcher = Matcher::with_default_weights();
    let mut rng = StdRng::seed_from_u64(42);

    for round in 0..20 {
        let candidates: Vec<Candidate> = (0..60)
            .map(|i| {
                let level = (rng.random_range(2.0..6.0_f64) * 2.0).round() / 2.0;
                let north_km = rng.random_range(0.0..30.0);
                let east_km = rng.random_range(-20.0..20.0);
                let profile = create_test_profile(
                    &format!("c{}-{}", round, i),
                    level,
                    HOME_LAT + north_km * KM,
                    HOME_LON + east_km * KM / HOME_LAT.to_radians().cos(),
                );
                Candidate::new(profile, rng.random_range(0.0..100.0))
            })
            .collect();

        let criteria = MatchingCriteria {
            min_skill_level: Some(3.5),
            max_skill_level: Some(4.5),
            max_distance_km: Some(15.0),
            ..MatchingCriteria::for_requester("me")
        };

        let outcome = matcher.find_matches(&requester(), candidates, &criteria, 60);
        for m in &outcome.results {
            assert!((3.5..=4.5).contains(&m.skill_level), "skill {} out of range", m.skill_level);
            let km = m.distance_km.expect("both sides share coordinates");
            assert!(km <= 15.0, "{} km is beyond the limit", km);
        }
    }
}

#[test]
fn test_filter_removes_requester_excluded_and_duplicates() {
    let me = requester();
    let candidates = vec![
        Candidate::new(me.clone(), 100.0),
        Candidate::new(create_test_profile("a", 4.0, HOME_LAT, HOME_LON), 90.0),
        Candidate::new(create_test_profile("a", 4.0, HOME_LAT, HOME_LON), 90.0),
        Candidate::new(create_test_profile("b", 4.0, HOME_LAT, HOME_LON), 90.0),
    ];
    let criteria = MatchingCriteria {
        exclude_user_ids: vec!["b".to_string()],
        ..MatchingCriteria::for_requester("me")
    };

    let kept = filter_candidates(&me, candidates, &criteria);
    let ids: Vec<&str> = kept.iter().map(Candidate::user_id).collect();
    assert_eq!(ids, vec!["a"]);
}

#[test]
fn test_ntrp_scenario_closer_level_and_distance_wins() {
    let matcher = Matcher::with_default_weights();
    let near = create_test_profile("near", 4.0, HOME_LAT + 5.0 * KM, HOME_LON);
    let far = create_test_profile("far", 4.5, HOME_LAT + 9.0 * KM, HOME_LON);

    let criteria = MatchingCriteria {
        min_skill_level: Some(3.5),
        max_skill_level: Some(4.5),
        max_distance_km: Some(10.0),
        ..MatchingCriteria::for_requester("me")
    };

    let outcome = matcher.find_matches(
        &requester(),
        vec![Candidate::new(far, 100.0), Candidate::new(near, 100.0)],
        &criteria,
        10,
    );

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].user_id, "near");
    assert!(outcome.results[0].raw_score > outcome.results[1].raw_score);
}

#[test]
fn test_score_within_unit_range() {
    let weights = ScoringWeights::default();
    let params = ScoringParams::default();
    let criteria = MatchingCriteria {
        play_types: vec!["singles".to_string(), "doubles".to_string()],
        min_age: Some(20),
        max_age: Some(40),
        ..MatchingCriteria::for_requester("me")
    };

    for level in [1.0, 2.5, 4.0, 5.5, 7.0] {
        let candidate = Candidate::new(create_test_profile("c", level, HOME_LAT + 3.0 * KM, HOME_LON), 55.0);
        let (score, breakdown) = calculate_matching_score(&requester(), &candidate, &criteria, &weights, &params);
        assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
        assert_eq!(breakdown.tag_overlap, Some(0.5));
    }
}

#[test]
fn test_ranking_breaks_score_ties_by_reputation() {
    let ranked = rank_candidates(vec![
        result("low", 0.8, 60.0),
        result("high", 0.8, 95.0),
        result("best", 0.9, 10.0),
    ]);
    let ids: Vec<&str> = ranked.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(ids, vec!["best", "high", "low"]);
}

#[test]
fn test_ranking_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(3);
    let now = Utc::now();
    let mut results: Vec<MatchingResult> = (0..40)
        .map(|i| {
            let mut r = result(
                &format!("u{:02}", i),
                rng.random_range(0..4) as f64 / 4.0,
                rng.random_range(0..3) as f64 * 50.0,
            );
            if i % 3 == 0 {
                r.last_login_at = Some(now - Duration::hours(rng.random_range(0..3)));
            }
            r
        })
        .collect();

    let first: Vec<String> = rank_candidates(results.clone()).into_iter().map(|r| r.user_id).collect();
    results.reverse();
    let second: Vec<String> = rank_candidates(results).into_iter().map(|r| r.user_id).collect();

    assert_eq!(first, second);
}

#[test]
fn test_fresh_reputation_is_perfect() {
    let score = ReputationScore::new("fresh");
    assert_eq!(score.attendance_rate, 100.0);
    assert_eq!(score.punctuality_score, 100.0);
    assert_eq!(score.skill_accuracy, 100.0);
    assert_eq!(score.behavior_score(), 100.0);
    assert_eq!(score.overall_score, 100.0);
    assert_eq!(ReputationModel::default().overall_score(&score), 100.0);
}

#[test]
fn test_punctuality_stays_bounded() {
    let model = ReputationModel::default();
    let mut score = ReputationScore::new("u");
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..500 {
        model.apply_punctuality(&mut score, rng.random_bool(0.3));
        assert!((0.0..=100.0).contains(&score.punctuality_score));
        assert!((0.0..=100.0).contains(&score.overall_score));
    }
}

#[test]
fn test_auto_adjust_needs_three_records() {
    let model = ReputationModel::default();
    let records: Vec<SkillAccuracyRecord> = (0..2)
        .map(|_| SkillAccuracyRecord {
            id: Uuid::new_v4(),
            user_id: "u".to_string(),
            reported_level: 3.0,
            observed_level: 6.0,
            match_id: None,
            created_at: Utc::now(),
        })
        .collect();

    assert_eq!(model.suggest_skill_adjustment(3.0, &records), None);
}
