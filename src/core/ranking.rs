use std::cmp::Ordering;

use crate::models::MatchingResult;

/// Order results best-first.
///
/// Score descending, then candidate reputation descending, then most recent
/// login (missing logins last), then user ID ascending. Identical input always
/// yields identical output.
pub fn rank_candidates(mut results: Vec<MatchingResult>) -> Vec<MatchingResult> {
    results.sort_by(compare_results);
    results
}

pub fn compare_results(a: &MatchingResult, b: &MatchingResult) -> Ordering {
    b.raw_score
        .total_cmp(&a.raw_score)
        .then_with(|| b.reputation_score.total_cmp(&a.reputation_score))
        .then_with(|| b.last_login_at.cmp(&a.last_login_at))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn result(id: &str, score: f64, reputation: f64) -> MatchingResult {
        MatchingResult {
            user_id: id.to_string(),
            name: id.to_string(),
            skill_level: 4.0,
            distance_km: None,
            raw_score: score,
            match_score: score * 100.0,
            reputation_score: reputation,
            last_login_at: None,
            breakdown: None,
        }
    }

    fn ids(results: &[MatchingResult]) -> Vec<&str> {
        results.iter().map(|r| r.user_id.as_str()).collect()
    }

    #[test]
    fn test_score_descending() {
        let ranked = rank_candidates(vec![result("a", 0.2, 50.0), result("b", 0.9, 50.0)]);
        assert_eq!(ids(&ranked), vec!["b", "a"]);
    }

    #[test]
    fn test_reputation_breaks_ties() {
        let ranked = rank_candidates(vec![result("a", 0.5, 60.0), result("b", 0.5, 90.0)]);
        assert_eq!(ids(&ranked), vec!["b", "a"]);
    }

    #[test]
    fn test_login_then_id_break_ties() {
        let now = Utc::now();
        let mut stale = result("a", 0.5, 80.0);
        stale.last_login_at = Some(now - Duration::days(3));
        let mut fresh = result("b", 0.5, 80.0);
        fresh.last_login_at = Some(now);
        let never = result("c", 0.5, 80.0);

        let ranked = rank_candidates(vec![never.clone(), stale.clone(), fresh.clone()]);
        assert_eq!(ids(&ranked), vec!["b", "a", "c"]);

        let ranked = rank_candidates(vec![result("z", 0.5, 80.0), result("m", 0.5, 80.0)]);
        assert_eq!(ids(&ranked), vec!["m", "z"]);
    }
}
