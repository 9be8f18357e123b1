//! Reputation arithmetic.
//!
//! Every function here is pure; the reputation service runs them inside the
//! store's per-user read-modify-write so concurrent updates never interleave.

use chrono::Utc;

use crate::models::{AttendanceStatus, ReputationScore, SkillAccuracyRecord};

/// Blend weights for the overall score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReputationWeights {
    pub attendance: f64,
    pub punctuality: f64,
    pub skill_accuracy: f64,
    pub behavior: f64,
}

impl Default for ReputationWeights {
    fn default() -> Self {
        Self {
            attendance: 0.3,
            punctuality: 0.2,
            skill_accuracy: 0.2,
            behavior: 0.3,
        }
    }
}

/// Damped skill-level correction driven by observed levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoAdjustPolicy {
    /// How many of the most recent accuracy records to average
    pub window: usize,
    /// Fewer records than this and nothing happens
    pub min_records: usize,
    /// Minimum gap between suggested and current level before acting
    pub threshold: f64,
    /// Share of the gap applied per adjustment
    pub damping: f64,
    pub min_level: f64,
    pub max_level: f64,
}

impl Default for AutoAdjustPolicy {
    fn default() -> Self {
        Self {
            window: 5,
            min_records: 3,
            threshold: 0.5,
            damping: 0.3,
            min_level: 1.0,
            max_level: 7.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReputationModel {
    /// EMA smoothing constant; each observation moves a sub-score by this share
    pub smoothing_alpha: f64,
    pub weights: ReputationWeights,
    /// NTRP gap at which an accuracy observation bottoms out at 0
    pub max_skill_spread: f64,
    pub auto_adjust: AutoAdjustPolicy,
}

impl Default for ReputationModel {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.1,
            weights: ReputationWeights::default(),
            max_skill_spread: 3.0,
            auto_adjust: AutoAdjustPolicy::default(),
        }
    }
}

impl ReputationModel {
    /// `current * (1 - α) + observation * α`, kept inside [0, 100]
    #[inline]
    pub fn ema(&self, current: f64, observation: f64) -> f64 {
        let alpha = self.smoothing_alpha.clamp(0.0, 1.0);
        (current * (1.0 - alpha) + observation.clamp(0.0, 100.0) * alpha).clamp(0.0, 100.0)
    }

    pub fn overall_score(&self, score: &ReputationScore) -> f64 {
        let w = &self.weights;
        let overall = score.attendance_rate * w.attendance
            + score.punctuality_score * w.punctuality
            + score.skill_accuracy * w.skill_accuracy
            + score.behavior_score() * w.behavior;
        overall.clamp(0.0, 100.0)
    }

    /// Recompute the derived overall score after a sub-score change
    pub fn refresh(&self, score: &mut ReputationScore) {
        score.overall_score = self.overall_score(score);
        score.updated_at = Utc::now();
    }

    /// No-shows count towards the total only, dragging attendance down
    /// without inflating the cancellation counter.
    pub fn apply_attendance(&self, score: &mut ReputationScore, status: AttendanceStatus) {
        score.total_matches += 1;
        match status {
            AttendanceStatus::Completed => score.completed_matches += 1,
            AttendanceStatus::Cancelled => score.cancelled_matches += 1,
            AttendanceStatus::NoShow => {}
        }
        score.attendance_rate = if score.total_matches > 0 {
            score.completed_matches as f64 / score.total_matches as f64 * 100.0
        } else {
            100.0
        };
        self.refresh(score);
    }

    pub fn apply_punctuality(&self, score: &mut ReputationScore, on_time: bool) {
        let observation = if on_time { 100.0 } else { 0.0 };
        score.punctuality_score = self.ema(score.punctuality_score, observation);
        self.refresh(score);
    }

    /// Accuracy of a single self-report, 0-100
    pub fn skill_accuracy_observation(&self, reported: f64, observed: f64) -> f64 {
        if self.max_skill_spread <= 0.0 {
            return if reported == observed { 100.0 } else { 0.0 };
        }
        100.0 - ((reported - observed).abs() / self.max_skill_spread).min(1.0) * 100.0
    }

    pub fn apply_skill_accuracy(&self, score: &mut ReputationScore, reported: f64, observed: f64) {
        let observation = self.skill_accuracy_observation(reported, observed);
        score.skill_accuracy = self.ema(score.skill_accuracy, observation);
        self.refresh(score);
    }

    /// Blend a 1-5 review into the stored 1-5 behavior rating on the 0-100 scale
    pub fn apply_behavior(&self, score: &mut ReputationScore, rating: f64) {
        let blended = self.ema(score.behavior_score(), rating.clamp(1.0, 5.0) * 20.0);
        score.behavior_rating = (blended / 20.0).clamp(1.0, 5.0);
        self.refresh(score);
    }

    /// Damped new level suggested by recent observations, `None` to leave it.
    ///
    /// `records` must be newest first; only the first `window` are used.
    pub fn suggest_skill_adjustment(&self, current: f64, records: &[SkillAccuracyRecord]) -> Option<f64> {
        let policy = &self.auto_adjust;
        let recent = &records[..records.len().min(policy.window.max(policy.min_records))];
        if recent.len() < policy.min_records.max(1) {
            return None;
        }

        let suggested = recent.iter().map(|r| r.observed_level).sum::<f64>() / recent.len() as f64;
        let gap = suggested - current;
        if gap.abs() <= policy.threshold {
            return None;
        }

        let adjusted = (current + gap * policy.damping).clamp(policy.min_level, policy.max_level);
        if (adjusted - current).abs() < f64::EPSILON {
            return None;
        }
        Some(adjusted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(observed: f64) -> SkillAccuracyRecord {
        SkillAccuracyRecord {
            id: Uuid::new_v4(),
            user_id: "u".to_string(),
            reported_level: 4.0,
            observed_level: observed,
            match_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_attendance_rate() {
        let model = ReputationModel::default();
        let mut score = ReputationScore::new("u");
        model.apply_attendance(&mut score, AttendanceStatus::Completed);
        model.apply_attendance(&mut score, AttendanceStatus::Cancelled);
        model.apply_attendance(&mut score, AttendanceStatus::Completed);
        model.apply_attendance(&mut score, AttendanceStatus::NoShow);

        assert_eq!(score.total_matches, 4);
        assert_eq!(score.completed_matches, 2);
        assert_eq!(score.cancelled_matches, 1);
        assert!((score.attendance_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_punctuality_ema_step() {
        let model = ReputationModel::default();
        let mut score = ReputationScore::new("u");
        model.apply_punctuality(&mut score, false);
        assert!((score.punctuality_score - 90.0).abs() < 1e-9);
        model.apply_punctuality(&mut score, true);
        assert!((score.punctuality_score - 91.0).abs() < 1e-9);
    }

    #[test]
    fn test_punctuality_stays_bounded() {
        let model = ReputationModel::default();
        let mut score = ReputationScore::new("u");
        for i in 0..500 {
            model.apply_punctuality(&mut score, i % 7 == 0);
            assert!((0.0..=100.0).contains(&score.punctuality_score));
        }
    }

    #[test]
    fn test_overall_blend() {
        let model = ReputationModel::default();
        let mut score = ReputationScore::new("u");
        score.attendance_rate = 50.0;
        score.punctuality_score = 80.0;
        score.skill_accuracy = 60.0;
        score.behavior_rating = 4.0;
        let expected = 50.0 * 0.3 + 80.0 * 0.2 + 60.0 * 0.2 + 80.0 * 0.3;
        assert!((model.overall_score(&score) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_behavior_rating_scale() {
        let model = ReputationModel::default();
        let mut score = ReputationScore::new("u");
        model.apply_behavior(&mut score, 1.0);
        // 100 * 0.9 + 20 * 0.1 = 92 -> 4.6 stars
        assert!((score.behavior_rating - 4.6).abs() < 1e-9);
    }

    #[test]
    fn test_skill_accuracy_observation() {
        let model = ReputationModel::default();
        assert_eq!(model.skill_accuracy_observation(4.0, 4.0), 100.0);
        assert!((model.skill_accuracy_observation(4.0, 3.25) - 75.0).abs() < 1e-9);
        assert_eq!(model.skill_accuracy_observation(2.0, 6.0), 0.0);
    }

    #[test]
    fn test_auto_adjust_needs_three_records() {
        let model = ReputationModel::default();
        assert_eq!(model.suggest_skill_adjustment(4.0, &[record(5.5), record(5.5)]), None);
    }

    #[test]
    fn test_auto_adjust_damped() {
        let model = ReputationModel::default();
        let records = vec![record(5.0), record(5.0), record(5.0)];
        let adjusted = model.suggest_skill_adjustment(4.0, &records).unwrap();
        assert!((adjusted - 4.3).abs() < 1e-9);
    }

    #[test]
    fn test_auto_adjust_threshold_both_directions() {
        let model = ReputationModel::default();
        let close = vec![record(4.4), record(4.5), record(4.3)];
        assert_eq!(model.suggest_skill_adjustment(4.0, &close), None);

        let slightly_lower = vec![record(1.0), record(1.0), record(1.0)];
        assert_eq!(model.suggest_skill_adjustment(1.2, &slightly_lower), None);

        let lower = vec![record(1.0), record(1.0), record(1.0)];
        let adjusted = model.suggest_skill_adjustment(2.0, &lower).unwrap();
        assert!((adjusted - 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_auto_adjust_only_reads_window() {
        let model = ReputationModel::default();
        // newest five agree with the current level; older outliers are ignored
        let mut records = vec![record(4.0); 5];
        records.extend(vec![record(7.0); 10]);
        assert_eq!(model.suggest_skill_adjustment(4.0, &records), None);
    }
}
