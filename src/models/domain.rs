use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Player profile as served by the profile service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    /// NTRP level, 1.0 - 7.0
    #[serde(rename = "skillLevel")]
    pub skill_level: f64,
    #[serde(rename = "playingStyles", default)]
    pub playing_styles: Vec<String>,
    #[serde(rename = "playFrequency", default)]
    pub play_frequency: Option<String>,
    #[serde(rename = "preferredTimes", default)]
    pub preferred_times: Vec<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(rename = "locationPrivate", default)]
    pub location_private: bool,
    #[serde(default)]
    pub gender: String,
    #[serde(rename = "birthDate", default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "lastLoginAt", default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl PlayerProfile {
    /// Coordinates usable for distance math, `None` when hidden or unknown
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        if self.location_private {
            return None;
        }
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Age in whole years on the given day
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        let mut years = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    pub fn age(&self) -> Option<u32> {
        self.age_on(Utc::now().date_naive())
    }

    /// Every tag the player advertises (styles, frequency, preferred times)
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.playing_styles
            .iter()
            .chain(self.play_frequency.iter())
            .chain(self.preferred_times.iter())
            .map(String::as_str)
    }
}

/// A profile paired with the reputation figure the engine holds for it
#[derive(Debug, Clone)]
pub struct Candidate {
    pub profile: PlayerProfile,
    pub reputation: f64,
}

impl Candidate {
    pub fn new(profile: PlayerProfile, reputation: f64) -> Self {
        Self { profile, reputation }
    }

    pub fn user_id(&self) -> &str {
        &self.profile.user_id
    }
}

/// Per-request matching criteria, assumed validated by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingCriteria {
    #[serde(rename = "requesterId")]
    pub requester_id: String,
    #[serde(rename = "minSkillLevel", default)]
    pub min_skill_level: Option<f64>,
    #[serde(rename = "maxSkillLevel", default)]
    pub max_skill_level: Option<f64>,
    #[serde(rename = "maxDistanceKm", default)]
    pub max_distance_km: Option<f64>,
    /// Treat a hidden location as disqualifying when a distance limit is set
    #[serde(rename = "requireLocation", default)]
    pub require_location: bool,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(rename = "minAge", default)]
    pub min_age: Option<u32>,
    #[serde(rename = "maxAge", default)]
    pub max_age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(rename = "minReputation", default)]
    pub min_reputation: Option<f64>,
    #[serde(rename = "playTypes", default)]
    pub play_types: Vec<String>,
    #[serde(default)]
    pub availability: Vec<String>,
    #[serde(rename = "excludeUserIds", default)]
    pub exclude_user_ids: Vec<String>,
    #[serde(default)]
    pub limit: usize,
}

impl MatchingCriteria {
    pub fn for_requester(requester_id: impl Into<String>) -> Self {
        Self {
            requester_id: requester_id.into(),
            ..Default::default()
        }
    }

    /// Tags the requester asked for; empty means no preference
    pub fn requested_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self
            .play_types
            .iter()
            .chain(self.frequency.iter())
            .chain(self.availability.iter())
            .map(String::as_str)
            .collect();
        tags.sort_unstable();
        tags.dedup();
        tags
    }

    /// Gender filter, `None` when unset or "any"
    pub fn gender_filter(&self) -> Option<&str> {
        self.gender
            .as_deref()
            .filter(|g| !g.is_empty() && !g.eq_ignore_ascii_case("any"))
    }

    pub fn has_age_range(&self) -> bool {
        self.min_age.is_some() || self.max_age.is_some()
    }
}

/// Per-factor contributions, each in [0, 1]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub skill: f64,
    pub distance: f64,
    /// `None` when the requester asked for no tags
    #[serde(rename = "tagOverlap")]
    pub tag_overlap: Option<f64>,
    /// `None` when no age range was requested or the candidate's age is unknown
    pub age: Option<f64>,
    pub reputation: f64,
}

/// Scored candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingResult {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    #[serde(rename = "skillLevel")]
    pub skill_level: f64,
    /// `None` when either side hides its location
    #[serde(rename = "distanceKm")]
    pub distance_km: Option<f64>,
    /// Raw weighted score in [0, 1]
    #[serde(rename = "rawScore")]
    pub raw_score: f64,
    /// Display score, `raw_score * 100`
    #[serde(rename = "matchScore")]
    pub match_score: f64,
    #[serde(rename = "reputationScore")]
    pub reputation_score: f64,
    #[serde(rename = "lastLoginAt")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

/// Geospatial bounding box.
///
/// Longitudes stay in [-180, 180]. A box spanning the antimeridian has
/// `min_lon > max_lon` and covers `[min_lon, 180] ∪ [-180, max_lon]`.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }
}

/// Scoring weights. Need not sum to 1; the score is normalized over the
/// factors actually evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub skill: f64,
    pub distance: f64,
    pub tag_overlap: f64,
    pub age: f64,
    pub reputation: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            skill: 0.30,
            distance: 0.25,
            tag_overlap: 0.15,
            age: 0.10,
            reputation: 0.20,
        }
    }
}

/// Normalization constants for the scoring factors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    /// NTRP gap at which skill closeness reaches zero
    pub max_skill_spread: f64,
    /// Distance at which distance closeness reaches zero when the criteria set none
    pub max_considered_distance_km: f64,
    /// Years outside the requested age range at which age closeness reaches zero
    pub age_tolerance_years: f64,
    /// Floor on sampling weight so zero-score candidates can still surface
    pub sampling_epsilon: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            max_skill_spread: 3.0,
            max_considered_distance_km: 50.0,
            age_tolerance_years: 5.0,
            sampling_epsilon: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> PlayerProfile {
        PlayerProfile {
            user_id: "p1".to_string(),
            name: "Pat".to_string(),
            skill_level: 4.0,
            playing_styles: vec!["baseline".to_string()],
            play_frequency: Some("weekly".to_string()),
            preferred_times: vec!["weekend_morning".to_string()],
            latitude: Some(40.0),
            longitude: Some(-74.0),
            location_private: false,
            gender: "female".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 6, 15),
            last_login_at: None,
        }
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let p = profile();
        let before = NaiveDate::from_ymd_opt(2020, 6, 14).unwrap();
        let on = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();
        assert_eq!(p.age_on(before), Some(29));
        assert_eq!(p.age_on(on), Some(30));
    }

    #[test]
    fn test_private_location_hides_coordinates() {
        let mut p = profile();
        assert!(p.coordinates().is_some());
        p.location_private = true;
        assert!(p.coordinates().is_none());
    }

    #[test]
    fn test_requested_tags_dedup() {
        let criteria = MatchingCriteria {
            play_types: vec!["singles".to_string(), "singles".to_string()],
            frequency: Some("weekly".to_string()),
            ..Default::default()
        };
        assert_eq!(criteria.requested_tags(), vec!["singles", "weekly"]);
    }

    #[test]
    fn test_gender_filter_any() {
        let mut criteria = MatchingCriteria::default();
        assert!(criteria.gender_filter().is_none());
        criteria.gender = Some("Any".to_string());
        assert!(criteria.gender_filter().is_none());
        criteria.gender = Some("male".to_string());
        assert_eq!(criteria.gender_filter(), Some("male"));
    }
}
