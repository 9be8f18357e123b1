// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod matcher;
pub mod privacy;
pub mod ranking;
pub mod reputation;
pub mod sampling;
pub mod scoring;

pub use distance::{calculate_bounding_box, distance_between, haversine_distance, is_within_bounding_box};
pub use filters::{filter_candidates, matches_gender, meets_min_reputation, within_distance, within_skill_range};
pub use matcher::{MatchOutcome, Matcher};
pub use privacy::{check_access, privacy_gate, project};
pub use ranking::rank_candidates;
pub use reputation::{AutoAdjustPolicy, ReputationModel, ReputationWeights};
pub use sampling::weighted_sample;
pub use scoring::calculate_matching_score;
