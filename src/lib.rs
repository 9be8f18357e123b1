//! Rally Algo - Partner matching and reputation engine for the Rally tennis app
//!
//! This library ranks nearby players by skill, distance, shared tags, age and
//! reputation, turns mutual card likes into matches, and keeps a per-user
//! reputation score and skill level up to date from match outcomes.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{
    distance::{calculate_bounding_box, haversine_distance},
    Matcher, ReputationModel,
};
pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use models::{
    Candidate, FindMatchesRequest, FindMatchesResponse, MatchingCriteria, MatchingResult, PlayerProfile,
    ScoringWeights,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let bbox = calculate_bounding_box(40.7128, -74.0060, 10.0);
        assert!(bbox.min_lat < 40.7128);
        assert_eq!(EngineConfig::default().required_confirmations, 2);
    }
}
