use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::distance::calculate_bounding_box;
use crate::models::{MatchingCriteria, PlayerProfile};
use crate::services::cache::{CacheKey, CacheManager};

/// Errors that can occur when talking to the profile service
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Read-only source of player profiles
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<PlayerProfile, ProfileError>;

    /// Coarse candidate pool for `requester`. Implementations may push cheap
    /// filters down but never apply the engine's scoring; the engine filters
    /// the pool again.
    async fn query_candidates(
        &self,
        requester: &PlayerProfile,
        criteria: &MatchingCriteria,
        limit: usize,
    ) -> Result<Vec<PlayerProfile>, ProfileError>;
}

/// HTTP client for the external profile service
///
/// Profiles are read from `GET {base}/profiles/{id}` and candidate pools from
/// `GET {base}/profiles?query=[...]&limit=N`, where `query` is a JSON array of
/// filter expressions. Both are cached when a `CacheManager` is attached.
pub struct ProfileClient {
    base_url: String,
    api_key: String,
    client: Client,
    cache: Option<Arc<CacheManager>>,
}

impl ProfileClient {
    pub fn new(base_url: String, api_key: String, timeout_secs: u64) -> Result<Self, ProfileError> {
        let client = Client::builder().timeout(Duration::from_secs(timeout_secs)).build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Filter expressions pushed down to the profile service.
    ///
    /// Skill bounds are never pushed down: the engine's tracked level can
    /// differ from the self-reported one, so `filter_candidates` decides.
    /// Location is only pushed down when it is mandatory, since players who
    /// hide their location must otherwise stay in the pool.
    pub fn build_queries(requester: &PlayerProfile, criteria: &MatchingCriteria) -> Vec<String> {
        let mut queries = vec![format!("notEqual(\"userId\", {})", quoted(&requester.user_id))];

        if let Some(gender) = criteria.gender_filter() {
            queries.push(format!("equal(\"gender\", {})", quoted(&gender.to_lowercase())));
        }

        if criteria.require_location {
            if let (Some((lat, lon)), Some(max_km)) = (requester.coordinates(), criteria.max_distance_km) {
                let bbox = calculate_bounding_box(lat, lon, max_km);
                queries.push("equal(\"locationPrivate\", false)".to_string());
                queries.push(format!("between(\"latitude\", {}, {})", bbox.min_lat, bbox.max_lat));
                // a wrapped range cannot be one `between`; the engine filters longitude itself
                if !bbox.crosses_antimeridian() {
                    queries.push(format!("between(\"longitude\", {}, {})", bbox.min_lon, bbox.max_lon));
                }
            }
        }

        for id in &criteria.exclude_user_ids {
            queries.push(format!("notEqual(\"userId\", {})", quoted(id)));
        }

        queries
    }

    fn fingerprint(encoded_query: &str, limit: usize) -> u64 {
        let mut hasher = DefaultHasher::new();
        encoded_query.hash(&mut hasher);
        limit.hash(&mut hasher);
        hasher.finish()
    }

    async fn cached<T>(&self, key: &str) -> Option<T>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let cache = self.cache.as_ref()?;
        cache.get(key).await.ok()
    }

    async fn store_cached<T: serde::Serialize>(&self, key: &str, value: &T) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(key, value).await {
                tracing::warn!("Failed to cache {}: {}", key, e);
            }
        }
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<PlayerProfile, ProfileError> {
        let url = self.url(&format!("profiles/{}", urlencoding::encode(user_id)));
        tracing::debug!("Fetching profile for user: {}", user_id);

        let response = self.client.get(&url).header("X-Api-Key", &self.api_key).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ProfileError::NotFound(user_id.to_string())),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
                tracing::error!("Failed to fetch profile for {}: {} - {}", user_id, status, body);
                return Err(ProfileError::ApiError(format!("Failed to fetch profile: {}", status)));
            }
            _ => {}
        }

        let json: Value = response.json().await?;
        let data = json.get("data").unwrap_or(&json);

        serde_json::from_value(data.clone())
            .map_err(|e| ProfileError::InvalidResponse(format!("Failed to parse profile: {}", e)))
    }
}

/// JSON string literal, escaped, for embedding in a filter expression
fn quoted(value: &str) -> String {
    Value::from(value).to_string()
}

#[async_trait]
impl ProfileSource for ProfileClient {
    async fn get_profile(&self, user_id: &str) -> Result<PlayerProfile, ProfileError> {
        let key = CacheKey::profile(user_id);
        if let Some(profile) = self.cached::<PlayerProfile>(&key).await {
            return Ok(profile);
        }

        let profile = self.fetch_profile(user_id).await?;
        self.store_cached(&key, &profile).await;
        Ok(profile)
    }

    async fn query_candidates(
        &self,
        requester: &PlayerProfile,
        criteria: &MatchingCriteria,
        limit: usize,
    ) -> Result<Vec<PlayerProfile>, ProfileError> {
        let queries = Self::build_queries(requester, criteria);
        let queries_json = serde_json::to_string(&queries)
            .map_err(|e| ProfileError::InvalidResponse(format!("Failed to encode query: {}", e)))?;
        let encoded_queries = urlencoding::encode(&queries_json);

        let key = CacheKey::candidates(&requester.user_id, Self::fingerprint(&encoded_queries, limit));
        if let Some(pool) = self.cached::<Vec<PlayerProfile>>(&key).await {
            tracing::debug!("Using cached candidate pool for {}", requester.user_id);
            return Ok(pool);
        }

        let url = format!("{}?query={}&limit={}", self.url("profiles"), encoded_queries, limit);
        let response = self.client.get(&url).header("X-Api-Key", &self.api_key).send().await?;

        if !response.status().is_success() {
            return Err(ProfileError::ApiError(format!(
                "Failed to query candidates: {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;
        let total = json.get("total").and_then(|t| t.as_u64()).unwrap_or(0);
        let documents = json
            .get("profiles")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ProfileError::InvalidResponse("Missing profiles array".into()))?;

        let pool: Vec<PlayerProfile> = documents
            .iter()
            .filter_map(|doc| {
                let data = doc.get("data").unwrap_or(doc);
                match serde_json::from_value::<PlayerProfile>(data.clone()) {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        tracing::warn!("Skipping malformed profile: {}", e);
                        None
                    }
                }
            })
            .filter(|p| p.user_id != requester.user_id)
            .collect();

        tracing::debug!("Queried {} candidates (total: {})", pool.len(), total);
        self.store_cached(&key, &pool).await;

        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requester() -> PlayerProfile {
        serde_json::from_value(serde_json::json!({
            "userId": "me",
            "skillLevel": 4.0,
            "latitude": 52.52,
            "longitude": 13.40
        }))
        .unwrap()
    }

    #[test]
    fn test_location_pushed_down_only_when_required() {
        let mut criteria = MatchingCriteria::for_requester("me");
        criteria.max_distance_km = Some(10.0);

        let loose = ProfileClient::build_queries(&requester(), &criteria);
        assert!(!loose.iter().any(|q| q.contains("latitude")));

        criteria.require_location = true;
        let strict = ProfileClient::build_queries(&requester(), &criteria);
        assert!(strict.iter().any(|q| q.contains("latitude")));
        assert!(strict.iter().any(|q| q.contains("locationPrivate")));
    }

    #[test]
    fn test_skill_range_not_pushed_down() {
        let mut criteria = MatchingCriteria::for_requester("me");
        criteria.min_skill_level = Some(3.5);
        criteria.max_skill_level = Some(4.5);

        let queries = ProfileClient::build_queries(&requester(), &criteria);
        assert!(!queries.iter().any(|q| q.contains("skillLevel")));
    }

    #[test]
    fn test_query_values_are_escaped() {
        let mut criteria = MatchingCriteria::for_requester("me");
        criteria.exclude_user_ids = vec![r#"x", "y"#.to_string()];
        criteria.gender = Some("fe\"male".to_string());

        let queries = ProfileClient::build_queries(&requester(), &criteria);
        assert!(queries.contains(&r#"notEqual("userId", "x\", \"y")"#.to_string()));
        assert!(queries.contains(&r#"equal("gender", "fe\"male")"#.to_string()));
    }

    #[test]
    fn test_wrapped_longitude_not_pushed_down() {
        let requester: PlayerProfile = serde_json::from_value(serde_json::json!({
            "userId": "fiji",
            "skillLevel": 4.0,
            "latitude": -17.0,
            "longitude": 179.99
        }))
        .unwrap();
        let mut criteria = MatchingCriteria::for_requester("fiji");
        criteria.max_distance_km = Some(10.0);
        criteria.require_location = true;

        let queries = ProfileClient::build_queries(&requester, &criteria);
        assert!(queries.iter().any(|q| q.contains("latitude")));
        assert!(!queries.iter().any(|q| q.contains("longitude")));
    }

    #[tokio::test]
    async fn test_query_candidates_keeps_out_of_range_self_reported_levels() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/profiles")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"total": 1, "profiles": [{"userId": "improver", "skillLevel": 3.0}]}"#)
            .create_async()
            .await;

        let mut criteria = MatchingCriteria::for_requester("me");
        criteria.min_skill_level = Some(3.5);
        criteria.max_skill_level = Some(4.5);

        let client = ProfileClient::new(server.url(), "key".to_string(), 5).unwrap();
        let pool = client.query_candidates(&requester(), &criteria, 50).await.unwrap();

        mock.assert_async().await;
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].skill_level, 3.0);
    }

    #[test]
    fn test_any_gender_not_pushed_down() {
        let mut criteria = MatchingCriteria::for_requester("me");
        criteria.gender = Some("any".to_string());
        let queries = ProfileClient::build_queries(&requester(), &criteria);
        assert!(!queries.iter().any(|q| q.contains("gender")));
    }

    #[tokio::test]
    async fn test_get_profile_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/profiles/ghost").with_status(404).create_async().await;

        let client = ProfileClient::new(server.url(), "key".to_string(), 5).unwrap();
        let result = client.get_profile("ghost").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ProfileError::NotFound(id)) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_get_profile_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/profiles/p1")
            .match_header("x-api-key", "key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"userId": "p1", "name": "Pat", "skillLevel": 3.5}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = ProfileClient::new(server.url(), "key".to_string(), 5)
            .unwrap()
            .with_cache(Arc::new(CacheManager::in_memory(100, 60)));

        let first = client.get_profile("p1").await.unwrap();
        let second = client.get_profile("p1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(first.name, "Pat");
        assert_eq!(second.skill_level, 3.5);
    }

    #[tokio::test]
    async fn test_query_candidates_skips_malformed_and_self() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/profiles")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"total": 3, "profiles": [
                    {"userId": "a", "skillLevel": 4.0},
                    {"userId": "me", "skillLevel": 4.0},
                    {"userId": "broken"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = ProfileClient::new(server.url(), "key".to_string(), 5).unwrap();
        let pool = client
            .query_candidates(&requester(), &MatchingCriteria::for_requester("me"), 50)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].user_id, "a");
    }
}
