// Service exports
pub mod cache;
pub mod memory;
pub mod notifier;
pub mod postgres;
pub mod profiles;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager};
pub use memory::{MemoryStore, StaticProfiles};
pub use notifier::{LogNotifier, Notifier, WebhookNotifier};
pub use postgres::PostgresStore;
pub use profiles::{ProfileClient, ProfileError, ProfileSource};
pub use store::{ReputationMutation, SkillLevelAdjustment, Store, StoreError, StoreResult};
