#![warn(clippy::unwrap_used)]

pub mod client;
pub mod keys;
pub mod memory;

pub use client::RedisDecisionCache;
pub use memory::MemoryDecisionCache;

use adserver_core::types::{CampaignRecord, CreativeRecord};
use async_trait::async_trait;

/// Read/increment contract against the decision cache. The engine
/// takes this as an injected handle so tests can substitute
/// [`MemoryDecisionCache`] for the Redis-backed client.
///
/// Absence (`Ok(None)` / empty vec) is a normal outcome, not an error;
/// `Err` means the cache operation itself failed.
#[async_trait]
pub trait DecisionCache: Send + Sync {
    /// Enumerate the active-campaign index. Empty means no inventory.
    async fn active_campaign_ids(&self) -> anyhow::Result<Vec<String>>;

    /// Fetch a campaign projection. `None` when missing or malformed.
    async fn campaign(&self, id: &str) -> anyhow::Result<Option<CampaignRecord>>;

    /// Pick a random member of the campaign's creative index.
    async fn random_creative_id(&self, campaign_id: &str) -> anyhow::Result<Option<String>>;

    /// Fetch a creative projection. `None` when missing or malformed.
    async fn creative(&self, id: &str) -> anyhow::Result<Option<CreativeRecord>>;

    /// Bump the campaign's current-hour request counter.
    async fn incr_request_counter(&self, campaign_id: &str) -> anyhow::Result<u64>;

    /// Bump the creative's current-hour impression counter.
    async fn incr_impression_counter(&self, creative_id: &str) -> anyhow::Result<u64>;
}
