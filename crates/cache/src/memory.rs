//! In-process decision cache backed by DashMap. Stands in for Redis in
//! unit and router tests: same trait, same key schema for counters,
//! plus switches to simulate an unreachable cache and per-record read
//! failures.

use crate::keys;
use crate::DecisionCache;
use adserver_core::types::{CampaignRecord, CreativeRecord};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct MemoryDecisionCache {
    campaigns: DashMap<String, CampaignRecord>,
    creatives: DashMap<String, CreativeRecord>,
    creative_index: DashMap<String, Vec<String>>,
    counters: DashMap<String, u64>,
    index_only: DashMap<String, ()>,
    failing_reads: DashMap<String, ()>,
    delayed_reads: DashMap<String, Duration>,
    delay_all_ms: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryDecisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a campaign and register it in the active index.
    pub fn put_campaign(&self, record: CampaignRecord) {
        self.campaigns.insert(record.id.clone(), record);
    }

    /// Seed a creative under its owning campaign.
    pub fn put_creative(&self, campaign_id: &str, record: CreativeRecord) {
        self.creative_index
            .entry(campaign_id.to_string())
            .or_default()
            .push(record.id.clone());
        self.creatives.insert(record.id.clone(), record);
    }

    /// Register an id in the active index without storing a record,
    /// as when a campaign hash expired but the index entry did not.
    pub fn index_without_record(&self, campaign_id: &str) {
        self.index_only.insert(campaign_id.to_string(), ());
    }

    /// Make every operation fail, as if the cache were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Stall reads of one campaign, as if that key were slow to serve.
    pub fn delay_reads_for(&self, campaign_id: &str, delay: Duration) {
        self.delayed_reads.insert(campaign_id.to_string(), delay);
    }

    /// Stall every operation by a fixed amount.
    pub fn delay_all(&self, delay: Duration) {
        self.delay_all_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make reads of one campaign fail, as if that record were corrupt
    /// at the transport level.
    pub fn fail_reads_for(&self, campaign_id: &str) {
        self.failing_reads.insert(campaign_id.to_string(), ());
    }

    /// Current value of a counter key, zero if never incremented.
    pub fn counter(&self, key: &str) -> u64 {
        self.counters.get(key).map(|v| *v).unwrap_or(0)
    }

    /// Current-hour request counter for a campaign.
    pub fn request_count(&self, campaign_id: &str) -> u64 {
        self.counter(&keys::campaign_requests(campaign_id, Utc::now()))
    }

    /// Current-hour impression counter for a creative.
    pub fn impression_count(&self, creative_id: &str) -> u64 {
        self.counter(&keys::creative_impressions(creative_id, Utc::now()))
    }

    fn check_available(&self) -> anyhow::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("decision cache unavailable");
        }
        Ok(())
    }

    async fn apply_global_delay(&self) {
        let millis = self.delay_all_ms.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}

#[async_trait]
impl DecisionCache for MemoryDecisionCache {
    async fn active_campaign_ids(&self) -> anyhow::Result<Vec<String>> {
        self.check_available()?;
        self.apply_global_delay().await;
        // Sorted by remaining budget, mirroring the ZSET ordering.
        let mut entries: Vec<(String, f64)> = self
            .campaigns
            .iter()
            .map(|e| (e.key().clone(), e.value().budget_remaining()))
            .collect();
        entries.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut ids: Vec<String> = entries.into_iter().map(|(id, _)| id).collect();
        ids.extend(self.index_only.iter().map(|e| e.key().clone()));
        Ok(ids)
    }

    async fn campaign(&self, id: &str) -> anyhow::Result<Option<CampaignRecord>> {
        self.check_available()?;
        self.apply_global_delay().await;
        if let Some(delay) = self.delayed_reads.get(id).map(|d| *d) {
            tokio::time::sleep(delay).await;
        }
        if self.failing_reads.contains_key(id) {
            anyhow::bail!("read failure for campaign {id}");
        }
        Ok(self.campaigns.get(id).map(|r| r.clone()))
    }

    async fn random_creative_id(&self, campaign_id: &str) -> anyhow::Result<Option<String>> {
        self.check_available()?;
        self.apply_global_delay().await;
        // First member in insertion order; deterministic on purpose so
        // tests can pin the expected creative.
        Ok(self
            .creative_index
            .get(campaign_id)
            .and_then(|ids| ids.first().cloned()))
    }

    async fn creative(&self, id: &str) -> anyhow::Result<Option<CreativeRecord>> {
        self.check_available()?;
        self.apply_global_delay().await;
        Ok(self.creatives.get(id).map(|r| r.clone()))
    }

    async fn incr_request_counter(&self, campaign_id: &str) -> anyhow::Result<u64> {
        self.check_available()?;
        self.apply_global_delay().await;
        let key = keys::campaign_requests(campaign_id, Utc::now());
        let mut entry = self.counters.entry(key).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn incr_impression_counter(&self, creative_id: &str) -> anyhow::Result<u64> {
        self.check_available()?;
        self.apply_global_delay().await;
        let key = keys::creative_impressions(creative_id, Utc::now());
        let mut entry = self.counters.entry(key).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adserver_core::types::CampaignStatus;
    use chrono::Duration;

    fn campaign(id: &str, spent: f64) -> CampaignRecord {
        CampaignRecord {
            id: id.to_string(),
            name: format!("campaign {id}"),
            status: CampaignStatus::Active,
            budget_total: 1000.0,
            budget_spent: spent,
            start_date: Utc::now() - Duration::hours(1),
            end_date: Utc::now() + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn enumeration_orders_by_remaining_budget() {
        let cache = MemoryDecisionCache::new();
        cache.put_campaign(campaign("rich", 0.0));
        cache.put_campaign(campaign("poor", 990.0));

        let ids = cache.active_campaign_ids().await.unwrap();
        assert_eq!(ids, vec!["poor".to_string(), "rich".to_string()]);
    }

    #[tokio::test]
    async fn repeated_reads_return_same_record() {
        let cache = MemoryDecisionCache::new();
        cache.put_campaign(campaign("c1", 10.0));

        let first = cache.campaign("c1").await.unwrap().unwrap();
        let second = cache.campaign("c1").await.unwrap().unwrap();
        assert_eq!(first.budget_spent, second.budget_spent);
        assert_eq!(first.end_date, second.end_date);
    }

    #[tokio::test]
    async fn unavailable_switch_fails_every_operation() {
        let cache = MemoryDecisionCache::new();
        cache.put_campaign(campaign("c1", 0.0));
        cache.set_unavailable(true);

        assert!(cache.active_campaign_ids().await.is_err());
        assert!(cache.campaign("c1").await.is_err());
        assert!(cache.incr_request_counter("c1").await.is_err());
    }

    #[tokio::test]
    async fn counters_increment_by_one_per_call() {
        let cache = MemoryDecisionCache::new();
        assert_eq!(cache.impression_count("v1"), 0);
        cache.incr_impression_counter("v1").await.unwrap();
        cache.incr_impression_counter("v1").await.unwrap();
        assert_eq!(cache.impression_count("v1"), 2);
    }
}
