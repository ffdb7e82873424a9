//! Decision orchestration: enumerate candidates, filter, select, and
//! assemble the response. A request moves through
//! filtering -> selecting -> decided | no-inventory | failed; only
//! total cache unavailability takes the failed path.

use crate::filter;
use crate::selector::Selector;
use adserver_cache::DecisionCache;
use adserver_core::config::DecisionConfig;
use adserver_core::error::{AdResult, AdServerError};
use adserver_core::types::{AdDecision, AdRequest, CreativeRecord, CreativeStatus};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Terminal outcome of a decision. "No inventory" is an expected,
/// frequent result, not an error.
#[derive(Debug, Clone)]
pub enum DecisionOutcome {
    Decided(AdDecision),
    NoInventory,
}

pub struct DecisionEngine<C> {
    cache: Arc<C>,
    selector: Selector,
    op_timeout: Duration,
}

impl<C: DecisionCache + 'static> DecisionEngine<C> {
    pub fn new(cache: Arc<C>, config: &DecisionConfig) -> Self {
        Self {
            cache,
            selector: Selector::new(config.selection_seed),
            op_timeout: Duration::from_millis(config.cache_op_timeout_ms),
        }
    }

    /// Select a (campaign, creative) pairing for one request. Holds no
    /// state across requests; every call re-reads the cache so sync
    /// agent updates become visible without invalidation.
    pub async fn decide(&self, request: &AdRequest) -> AdResult<DecisionOutcome> {
        let start = std::time::Instant::now();
        metrics::counter!("decisions.requests").increment(1);

        // Enumeration is the one fatal step: without the index there
        // are no candidates to degrade to.
        let candidate_ids = self
            .bounded(self.cache.active_campaign_ids())
            .await
            .map_err(|e| {
                metrics::counter!("decisions.failed").increment(1);
                AdServerError::CacheUnavailable(e.to_string())
            })?;

        if candidate_ids.is_empty() {
            info!(device_id = %request.device_id, "No active campaigns in cache");
            metrics::counter!("decisions.no_inventory").increment(1);
            return Ok(DecisionOutcome::NoInventory);
        }

        let eligible = self.filter_candidates(candidate_ids).await;
        if eligible.is_empty() {
            info!(device_id = %request.device_id, "No eligible campaign");
            metrics::counter!("decisions.no_inventory").increment(1);
            return Ok(DecisionOutcome::NoInventory);
        }

        let Some(campaign_id) = self.selector.pick(&eligible).map(str::to_string) else {
            metrics::counter!("decisions.no_inventory").increment(1);
            return Ok(DecisionOutcome::NoInventory);
        };

        // No campaign-level fallback: a selected campaign without a
        // usable creative ends the request as no-inventory.
        let Some(creative) = self.fetch_active_creative(&campaign_id).await else {
            metrics::counter!("decisions.no_inventory").increment(1);
            return Ok(DecisionOutcome::NoInventory);
        };

        let decision = AdDecision::new(&campaign_id, &creative);
        self.dispatch_request_counter(campaign_id);

        metrics::counter!("decisions.served").increment(1);
        metrics::histogram!("decisions.latency_us").record(start.elapsed().as_micros() as f64);
        debug!(
            ad_id = %decision.ad_id,
            campaign_id = %decision.campaign_id,
            creative_id = %decision.creative_id,
            "Ad decision served"
        );

        Ok(DecisionOutcome::Decided(decision))
    }

    /// Walk the candidate list, keeping enumeration order. A failing
    /// or absent record drops that candidate, never the request.
    async fn filter_candidates(&self, candidate_ids: Vec<String>) -> Vec<String> {
        let now = Utc::now();
        let mut eligible = Vec::with_capacity(candidate_ids.len());

        for id in candidate_ids {
            match self.bounded(self.cache.campaign(&id)).await {
                Ok(Some(record)) => match filter::check_campaign(&record, now) {
                    Ok(()) => eligible.push(id),
                    Err(reason) => {
                        debug!(campaign_id = %id, reason = reason.as_str(), "Campaign ineligible");
                    }
                },
                Ok(None) => {
                    debug!(campaign_id = %id, "Campaign record absent, skipping candidate");
                }
                Err(e) => {
                    metrics::counter!("decisions.candidate_errors").increment(1);
                    warn!(campaign_id = %id, error = %e, "Campaign read failed, skipping candidate");
                }
            }
        }

        eligible
    }

    async fn fetch_active_creative(&self, campaign_id: &str) -> Option<CreativeRecord> {
        let creative_id = match self.bounded(self.cache.random_creative_id(campaign_id)).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                info!(campaign_id = %campaign_id, "Campaign has no creatives");
                return None;
            }
            Err(e) => {
                warn!(campaign_id = %campaign_id, error = %e, "Creative index read failed");
                return None;
            }
        };

        match self.bounded(self.cache.creative(&creative_id)).await {
            Ok(Some(creative)) if creative.status == CreativeStatus::Active => Some(creative),
            Ok(Some(creative)) => {
                info!(
                    creative_id = %creative.id,
                    status = ?creative.status,
                    "Selected creative is not active"
                );
                None
            }
            Ok(None) => {
                info!(creative_id = %creative_id, "Creative record absent");
                None
            }
            Err(e) => {
                warn!(creative_id = %creative_id, error = %e, "Creative read failed");
                None
            }
        }
    }

    /// Fire-and-forget request counter. The task may outlive the HTTP
    /// response; failures are logged, never surfaced.
    fn dispatch_request_counter(&self, campaign_id: String) {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.incr_request_counter(&campaign_id).await {
                metrics::counter!("counters.request_errors").increment(1);
                warn!(campaign_id = %campaign_id, error = %e, "Request counter increment failed");
            }
        });
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| anyhow::anyhow!("cache operation timed out"))?
    }
}
