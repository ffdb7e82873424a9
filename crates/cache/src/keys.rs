//! Cache key schema shared with the sync agent. The names here are a
//! contract: the sync agent writes these exact keys and field layouts,
//! the engine only reads them.

use chrono::{DateTime, Utc};

/// Ordered index of serviceable campaigns, scored by remaining budget.
pub const ACTIVE_CAMPAIGNS: &str = "active_campaigns";

/// Counter buckets live one hour past the 24h monitoring window.
pub const COUNTER_TTL_SECS: u64 = 25 * 3600;

pub fn campaign(id: &str) -> String {
    format!("campaign:{id}")
}

pub fn campaign_creatives(campaign_id: &str) -> String {
    format!("campaign:{campaign_id}:creatives")
}

pub fn creative(id: &str) -> String {
    format!("creative:{id}")
}

pub fn campaign_requests(campaign_id: &str, now: DateTime<Utc>) -> String {
    format!("campaign:{campaign_id}:requests:{}", hour_bucket(now))
}

pub fn creative_impressions(creative_id: &str, now: DateTime<Utc>) -> String {
    format!("creative:{creative_id}:impressions:{}", hour_bucket(now))
}

/// UTC hour bucket, `YYYYMMDDHH`.
pub fn hour_bucket(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_layout_matches_sync_agent_contract() {
        assert_eq!(campaign("c1"), "campaign:c1");
        assert_eq!(campaign_creatives("c1"), "campaign:c1:creatives");
        assert_eq!(creative("v1"), "creative:v1");
    }

    #[test]
    fn hour_bucket_is_utc_and_zero_padded() {
        let t = Utc.with_ymd_and_hms(2026, 3, 7, 9, 59, 59).unwrap();
        assert_eq!(hour_bucket(t), "2026030709");
        assert_eq!(campaign_requests("c1", t), "campaign:c1:requests:2026030709");
        assert_eq!(
            creative_impressions("v1", t),
            "creative:v1:impressions:2026030709"
        );
    }

    #[test]
    fn counter_ttl_covers_24h_window_with_slack() {
        assert_eq!(COUNTER_TTL_SECS, 90_000);
    }
}
