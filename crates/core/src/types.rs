use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Campaign lifecycle status as stored in the decision cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

impl FromStr for CampaignStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            _ => Err(()),
        }
    }
}

/// Creative lifecycle status. Only `active` creatives are selectable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CreativeStatus {
    Active,
    Inactive,
    Processing,
    Failed,
}

impl FromStr for CreativeStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "processing" => Ok(Self::Processing),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

/// Denormalized campaign projection held in the decision cache.
/// Owned and refreshed by the sync agent; read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub budget_total: f64,
    pub budget_spent: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl CampaignRecord {
    pub fn budget_remaining(&self) -> f64 {
        self.budget_total - self.budget_spent
    }
}

/// Denormalized creative projection. The owning campaign is carried by
/// the `campaign:{id}:creatives` index, not by the record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreativeRecord {
    pub id: String,
    pub name: String,
    pub video_url: String,
    pub duration: u32,
    pub format: String,
    pub status: CreativeStatus,
}

/// Incoming ad request from a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdRequest {
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, String>>,
}

/// The pairing returned to the caller. Built once per request,
/// never mutated afterward, never persisted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdDecision {
    pub ad_id: Uuid,
    pub campaign_id: String,
    pub creative_id: String,
    pub video_url: String,
    pub duration: u32,
    pub format: String,
    pub timestamp: DateTime<Utc>,
}

impl AdDecision {
    /// Assemble a decision for a (campaign, creative) pairing.
    pub fn new(campaign_id: &str, creative: &CreativeRecord) -> Self {
        Self {
            ad_id: Uuid::new_v4(),
            campaign_id: campaign_id.to_string(),
            creative_id: creative.id.clone(),
            video_url: creative.video_url.clone(),
            duration: creative.duration,
            format: creative.format.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Post-playback impression event reported by the device.
/// Delivery is at-least-once; the recorder does not deduplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpressionEvent {
    pub ad_id: String,
    pub campaign_id: String,
    pub creative_id: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Seconds of the creative actually watched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_status_parses_known_values() {
        assert_eq!("active".parse(), Ok(CampaignStatus::Active));
        assert_eq!("paused".parse(), Ok(CampaignStatus::Paused));
        assert_eq!("draft".parse(), Ok(CampaignStatus::Draft));
        assert_eq!("completed".parse(), Ok(CampaignStatus::Completed));
        assert!("ACTIVE".parse::<CampaignStatus>().is_err());
        assert!("archived".parse::<CampaignStatus>().is_err());
    }

    #[test]
    fn creative_status_parses_known_values() {
        assert_eq!("active".parse(), Ok(CreativeStatus::Active));
        assert_eq!("processing".parse(), Ok(CreativeStatus::Processing));
        assert!("ready".parse::<CreativeStatus>().is_err());
    }

    #[test]
    fn ad_request_optional_fields_default() {
        let req: AdRequest = serde_json::from_str(r#"{"device_id":"dev-1"}"#).unwrap();
        assert_eq!(req.device_id, "dev-1");
        assert!(req.device_type.is_none());
        assert!(req.app_id.is_none());
        assert!(req.context.is_none());
    }

    #[test]
    fn ad_decision_copies_creative_fields() {
        let creative = CreativeRecord {
            id: "v1".to_string(),
            name: "spot".to_string(),
            video_url: "https://x/a.mp4".to_string(),
            duration: 30,
            format: "mp4".to_string(),
            status: CreativeStatus::Active,
        };
        let decision = AdDecision::new("c1", &creative);
        assert_eq!(decision.campaign_id, "c1");
        assert_eq!(decision.creative_id, "v1");
        assert_eq!(decision.duration, 30);
        assert_eq!(decision.format, "mp4");
    }
}
