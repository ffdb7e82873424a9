//! Eligibility checks over cached campaign projections. Pure functions
//! over a record and a clock reading; the candidate walk that feeds
//! them lives in the engine.

use adserver_core::types::{CampaignRecord, CampaignStatus};
use chrono::{DateTime, Utc};

/// Why a campaign cannot serve right now. Used as a log/metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    NotActive,
    NotStarted,
    Ended,
    BudgetExhausted,
}

impl Ineligibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotActive => "not_active",
            Self::NotStarted => "not_started",
            Self::Ended => "ended",
            Self::BudgetExhausted => "budget_exhausted",
        }
    }
}

/// Check a campaign against the serving conditions: active status, a
/// live flight window `[start, end)`, and unspent budget (strict).
pub fn check_campaign(record: &CampaignRecord, now: DateTime<Utc>) -> Result<(), Ineligibility> {
    if record.status != CampaignStatus::Active {
        return Err(Ineligibility::NotActive);
    }
    if now < record.start_date {
        return Err(Ineligibility::NotStarted);
    }
    if now >= record.end_date {
        return Err(Ineligibility::Ended);
    }
    if record.budget_spent >= record.budget_total {
        return Err(Ineligibility::BudgetExhausted);
    }
    Ok(())
}

pub fn is_eligible(record: &CampaignRecord, now: DateTime<Utc>) -> bool {
    check_campaign(record, now).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn live_campaign(now: DateTime<Utc>) -> CampaignRecord {
        CampaignRecord {
            id: "c1".to_string(),
            name: "flight".to_string(),
            status: CampaignStatus::Active,
            budget_total: 10_000.0,
            budget_spent: 1_000.0,
            start_date: now - Duration::hours(24),
            end_date: now + Duration::hours(24),
        }
    }

    #[test]
    fn live_campaign_is_eligible() {
        let now = Utc::now();
        assert!(is_eligible(&live_campaign(now), now));
    }

    #[test]
    fn non_active_statuses_are_rejected() {
        let now = Utc::now();
        for status in [
            CampaignStatus::Draft,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
        ] {
            let mut record = live_campaign(now);
            record.status = status;
            assert_eq!(check_campaign(&record, now), Err(Ineligibility::NotActive));
        }
    }

    #[test]
    fn flight_window_is_half_open() {
        let now = Utc::now();
        let mut record = live_campaign(now);

        // now == start is inside the window.
        record.start_date = now;
        assert!(is_eligible(&record, now));

        // now == end is outside.
        record.start_date = now - Duration::hours(1);
        record.end_date = now;
        assert_eq!(check_campaign(&record, now), Err(Ineligibility::Ended));

        record.end_date = now + Duration::hours(1);
        record.start_date = now + Duration::seconds(1);
        assert_eq!(check_campaign(&record, now), Err(Ineligibility::NotStarted));
    }

    #[test]
    fn exactly_exhausted_budget_is_rejected() {
        let now = Utc::now();
        let mut record = live_campaign(now);
        record.budget_spent = record.budget_total;
        assert_eq!(
            check_campaign(&record, now),
            Err(Ineligibility::BudgetExhausted)
        );

        record.budget_spent = record.budget_total - 0.01;
        assert!(is_eligible(&record, now));
    }

    #[test]
    fn randomized_records_never_violate_serving_conditions() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(7);
        let statuses = [
            CampaignStatus::Draft,
            CampaignStatus::Active,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
        ];

        for _ in 0..1_000 {
            let total: f64 = rng.gen_range(0.0..100_000.0);
            let record = CampaignRecord {
                id: "rand".to_string(),
                name: "rand".to_string(),
                status: statuses[rng.gen_range(0..statuses.len())],
                budget_total: total,
                budget_spent: rng.gen_range(0.0..150_000.0),
                start_date: now + Duration::hours(rng.gen_range(-100..100)),
                end_date: now + Duration::hours(rng.gen_range(-100..100)),
            };

            if is_eligible(&record, now) {
                assert_eq!(record.status, CampaignStatus::Active);
                assert!(record.start_date <= now);
                assert!(now < record.end_date);
                assert!(record.budget_spent < record.budget_total);
            }
        }
    }
}
