use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{JobStatus, Lead};

/// How long a fresh lead may go without a contact attempt before it is
/// flagged.
pub const UNCONTACTED_AFTER_HOURS: i64 = 24;

/// Display status of a lead on the map and dashboard. Derived on every read,
/// never stored.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStatus {
    Scheduled,
    Tentative,
    Uncontacted,
}

pub fn classify(lead: &Lead, now: DateTime<Utc>) -> MapStatus {
    if matches!(lead.job_status, JobStatus::Scheduled | JobStatus::Completed) {
        return MapStatus::Scheduled;
    }

    if lead.tentative_date.is_some() || lead.job_status == JobStatus::Contacted {
        return MapStatus::Tentative;
    }

    let elapsed = now.signed_duration_since(lead.submitted_at);
    if elapsed > Duration::hours(UNCONTACTED_AFTER_HOURS) && lead.contact_attempt == 0 {
        return MapStatus::Uncontacted;
    }

    MapStatus::Tentative
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignId;
    use crate::lead::manager::tests::{lead_in, now};

    fn stale_lead() -> Lead {
        let mut lead = lead_in(CampaignId::new());
        lead.submitted_at = now() - Duration::hours(24) - Duration::minutes(1);
        lead
    }

    #[test]
    fn untouched_lead_past_a_day_is_uncontacted() {
        let lead = stale_lead();

        assert_eq!(classify(&lead, now()), MapStatus::Uncontacted);
    }

    #[test]
    fn contact_attempt_keeps_lead_tentative() {
        let mut lead = stale_lead();
        lead.contact_attempt = 1;

        assert_eq!(classify(&lead, now()), MapStatus::Tentative);
    }

    #[test]
    fn exactly_a_day_is_not_yet_uncontacted() {
        let mut lead = stale_lead();
        lead.submitted_at = now() - Duration::hours(24);

        assert_eq!(classify(&lead, now()), MapStatus::Tentative);
    }

    #[test]
    fn scheduled_and_completed_win_over_everything() {
        let mut lead = stale_lead();
        lead.tentative_date = Some(now());

        lead.job_status = JobStatus::Scheduled;
        assert_eq!(classify(&lead, now()), MapStatus::Scheduled);

        lead.job_status = JobStatus::Completed;
        assert_eq!(classify(&lead, now()), MapStatus::Scheduled);
    }

    #[test]
    fn tentative_date_or_contacted_is_tentative() {
        let mut lead = stale_lead();
        lead.tentative_date = Some(now());
        assert_eq!(classify(&lead, now()), MapStatus::Tentative);

        let mut lead = stale_lead();
        lead.job_status = JobStatus::Contacted;
        assert_eq!(classify(&lead, now()), MapStatus::Tentative);
    }
}
