//! Best-effort suppression of repeated form submissions.
//!
//! A submission is a duplicate when the same normalized email already
//! submitted within a trailing window. The check is a read followed by the
//! caller's insert, so two submissions racing each other can both pass.

use chrono::{DateTime, Duration, Utc};

use crate::campaign::CampaignId;
use crate::database::Database;
use crate::error::Error;

/// Dedup windows for the two kinds of submissions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DedupPolicy {
    pub lead_window: Duration,
    pub marketing_window: Duration,
}

impl Default for DedupPolicy {
    fn default() -> DedupPolicy {
        DedupPolicy {
            lead_window: Duration::hours(1),
            marketing_window: Duration::hours(24),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[tracing::instrument(skip(db))]
pub async fn is_duplicate_lead(
    db: &dyn Database,
    campaign_id: CampaignId,
    normalized_email: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<bool, Error> {
    db.leads()
        .exists_lead_since(campaign_id, normalized_email, now - window)
        .await
}

#[tracing::instrument(skip(db))]
pub async fn is_duplicate_marketing_lead(
    db: &dyn Database,
    normalized_email: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<bool, Error> {
    db.marketing_leads()
        .exists_marketing_lead_since(normalized_email, now - window)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test::MockDatabase;
    use crate::lead::manager::tests::{lead_in, now};

    #[test]
    fn normalization_trims_and_lowercases() {
        assert_eq!(normalize_email("A@B.COM"), "a@b.com");
        assert_eq!(normalize_email("a@b.com "), "a@b.com");
        assert_eq!(normalize_email("A@B.COM"), normalize_email("a@b.com "));
    }

    #[tokio::test]
    async fn recent_submission_is_a_duplicate() {
        let db = MockDatabase::new();
        let campaign_id = CampaignId::new();
        let mut lead = lead_in(campaign_id);
        lead.email = "a@b.com".into();
        lead.submitted_at = now() - Duration::minutes(59);
        db.leads.put(lead);

        let window = Duration::hours(1);

        assert!(is_duplicate_lead(&db, campaign_id, "a@b.com", now(), window)
            .await
            .unwrap());
        assert!(
            !is_duplicate_lead(&db, CampaignId::new(), "a@b.com", now(), window)
                .await
                .unwrap()
        );
        assert!(!is_duplicate_lead(&db, campaign_id, "c@d.com", now(), window)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn submission_outside_window_is_not_a_duplicate() {
        let db = MockDatabase::new();
        let campaign_id = CampaignId::new();
        let mut lead = lead_in(campaign_id);
        lead.email = "a@b.com".into();
        lead.submitted_at = now() - Duration::minutes(61);
        db.leads.put(lead);

        let duplicate = is_duplicate_lead(&db, campaign_id, "a@b.com", now(), Duration::hours(1))
            .await
            .unwrap();

        assert!(!duplicate);
        assert_eq!(db.leads.writes(), 0);
    }
}
