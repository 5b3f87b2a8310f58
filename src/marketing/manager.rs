use std::sync::Arc;

use mockable::Clock;

use crate::database::Database;
use crate::error::Error;
use crate::lead::dedup::{self, DedupPolicy};
use crate::notify::{self, Notifier};
use crate::utils::{optional_text, require_email, require_text};

use super::{MarketingLead, MarketingLeadId};

#[derive(Clone, Debug, Default)]
pub struct MarketingSubmission {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
}

/// Stores a marketing contact request unless the same email submitted one
/// within the marketing dedup window. The notification goes out in the
/// background.
#[tracing::instrument(skip(db, clock, notifier))]
pub async fn submit_marketing_lead(
    db: &dyn Database,
    clock: &dyn Clock,
    policy: &DedupPolicy,
    notifier: Arc<dyn Notifier>,
    submission: MarketingSubmission,
) -> Result<MarketingLead, Error> {
    let name = require_text("name", "a non-empty name", submission.name)?;
    let email = require_email("email", &submission.email)?;

    let now = clock.utc();
    if dedup::is_duplicate_marketing_lead(db, &email, now, policy.marketing_window).await? {
        return Err(Error::DuplicateSubmission);
    }

    let lead = MarketingLead {
        id: MarketingLeadId::new(),
        name,
        email,
        company: optional_text(submission.company),
        phone: optional_text(submission.phone),
        message: optional_text(submission.message),
        submitted_at: now,
    };

    db.marketing_leads().insert_marketing_lead(&lead).await?;

    notify::spawn_marketing_lead_submitted(notifier, lead.clone());

    Ok(lead)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::database::test::MockDatabase;
    use crate::test_support::{MutableClock, Notification, RecordingNotifier};

    fn submission(email: &str) -> MarketingSubmission {
        MarketingSubmission {
            name: "Dana Roofing".into(),
            email: email.into(),
            company: Some("Dana Roofing LLC".into()),
            phone: Some(" ".into()),
            message: None,
        }
    }

    #[tokio::test]
    async fn repeat_within_a_day_is_rejected() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let (notifier, _events) = RecordingNotifier::new();
        let notifier: Arc<dyn Notifier> = Arc::new(notifier);
        let policy = DedupPolicy::default();

        let first = submit_marketing_lead(
            &db,
            &clock,
            &policy,
            notifier.clone(),
            submission("Dana@Example.com"),
        )
        .await
        .unwrap();
        assert_eq!(first.email, "dana@example.com");
        assert_eq!(first.phone, None);

        clock.advance(Duration::hours(23));
        let second = submit_marketing_lead(
            &db,
            &clock,
            &policy,
            notifier.clone(),
            submission("dana@example.com "),
        )
        .await;
        assert_eq!(second.unwrap_err(), Error::DuplicateSubmission);

        clock.advance(Duration::hours(1) + Duration::seconds(1));
        submit_marketing_lead(&db, &clock, &policy, notifier, submission("dana@example.com"))
            .await
            .unwrap();

        assert_eq!(db.marketing_leads.all().len(), 2);
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_submission() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let (notifier, mut events) = RecordingNotifier::failing();

        let lead = submit_marketing_lead(
            &db,
            &clock,
            &DedupPolicy::default(),
            Arc::new(notifier),
            submission("dana@example.com"),
        )
        .await
        .unwrap();

        assert_eq!(
            events.recv().await,
            Some(Notification::MarketingLeadSubmitted {
                marketing_lead_id: lead.id
            })
        );
        assert_eq!(db.marketing_leads.all(), vec![lead]);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_before_any_query() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let (notifier, _events) = RecordingNotifier::new();

        let result = submit_marketing_lead(
            &db,
            &clock,
            &DedupPolicy::default(),
            Arc::new(notifier),
            submission("not-an-email"),
        )
        .await;

        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidField { field: "email", .. }
        ));
        assert_eq!(db.marketing_leads.calls("exists_marketing_lead_since"), 0);
    }
}
