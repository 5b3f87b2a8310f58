//! Outbound notifications about new submissions.
//!
//! Delivery happens on a spawned task after the submission is stored. Its
//! outcome never reaches the submitter: failures are logged and dropped.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use crate::campaign::Campaign;
use crate::lead::Lead;
use crate::marketing::MarketingLead;

#[derive(Debug)]
pub struct NotifyError(pub String);

impl Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tells the contractor owning `campaign` about a new lead.
    async fn lead_submitted(&self, campaign: &Campaign, lead: &Lead) -> Result<(), NotifyError>;

    async fn marketing_lead_submitted(&self, lead: &MarketingLead) -> Result<(), NotifyError>;
}

/// Emits a structured event per submission instead of sending anything.
#[derive(Copy, Clone, Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn lead_submitted(&self, campaign: &Campaign, lead: &Lead) -> Result<(), NotifyError> {
        tracing::info!(
            contractor_id = %campaign.contractor_id,
            campaign_id = %campaign.id,
            lead_id = %lead.id,
            "new lead submitted"
        );
        Ok(())
    }

    async fn marketing_lead_submitted(&self, lead: &MarketingLead) -> Result<(), NotifyError> {
        tracing::info!(
            marketing_lead_id = %lead.id,
            company = lead.company.as_deref().unwrap_or_default(),
            "new marketing lead submitted"
        );
        Ok(())
    }
}

pub fn spawn_lead_submitted(notifier: Arc<dyn Notifier>, campaign: Campaign, lead: Lead) {
    let task = async move {
        if let Err(err) = notifier.lead_submitted(&campaign, &lead).await {
            tracing::warn!(lead_id = %lead.id, error = %err, "dropping lead notification");
        }
    };

    tokio::spawn(task.in_current_span());
}

pub fn spawn_marketing_lead_submitted(notifier: Arc<dyn Notifier>, lead: MarketingLead) {
    let task = async move {
        if let Err(err) = notifier.marketing_lead_submitted(&lead).await {
            tracing::warn!(
                marketing_lead_id = %lead.id,
                error = %err,
                "dropping marketing lead notification"
            );
        }
    };

    tokio::spawn(task.in_current_span());
}
