use std::sync::Arc;

use mockable::Clock;

use crate::campaign::manager::{authorize_campaign, get_public_campaign};
use crate::campaign::{Campaign, CampaignId};
use crate::contractor::ContractorId;
use crate::database::Database;
use crate::error::Error;
use crate::notify::{self, Notifier};
use crate::utils::{optional_text, require_email, require_text};

use super::dates::{parse_date_input, parse_date_patch};
use super::dedup::{self, DedupPolicy};
use super::{Job, JobState, JobStatus, Lead, LeadId, PriorLeadState};

const PROMOTION_STATES: &str = "one of scheduled, in_progress";
const JOB_UPDATE_STATES: &str = "one of scheduled, completed";

/// A homeowner's form submission, as received.
#[derive(Clone, Debug, Default)]
pub struct LeadSubmission {
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct StatusUpdate {
    pub job_status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Promotion {
    pub status: Option<String>,
    pub scheduled_inspection_date: Option<String>,
    pub inspector: Option<String>,
    pub internal_notes: Option<String>,
}

/// Changes to an existing job. For each field `None` leaves it alone.
#[derive(Clone, Debug, Default)]
pub struct JobUpdate {
    pub status: Option<String>,
    pub scheduled_inspection_date: Option<Option<String>>,
    pub inspector: Option<String>,
    pub internal_notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ContactAttempt {
    pub contact_attempt: i32,
    pub is_cold_lead: bool,
    pub tentative_date: Option<Option<String>>,
    pub inspector: Option<String>,
    pub internal_notes: Option<String>,
}

/// Resolves a lead together with its campaign on behalf of a contractor.
///
/// A missing lead, a missing campaign and a campaign owned by another
/// contractor all produce the same `LeadNotFound`, so callers cannot probe
/// for leads they do not own. Every lead operation goes through here before
/// touching anything.
#[tracing::instrument(skip(db))]
pub async fn authorize_lead(
    db: &dyn Database,
    lead_id: LeadId,
    contractor_id: &ContractorId,
) -> Result<(Lead, Campaign), Error> {
    let lead = db
        .leads()
        .fetch_lead_by_id(lead_id)
        .await?
        .ok_or(Error::LeadNotFound { lead_id })?;

    let campaign = db
        .campaigns()
        .fetch_campaign_by_id(lead.campaign_id)
        .await?
        .filter(|campaign| campaign.contractor_id == *contractor_id)
        .ok_or(Error::LeadNotFound { lead_id })?;

    Ok((lead, campaign))
}

/// Stores a public submission against the campaign behind `page_slug`.
///
/// Fails with `DuplicateSubmission` when the same normalized email already
/// submitted to this campaign within the dedup window. The contractor is
/// notified in the background once the lead is stored.
#[tracing::instrument(skip(db, clock, notifier))]
pub async fn submit_lead(
    db: &dyn Database,
    clock: &dyn Clock,
    policy: &DedupPolicy,
    notifier: Arc<dyn Notifier>,
    page_slug: &str,
    submission: LeadSubmission,
) -> Result<Lead, Error> {
    let name = require_text("name", "a non-empty name", submission.name)?;
    let address = require_text("address", "a non-empty address", submission.address)?;
    let email = require_email("email", &submission.email)?;
    let phone = require_text("phone", "a non-empty phone number", submission.phone)?;

    let campaign = get_public_campaign(db, page_slug).await?;

    let now = clock.utc();
    if dedup::is_duplicate_lead(db, campaign.id, &email, now, policy.lead_window).await? {
        return Err(Error::DuplicateSubmission);
    }

    let lead = Lead {
        id: LeadId::new(),
        campaign_id: campaign.id,
        name,
        address,
        email,
        phone,
        notes: optional_text(submission.notes),
        submitted_at: now,
        job_status: JobStatus::New,
        job: None,
        scheduled_inspection_date: None,
        tentative_date: None,
        is_cold_lead: false,
        cold_since: None,
        contact_attempt: 0,
        inspector: None,
        internal_notes: None,
        location: None,
        modified_at: now,
    };

    db.leads().insert_lead(&lead).await?;

    notify::spawn_lead_submitted(notifier, campaign, lead.clone());

    Ok(lead)
}

#[tracing::instrument(skip(db))]
pub async fn get_lead(
    db: &dyn Database,
    lead_id: LeadId,
    contractor_id: &ContractorId,
) -> Result<Lead, Error> {
    let (lead, _) = authorize_lead(db, lead_id, contractor_id).await?;

    Ok(lead)
}

#[tracing::instrument(skip(db))]
pub async fn get_leads_in_campaign(
    db: &dyn Database,
    campaign_id: CampaignId,
    contractor_id: &ContractorId,
) -> Result<Vec<Lead>, Error> {
    let campaign = authorize_campaign(db, campaign_id, contractor_id).await?;

    let leads = db.leads().fetch_leads_by_campaigns(&[campaign.id]).await?;

    Ok(leads)
}

#[tracing::instrument(skip(db, clock))]
pub async fn update_lead_status(
    db: &dyn Database,
    clock: &dyn Clock,
    lead_id: LeadId,
    contractor_id: &ContractorId,
    update: StatusUpdate,
) -> Result<Lead, Error> {
    let job_status = update
        .job_status
        .map(|value| {
            value
                .parse::<JobStatus>()
                .map_err(|_| Error::invalid_field("job_status", JobStatus::EXPECTED))
        })
        .transpose()?;

    let (mut lead, _) = authorize_lead(db, lead_id, contractor_id).await?;

    if job_status.is_none() && update.notes.is_none() {
        return Ok(lead);
    }

    if let Some(to) = job_status.filter(|to| *to != lead.job_status) {
        if lead.is_cold_lead {
            return Err(Error::LeadIsCold { lead_id });
        }

        if let Some(job) = &mut lead.job {
            job.status = match to {
                JobStatus::Scheduled if job.status == JobState::Completed => JobState::Scheduled,
                JobStatus::Scheduled => job.status,
                JobStatus::Completed => JobState::Completed,
                JobStatus::New | JobStatus::Contacted => {
                    return Err(Error::InvalidTransition {
                        lead_id,
                        from: lead.job_status,
                        to,
                    })
                }
            };
        }

        lead.job_status = to;
    }

    if let Some(notes) = update.notes {
        lead.internal_notes = optional_text(Some(notes));
    }

    save(db, clock, lead).await
}

/// Starts job tracking for a lead. The fields a promotion overwrites are
/// kept in the job so that `unschedule_job` can put them back.
#[tracing::instrument(skip(db, clock))]
pub async fn promote_lead_to_job(
    db: &dyn Database,
    clock: &dyn Clock,
    lead_id: LeadId,
    contractor_id: &ContractorId,
    promotion: Promotion,
) -> Result<Lead, Error> {
    let status = match promotion.status.as_deref().map(str::parse::<JobState>) {
        None => JobState::Scheduled,
        Some(Ok(JobState::Scheduled)) => JobState::Scheduled,
        Some(Ok(JobState::InProgress)) => JobState::InProgress,
        Some(Ok(JobState::Completed)) | Some(Err(())) => {
            return Err(Error::invalid_field("status", PROMOTION_STATES))
        }
    };
    let scheduled_inspection_date = promotion
        .scheduled_inspection_date
        .as_deref()
        .map(|value| parse_date_input("scheduled_inspection_date", value))
        .transpose()?
        .flatten();

    let (mut lead, _) = authorize_lead(db, lead_id, contractor_id).await?;

    if lead.job.is_some() {
        return Err(Error::LeadAlreadyPromoted { lead_id });
    }
    if lead.is_cold_lead {
        return Err(Error::LeadIsCold { lead_id });
    }
    if lead.job_status.is_terminal() {
        return Err(Error::LeadIsCompleted { lead_id });
    }

    let prior = PriorLeadState {
        job_status: lead.job_status,
        scheduled_inspection_date: lead.scheduled_inspection_date,
        inspector: lead.inspector.clone(),
        internal_notes: lead.internal_notes.clone(),
    };

    lead.job = Some(Job {
        status,
        promoted_at: clock.utc(),
        prior,
    });
    lead.job_status = status.job_status();
    if let Some(date) = scheduled_inspection_date {
        lead.scheduled_inspection_date = Some(date);
    }
    if let Some(inspector) = optional_text(promotion.inspector) {
        lead.inspector = Some(inspector);
    }
    if let Some(internal_notes) = optional_text(promotion.internal_notes) {
        lead.internal_notes = Some(internal_notes);
    }

    save(db, clock, lead).await
}

#[tracing::instrument(skip(db, clock))]
pub async fn update_job(
    db: &dyn Database,
    clock: &dyn Clock,
    lead_id: LeadId,
    contractor_id: &ContractorId,
    update: JobUpdate,
) -> Result<Lead, Error> {
    let status = match update.status.as_deref().map(str::parse::<JobState>) {
        None => None,
        Some(Ok(JobState::Scheduled)) => Some(JobState::Scheduled),
        Some(Ok(JobState::Completed)) => Some(JobState::Completed),
        Some(Ok(JobState::InProgress)) | Some(Err(())) => {
            return Err(Error::invalid_field("status", JOB_UPDATE_STATES))
        }
    };
    let scheduled_inspection_date =
        parse_date_patch("scheduled_inspection_date", update.scheduled_inspection_date)?;

    let (mut lead, _) = authorize_lead(db, lead_id, contractor_id).await?;

    let is_cold_lead = lead.is_cold_lead;
    let job = lead.job.as_mut().ok_or(Error::JobNotFound { lead_id })?;

    if let Some(status) = status.filter(|status| *status != job.status) {
        if is_cold_lead {
            return Err(Error::LeadIsCold { lead_id });
        }
        job.status = status;
        lead.job_status = status.job_status();
    }
    if let Some(date) = scheduled_inspection_date {
        lead.scheduled_inspection_date = date;
    }
    if let Some(inspector) = update.inspector {
        lead.inspector = optional_text(Some(inspector));
    }
    if let Some(internal_notes) = update.internal_notes {
        lead.internal_notes = optional_text(Some(internal_notes));
    }

    save(db, clock, lead).await
}

/// Undoes a promotion, restoring the fields it overwrote.
#[tracing::instrument(skip(db, clock))]
pub async fn unschedule_job(
    db: &dyn Database,
    clock: &dyn Clock,
    lead_id: LeadId,
    contractor_id: &ContractorId,
) -> Result<Lead, Error> {
    let (mut lead, _) = authorize_lead(db, lead_id, contractor_id).await?;

    let job = lead.job.take().ok_or(Error::JobNotFound { lead_id })?;

    lead.job_status = job.prior.job_status;
    lead.scheduled_inspection_date = job.prior.scheduled_inspection_date;
    lead.inspector = job.prior.inspector;
    lead.internal_notes = job.prior.internal_notes;

    save(db, clock, lead).await
}

/// Parks a lead in the cold bucket. Nothing but the cold flag and its
/// timestamp changes, so restoring it brings the lead back as it was.
#[tracing::instrument(skip(db, clock))]
pub async fn mark_job_as_cold(
    db: &dyn Database,
    clock: &dyn Clock,
    lead_id: LeadId,
    contractor_id: &ContractorId,
) -> Result<Lead, Error> {
    let (mut lead, _) = authorize_lead(db, lead_id, contractor_id).await?;

    if lead.job_status.is_terminal() {
        return Err(Error::LeadIsCompleted { lead_id });
    }
    if lead.is_cold_lead {
        return Err(Error::LeadIsCold { lead_id });
    }

    lead.is_cold_lead = true;
    lead.cold_since = Some(clock.utc());

    save(db, clock, lead).await
}

#[tracing::instrument(skip(db, clock))]
pub async fn restore_cold_lead(
    db: &dyn Database,
    clock: &dyn Clock,
    lead_id: LeadId,
    contractor_id: &ContractorId,
) -> Result<Lead, Error> {
    let (mut lead, _) = authorize_lead(db, lead_id, contractor_id).await?;

    if !lead.is_cold_lead {
        return Err(Error::LeadIsNotCold { lead_id });
    }

    lead.is_cold_lead = false;
    lead.cold_since = None;

    save(db, clock, lead).await
}

/// Records the dashboard's contact tracking state in a single write.
#[tracing::instrument(skip(db, clock))]
pub async fn record_contact_attempt(
    db: &dyn Database,
    clock: &dyn Clock,
    lead_id: LeadId,
    contractor_id: &ContractorId,
    attempt: ContactAttempt,
) -> Result<Lead, Error> {
    if attempt.contact_attempt < 0 {
        return Err(Error::invalid_field(
            "contact_attempt",
            "a non-negative number of attempts",
        ));
    }
    let tentative_date = parse_date_patch("tentative_date", attempt.tentative_date)?;

    let (mut lead, _) = authorize_lead(db, lead_id, contractor_id).await?;

    match (lead.is_cold_lead, attempt.is_cold_lead) {
        (false, true) => {
            if lead.job_status.is_terminal() {
                return Err(Error::LeadIsCompleted { lead_id });
            }
            lead.cold_since = Some(clock.utc());
        }
        (true, false) => lead.cold_since = None,
        _ => {}
    }

    lead.is_cold_lead = attempt.is_cold_lead;
    lead.contact_attempt = attempt.contact_attempt;
    if let Some(date) = tentative_date {
        lead.tentative_date = date;
    }
    if let Some(inspector) = attempt.inspector {
        lead.inspector = optional_text(Some(inspector));
    }
    if let Some(internal_notes) = attempt.internal_notes {
        lead.internal_notes = optional_text(Some(internal_notes));
    }

    save(db, clock, lead).await
}

async fn save(db: &dyn Database, clock: &dyn Clock, mut lead: Lead) -> Result<Lead, Error> {
    let expected_modified_at = lead.modified_at;
    lead.modified_at = clock.utc();

    db.leads().replace_lead(&lead, expected_modified_at).await?;

    Ok(lead)
}
