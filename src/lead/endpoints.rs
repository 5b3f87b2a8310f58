use std::sync::Arc;

use actix_web::error::JsonPayloadError;
use actix_web::web::{Bytes, Data, Json, Path, Query};
use actix_web::{delete, get, patch, post, put};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::contractor::AuthenticatedContractor;
use crate::database::Database;
use crate::error::Error;
use crate::geocode::GeocodeCache;
use crate::notify::Notifier;
use crate::utils::explicit_null;

use super::dedup::DedupPolicy;
use super::manager::{self, ContactAttempt, JobUpdate, LeadSubmission, Promotion, StatusUpdate};
use super::map::{self, MapData};
use super::status::{self, MapStatus};
use super::{JobState, JobStatus, Lead, LeadId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeadBody {
    pub id: LeadId,
    pub campaign_id: CampaignId,
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub job_status: JobStatus,
    pub job: Option<JobBody>,
    pub status: MapStatus,
    pub scheduled_inspection_date: Option<DateTime<Utc>>,
    pub tentative_date: Option<DateTime<Utc>>,
    pub is_cold_lead: bool,
    pub cold_since: Option<DateTime<Utc>>,
    pub contact_attempt: i32,
    pub inspector: Option<String>,
    pub internal_notes: Option<String>,
    pub modified_at: DateTime<Utc>,
}

impl LeadBody {
    pub fn render(lead: Lead, now: DateTime<Utc>) -> LeadBody {
        LeadBody {
            status: status::classify(&lead, now),
            id: lead.id,
            campaign_id: lead.campaign_id,
            name: lead.name,
            address: lead.address,
            email: lead.email,
            phone: lead.phone,
            notes: lead.notes,
            submitted_at: lead.submitted_at,
            job_status: lead.job_status,
            job: lead.job.map(|job| JobBody {
                status: job.status,
                promoted_at: job.promoted_at,
            }),
            scheduled_inspection_date: lead.scheduled_inspection_date,
            tentative_date: lead.tentative_date,
            is_cold_lead: lead.is_cold_lead,
            cold_since: lead.cold_since,
            contact_attempt: lead.contact_attempt,
            inspector: lead.inspector,
            internal_notes: lead.internal_notes,
            modified_at: lead.modified_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobBody {
    pub status: JobState,
    pub promoted_at: DateTime<Utc>,
}

/// What the homeowner gets back. Contains nothing about the campaign owner.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeadReceiptBody {
    pub id: LeadId,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubmitLeadBody {
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateLeadStatusBody {
    #[serde(default)]
    pub job_status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PromoteLeadBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub scheduled_inspection_date: Option<String>,
    #[serde(default)]
    pub inspector: Option<String>,
    #[serde(default)]
    pub internal_notes: Option<String>,
}

impl PromoteLeadBody {
    /// An empty body promotes with every default. Anything else must be a
    /// valid body.
    pub fn parse(body: &[u8]) -> Result<PromoteLeadBody, Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(PromoteLeadBody::default());
        }

        serde_json::from_slice(body)
            .map_err(|err| Error::InvalidJson(JsonPayloadError::Deserialize(err)))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateJobBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub scheduled_inspection_date: Option<Option<String>>,
    #[serde(default)]
    pub inspector: Option<String>,
    #[serde(default)]
    pub internal_notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ContactAttemptBody {
    pub contact_attempt: i32,
    pub is_cold_lead: bool,
    #[serde(default, deserialize_with = "explicit_null")]
    pub tentative_date: Option<Option<String>>,
    #[serde(default)]
    pub inspector: Option<String>,
    #[serde(default)]
    pub internal_notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MapQuery {
    pub campaign_id: Option<CampaignId>,
}

#[post("/public/campaigns/{page_slug}/leads")]
#[tracing::instrument(skip(db, clock, policy, notifier, body))]
pub async fn submit_lead(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    policy: Data<DedupPolicy>,
    notifier: Data<Arc<dyn Notifier>>,
    params: Path<String>,
    body: Json<SubmitLeadBody>,
) -> Result<Json<LeadReceiptBody>, Error> {
    let page_slug = params.into_inner();
    let body = body.into_inner();

    let lead = manager::submit_lead(
        &***db,
        &***clock,
        &policy,
        notifier.get_ref().clone(),
        &page_slug,
        LeadSubmission {
            name: body.name,
            address: body.address,
            email: body.email,
            phone: body.phone,
            notes: body.notes,
        },
    )
    .await?;

    Ok(Json(LeadReceiptBody {
        id: lead.id,
        submitted_at: lead.submitted_at,
    }))
}

#[get("/campaigns/{campaign_id}/leads")]
#[tracing::instrument(skip(db, clock))]
pub async fn get_leads_in_campaign(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<CampaignId>,
) -> Result<Json<Vec<LeadBody>>, Error> {
    let campaign_id = params.into_inner();

    let leads = manager::get_leads_in_campaign(&***db, campaign_id, contractor.id()).await?;

    let now = clock.utc();
    let body = leads
        .into_iter()
        .map(|lead| LeadBody::render(lead, now))
        .collect();

    Ok(Json(body))
}

// registered ahead of /leads/{lead_id}
#[get("/leads/map")]
#[tracing::instrument(skip(db, cache, clock))]
pub async fn get_map_data(
    db: Data<Box<dyn Database>>,
    cache: Data<GeocodeCache>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    query: Query<MapQuery>,
) -> Result<Json<MapData>, Error> {
    let query = query.into_inner();

    let data = map::get_map_data(
        &***db,
        &cache,
        &***clock,
        contractor.id(),
        query.campaign_id,
    )
    .await?;

    Ok(Json(data))
}

#[get("/leads/{lead_id}")]
#[tracing::instrument(skip(db, clock))]
pub async fn get_lead_by_id(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<LeadId>,
) -> Result<Json<LeadBody>, Error> {
    let lead_id = params.into_inner();

    let lead = manager::get_lead(&***db, lead_id, contractor.id()).await?;

    Ok(Json(LeadBody::render(lead, clock.utc())))
}

#[patch("/leads/{lead_id}/status")]
#[tracing::instrument(skip(db, clock))]
pub async fn update_lead_status(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<LeadId>,
    body: Json<UpdateLeadStatusBody>,
) -> Result<Json<LeadBody>, Error> {
    let lead_id = params.into_inner();
    let body = body.into_inner();

    let lead = manager::update_lead_status(
        &***db,
        &***clock,
        lead_id,
        contractor.id(),
        StatusUpdate {
            job_status: body.job_status,
            notes: body.notes,
        },
    )
    .await?;

    Ok(Json(LeadBody::render(lead, clock.utc())))
}

#[post("/leads/{lead_id}/job")]
#[tracing::instrument(skip(db, clock, body))]
pub async fn promote_lead_to_job(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<LeadId>,
    body: Bytes,
) -> Result<Json<LeadBody>, Error> {
    let lead_id = params.into_inner();
    let body = PromoteLeadBody::parse(&body)?;

    let lead = manager::promote_lead_to_job(
        &***db,
        &***clock,
        lead_id,
        contractor.id(),
        Promotion {
            status: body.status,
            scheduled_inspection_date: body.scheduled_inspection_date,
            inspector: body.inspector,
            internal_notes: body.internal_notes,
        },
    )
    .await?;

    Ok(Json(LeadBody::render(lead, clock.utc())))
}

#[patch("/leads/{lead_id}/job")]
#[tracing::instrument(skip(db, clock))]
pub async fn update_job(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<LeadId>,
    body: Json<UpdateJobBody>,
) -> Result<Json<LeadBody>, Error> {
    let lead_id = params.into_inner();
    let body = body.into_inner();

    let lead = manager::update_job(
        &***db,
        &***clock,
        lead_id,
        contractor.id(),
        JobUpdate {
            status: body.status,
            scheduled_inspection_date: body.scheduled_inspection_date,
            inspector: body.inspector,
            internal_notes: body.internal_notes,
        },
    )
    .await?;

    Ok(Json(LeadBody::render(lead, clock.utc())))
}

#[delete("/leads/{lead_id}/job")]
#[tracing::instrument(skip(db, clock))]
pub async fn unschedule_job(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<LeadId>,
) -> Result<Json<LeadBody>, Error> {
    let lead_id = params.into_inner();

    let lead = manager::unschedule_job(&***db, &***clock, lead_id, contractor.id()).await?;

    Ok(Json(LeadBody::render(lead, clock.utc())))
}

#[post("/leads/{lead_id}/cold")]
#[tracing::instrument(skip(db, clock))]
pub async fn mark_job_as_cold(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<LeadId>,
) -> Result<Json<LeadBody>, Error> {
    let lead_id = params.into_inner();

    let lead = manager::mark_job_as_cold(&***db, &***clock, lead_id, contractor.id()).await?;

    Ok(Json(LeadBody::render(lead, clock.utc())))
}

#[delete("/leads/{lead_id}/cold")]
#[tracing::instrument(skip(db, clock))]
pub async fn restore_cold_lead(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<LeadId>,
) -> Result<Json<LeadBody>, Error> {
    let lead_id = params.into_inner();

    let lead = manager::restore_cold_lead(&***db, &***clock, lead_id, contractor.id()).await?;

    Ok(Json(LeadBody::render(lead, clock.utc())))
}

#[put("/leads/{lead_id}/contact-attempt")]
#[tracing::instrument(skip(db, clock))]
pub async fn record_contact_attempt(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<LeadId>,
    body: Json<ContactAttemptBody>,
) -> Result<Json<LeadBody>, Error> {
    let lead_id = params.into_inner();
    let body = body.into_inner();

    let lead = manager::record_contact_attempt(
        &***db,
        &***clock,
        lead_id,
        contractor.id(),
        ContactAttempt {
            contact_attempt: body.contact_attempt,
            is_cold_lead: body.is_cold_lead,
            tentative_date: body.tentative_date,
            inspector: body.inspector,
            internal_notes: body.internal_notes,
        },
    )
    .await?;

    Ok(Json(LeadBody::render(lead, clock.utc())))
}
