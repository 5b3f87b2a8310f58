use actix_web::web::{Data, Json, Path};
use actix_web::{get, patch, post, put};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

use crate::contractor::{AuthenticatedContractor, ContractorId};
use crate::database::Database;
use crate::error::Error;

use super::manager::{self, CampaignSettings};
use super::{Campaign, CampaignId, CampaignStatus, ServiceRadius};

#[derive(Clone, Debug, Deserialize)]
pub struct CreateCampaignBody {
    pub name: String,
    #[serde(default)]
    pub service_radius: Option<ServiceRadius>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateCampaignBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<CampaignStatus>,
    #[serde(default)]
    pub service_radius: Option<ServiceRadius>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SetQrCodeBody {
    pub qr_code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CampaignBody {
    pub id: CampaignId,
    pub contractor_id: ContractorId,
    pub name: String,
    pub page_slug: String,
    pub status: CampaignStatus,
    pub service_radius: ServiceRadius,
    pub service_radius_miles: u32,
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl CampaignBody {
    pub fn render(campaign: Campaign) -> CampaignBody {
        CampaignBody {
            id: campaign.id,
            contractor_id: campaign.contractor_id,
            name: campaign.name,
            page_slug: campaign.page_slug,
            status: campaign.status,
            service_radius: campaign.service_radius,
            service_radius_miles: campaign.service_radius.miles(),
            qr_code: campaign.qr_code,
            created_at: campaign.created_at,
            modified_at: campaign.modified_at,
        }
    }
}

/// What a landing page shows to the public.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicCampaignBody {
    pub name: String,
    pub page_slug: String,
    pub service_radius_miles: u32,
}

#[post("/campaigns")]
#[tracing::instrument(skip(db, clock))]
pub async fn create_campaign(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    body: Json<CreateCampaignBody>,
) -> Result<Json<CampaignBody>, Error> {
    let body = body.into_inner();

    let campaign = manager::create_campaign(
        &***db,
        &***clock,
        contractor.id(),
        body.name,
        body.service_radius,
    )
    .await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[get("/campaigns")]
#[tracing::instrument(skip(db))]
pub async fn get_campaigns(
    db: Data<Box<dyn Database>>,
    contractor: AuthenticatedContractor,
) -> Result<Json<Vec<CampaignBody>>, Error> {
    let campaigns = manager::get_campaigns(&***db, contractor.id()).await?;

    let body = campaigns.into_iter().map(CampaignBody::render).collect();

    Ok(Json(body))
}

#[get("/campaigns/{campaign_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_campaign_by_id(
    db: Data<Box<dyn Database>>,
    contractor: AuthenticatedContractor,
    params: Path<CampaignId>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();

    let campaign = manager::authorize_campaign(&***db, campaign_id, contractor.id()).await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[patch("/campaigns/{campaign_id}")]
#[tracing::instrument(skip(db, clock))]
pub async fn update_campaign(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<CampaignId>,
    body: Json<UpdateCampaignBody>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();
    let body = body.into_inner();

    let campaign = manager::update_campaign_settings(
        &***db,
        &***clock,
        campaign_id,
        contractor.id(),
        CampaignSettings {
            name: body.name,
            status: body.status,
            service_radius: body.service_radius,
        },
    )
    .await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[put("/campaigns/{campaign_id}/qr-code")]
#[tracing::instrument(skip(db, clock))]
pub async fn set_qr_code(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    contractor: AuthenticatedContractor,
    params: Path<CampaignId>,
    body: Json<SetQrCodeBody>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();
    let body = body.into_inner();

    let campaign = manager::set_qr_code(
        &***db,
        &***clock,
        campaign_id,
        contractor.id(),
        body.qr_code,
    )
    .await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[get("/public/campaigns/{page_slug}")]
#[tracing::instrument(skip(db))]
pub async fn get_public_campaign(
    db: Data<Box<dyn Database>>,
    params: Path<String>,
) -> Result<Json<PublicCampaignBody>, Error> {
    let page_slug = params.into_inner();

    let campaign = manager::get_public_campaign(&***db, &page_slug).await?;

    Ok(Json(PublicCampaignBody {
        name: campaign.name,
        page_slug: campaign.page_slug,
        service_radius_miles: campaign.service_radius.miles(),
    }))
}
