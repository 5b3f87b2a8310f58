use mockable::Clock;

use crate::contractor::ContractorId;
use crate::database::Database;
use crate::error::Error;

use super::{slug, Campaign, CampaignId, CampaignStatus, ServiceRadius};

/// How many times creation re-allocates a slug that another creation claimed
/// between the probe and the insert.
const MAX_SLUG_ALLOCATIONS: usize = 3;

#[derive(Clone, Debug, Default)]
pub struct CampaignSettings {
    pub name: Option<String>,
    pub status: Option<CampaignStatus>,
    pub service_radius: Option<ServiceRadius>,
}

#[tracing::instrument(skip(db, clock))]
pub async fn create_campaign(
    db: &dyn Database,
    clock: &dyn Clock,
    contractor_id: &ContractorId,
    name: String,
    service_radius: Option<ServiceRadius>,
) -> Result<Campaign, Error> {
    let name = validate_name(name)?;

    let mut attempt = 1;
    loop {
        let page_slug = slug::allocate(db, &name).await?;

        let now = clock.utc();
        let campaign = Campaign {
            id: CampaignId::new(),
            contractor_id: contractor_id.clone(),
            name: name.clone(),
            page_slug,
            status: CampaignStatus::Active,
            service_radius: service_radius.unwrap_or_default(),
            qr_code: None,
            created_at: now,
            modified_at: now,
        };

        match db.campaigns().insert_campaign(&campaign).await {
            Ok(()) => return Ok(campaign),
            Err(Error::SlugAlreadyTaken { page_slug }) if attempt < MAX_SLUG_ALLOCATIONS => {
                tracing::info!(%page_slug, attempt, "page slug claimed concurrently, allocating again");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[tracing::instrument(skip(db))]
pub async fn get_campaigns(
    db: &dyn Database,
    contractor_id: &ContractorId,
) -> Result<Vec<Campaign>, Error> {
    let campaigns = db
        .campaigns()
        .fetch_campaigns_by_contractor(contractor_id)
        .await?;

    Ok(campaigns)
}

/// Fetches a campaign on behalf of a contractor. A campaign owned by someone
/// else is reported exactly like a missing one.
#[tracing::instrument(skip(db))]
pub async fn authorize_campaign(
    db: &dyn Database,
    campaign_id: CampaignId,
    contractor_id: &ContractorId,
) -> Result<Campaign, Error> {
    let campaign = db
        .campaigns()
        .fetch_campaign_by_id(campaign_id)
        .await?
        .filter(|campaign| campaign.contractor_id == *contractor_id)
        .ok_or(Error::CampaignNotFound { campaign_id })?;

    Ok(campaign)
}

/// Looks up the campaign behind a public landing page. Inactive campaigns
/// have no public page.
#[tracing::instrument(skip(db))]
pub async fn get_public_campaign(db: &dyn Database, page_slug: &str) -> Result<Campaign, Error> {
    let campaign = db
        .campaigns()
        .fetch_campaign_by_slug(page_slug)
        .await?
        .filter(Campaign::is_active)
        .ok_or_else(|| Error::PageNotFound {
            page_slug: page_slug.to_string(),
        })?;

    Ok(campaign)
}

#[tracing::instrument(skip(db, clock))]
pub async fn update_campaign_settings(
    db: &dyn Database,
    clock: &dyn Clock,
    campaign_id: CampaignId,
    contractor_id: &ContractorId,
    settings: CampaignSettings,
) -> Result<Campaign, Error> {
    let name = settings.name.map(validate_name).transpose()?;

    let mut campaign = authorize_campaign(db, campaign_id, contractor_id).await?;

    if let Some(name) = name {
        campaign.name = name;
    }
    if let Some(status) = settings.status {
        campaign.status = status;
    }
    if let Some(service_radius) = settings.service_radius {
        campaign.service_radius = service_radius;
    }

    save(db, clock, campaign).await
}

#[tracing::instrument(skip(db, clock))]
pub async fn set_qr_code(
    db: &dyn Database,
    clock: &dyn Clock,
    campaign_id: CampaignId,
    contractor_id: &ContractorId,
    qr_code: String,
) -> Result<Campaign, Error> {
    let qr_code = qr_code.trim();
    if qr_code.is_empty() {
        return Err(Error::invalid_field("qr_code", "a non-empty reference"));
    }

    let mut campaign = authorize_campaign(db, campaign_id, contractor_id).await?;
    campaign.qr_code = Some(qr_code.to_string());

    save(db, clock, campaign).await
}

async fn save(db: &dyn Database, clock: &dyn Clock, mut campaign: Campaign) -> Result<Campaign, Error> {
    let expected_modified_at = campaign.modified_at;
    campaign.modified_at = clock.utc();

    db.campaigns()
        .replace_campaign(&campaign, expected_modified_at)
        .await?;

    Ok(campaign)
}

fn validate_name(name: String) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid_field("name", "a non-empty campaign name"));
    }

    Ok(name.to_string())
}
