use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson;
use mongodb::options::FindOptions;

use crate::contractor::ContractorId;
use crate::database::{is_duplicate_key, MongoCampaignStore};
use crate::error::Error;

use super::{Campaign, CampaignId};

#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Fails with `SlugAlreadyTaken` when another campaign already holds the
    /// page slug.
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error>;

    async fn fetch_campaign_by_id(&self, campaign_id: CampaignId)
        -> Result<Option<Campaign>, Error>;

    async fn fetch_campaign_by_slug(&self, page_slug: &str) -> Result<Option<Campaign>, Error>;

    async fn fetch_campaigns_by_contractor(
        &self,
        contractor_id: &ContractorId,
    ) -> Result<Vec<Campaign>, Error>;

    /// Writes the whole campaign back, provided nobody modified it since
    /// `expected_modified_at`.
    async fn replace_campaign(
        &self,
        campaign: &Campaign,
        expected_modified_at: DateTime<Utc>,
    ) -> Result<(), Error>;
}

#[async_trait]
impl CampaignStore for MongoCampaignStore {
    #[tracing::instrument(skip(self))]
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        match self.insert_one(campaign, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(Error::SlugAlreadyTaken {
                page_slug: campaign.page_slug.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaign_by_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, Error> {
        let campaign = self
            .find_one(bson::doc! { "_id": campaign_id }, None)
            .await?;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaign_by_slug(&self, page_slug: &str) -> Result<Option<Campaign>, Error> {
        let campaign = self
            .find_one(bson::doc! { "page_slug": page_slug }, None)
            .await?;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaigns_by_contractor(
        &self,
        contractor_id: &ContractorId,
    ) -> Result<Vec<Campaign>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let campaigns: Vec<Campaign> = self
            .find(
                bson::doc! { "contractor_id": contractor_id.as_str() },
                options,
            )
            .await?
            .try_collect()
            .await?;

        Ok(campaigns)
    }

    #[tracing::instrument(skip(self))]
    async fn replace_campaign(
        &self,
        campaign: &Campaign,
        expected_modified_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let old_modified_at = bson::DateTime::from_chrono(expected_modified_at);

        let result = self
            .replace_one(
                bson::doc! { "_id": campaign.id, "modified_at": old_modified_at },
                campaign,
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(Error::ConcurrentModificationDetected);
        }

        Ok(())
    }
}
