use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson;
use mongodb::options::{FindOneOptions, FindOptions};

use crate::campaign::CampaignId;
use crate::database::MongoLeadStore;
use crate::error::Error;

use super::{CachedLocation, Lead, LeadId};

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn insert_lead(&self, lead: &Lead) -> Result<(), Error>;

    async fn fetch_lead_by_id(&self, lead_id: LeadId) -> Result<Option<Lead>, Error>;

    /// Newest submissions first.
    async fn fetch_leads_by_campaigns(
        &self,
        campaign_ids: &[CampaignId],
    ) -> Result<Vec<Lead>, Error>;

    /// Whether the campaign received a submission from `email` at or after
    /// `since`. `email` must already be normalized.
    async fn exists_lead_since(
        &self,
        campaign_id: CampaignId,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, Error>;

    /// Writes the whole lead back, provided nobody modified it since
    /// `expected_modified_at`.
    async fn replace_lead(
        &self,
        lead: &Lead,
        expected_modified_at: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Overwrites the cached location only. Not a lead modification, so
    /// `modified_at` is left alone.
    async fn update_lead_location(
        &self,
        lead_id: LeadId,
        location: &CachedLocation,
    ) -> Result<(), Error>;
}

#[async_trait]
impl LeadStore for MongoLeadStore {
    #[tracing::instrument(skip(self))]
    async fn insert_lead(&self, lead: &Lead) -> Result<(), Error> {
        self.insert_one(lead, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_lead_by_id(&self, lead_id: LeadId) -> Result<Option<Lead>, Error> {
        let lead = self.find_one(bson::doc! { "_id": lead_id }, None).await?;

        Ok(lead)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_leads_by_campaigns(
        &self,
        campaign_ids: &[CampaignId],
    ) -> Result<Vec<Lead>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "submitted_at": -1 })
            .build();
        let campaign_ids: Vec<bson::Bson> = campaign_ids.iter().copied().map(Into::into).collect();

        let leads: Vec<Lead> = self
            .find(
                bson::doc! { "campaign_id": { "$in": campaign_ids } },
                options,
            )
            .await?
            .try_collect()
            .await?;

        Ok(leads)
    }

    #[tracing::instrument(skip(self))]
    async fn exists_lead_since(
        &self,
        campaign_id: CampaignId,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let options = FindOneOptions::builder()
            .projection(bson::doc! { "_id": 1 })
            .build();
        let since = bson::DateTime::from_chrono(since);

        let existing = self
            .clone_with_type::<bson::Document>()
            .find_one(
                bson::doc! {
                    "campaign_id": campaign_id,
                    "email": email,
                    "submitted_at": { "$gte": since },
                },
                options,
            )
            .await?;

        Ok(existing.is_some())
    }

    #[tracing::instrument(skip(self))]
    async fn replace_lead(
        &self,
        lead: &Lead,
        expected_modified_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let old_modified_at = bson::DateTime::from_chrono(expected_modified_at);

        let result = self
            .replace_one(
                bson::doc! { "_id": lead.id, "modified_at": old_modified_at },
                lead,
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(Error::ConcurrentModificationDetected);
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn update_lead_location(
        &self,
        lead_id: LeadId,
        location: &CachedLocation,
    ) -> Result<(), Error> {
        let new_location = bson::to_document(location)?;

        self.update_one(
            bson::doc! { "_id": lead_id },
            bson::doc! { "$set": { "location": new_location } },
            None,
        )
        .await?;

        Ok(())
    }
}
