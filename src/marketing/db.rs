use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::options::FindOneOptions;

use crate::database::MongoMarketingLeadStore;
use crate::error::Error;

use super::MarketingLead;

#[async_trait]
pub trait MarketingLeadStore: Send + Sync {
    async fn insert_marketing_lead(&self, lead: &MarketingLead) -> Result<(), Error>;

    /// Whether `email` (already normalized) submitted at or after `since`.
    async fn exists_marketing_lead_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, Error>;
}

#[async_trait]
impl MarketingLeadStore for MongoMarketingLeadStore {
    #[tracing::instrument(skip(self))]
    async fn insert_marketing_lead(&self, lead: &MarketingLead) -> Result<(), Error> {
        self.insert_one(lead, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn exists_marketing_lead_since(
        &self,
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
                bson::doc! { "email": email, "submitted_at": { "$gte": since } },
                options,
            )
            .await?;

        Ok(existing.is_some())
    }
}
