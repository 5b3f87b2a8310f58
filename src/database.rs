use async_trait::async_trait;
use mongodb::bson;
use mongodb::error::{Error as DatabaseError, ErrorKind, WriteFailure};
use mongodb::{Collection, Database as MongoDb};

use crate::campaign::db::CampaignStore;
use crate::campaign::Campaign;
use crate::error::Error;
use crate::lead::db::LeadStore;
use crate::lead::Lead;
use crate::marketing::db::MarketingLeadStore;
use crate::marketing::MarketingLead;

pub type MongoCampaignStore = Collection<Campaign>;
pub type MongoLeadStore = Collection<Lead>;
pub type MongoMarketingLeadStore = Collection<MarketingLead>;

const CAMPAIGNS: &str = "campaigns";
const LEADS: &str = "leads";
const MARKETING_LEADS: &str = "marketing_leads";

const DUPLICATE_KEY: i32 = 11000;

#[async_trait]
pub trait Database: Send + Sync {
    fn campaigns(&self) -> &dyn CampaignStore;

    fn leads(&self) -> &dyn LeadStore;

    fn marketing_leads(&self) -> &dyn MarketingLeadStore;

    async fn drop(&self) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
pub struct MongoDatabase {
    campaigns: MongoCampaignStore,
    leads: MongoLeadStore,
    marketing_leads: MongoMarketingLeadStore,
    db: MongoDb,
}

impl MongoDatabase {
    pub fn new(db: MongoDb) -> MongoDatabase {
        MongoDatabase {
            campaigns: db.collection(CAMPAIGNS),
            leads: db.collection(LEADS),
            marketing_leads: db.collection(MARKETING_LEADS),
            db,
        }
    }

    /// Connects the collections and makes sure the indexes the stores rely on
    /// exist. The unique `page_slug` index is what makes concurrent slug
    /// allocation safe.
    #[tracing::instrument(skip(db))]
    pub async fn initialize(db: MongoDb) -> Result<MongoDatabase, Error> {
        db.run_command(bson::doc! { "ping": 1 }, None).await?;

        db.run_command(
            bson::doc! {
                "createIndexes": CAMPAIGNS,
                "indexes": [
                    { "key": { "page_slug": 1 }, "name": "by_page_slug", "unique": true },
                    { "key": { "contractor_id": 1, "created_at": -1 }, "name": "by_contractor_id" },
                ]
            },
            None,
        )
        .await?;

        db.run_command(
            bson::doc! {
                "createIndexes": LEADS,
                "indexes": [
                    { "key": { "campaign_id": 1, "email": 1, "submitted_at": -1 }, "name": "by_campaign_id_and_email" },
                    { "key": { "campaign_id": 1, "submitted_at": -1 }, "name": "by_campaign_id" },
                ]
            },
            None,
        )
        .await?;

        db.run_command(
            bson::doc! {
                "createIndexes": MARKETING_LEADS,
                "indexes": [
                    { "key": { "email": 1, "submitted_at": -1 }, "name": "by_email" },
                ]
            },
            None,
        )
        .await?;

        Ok(MongoDatabase::new(db))
    }
}

#[async_trait]
impl Database for MongoDatabase {
    fn campaigns(&self) -> &dyn CampaignStore {
        &self.campaigns
    }

    fn leads(&self) -> &dyn LeadStore {
        &self.leads
    }

    fn marketing_leads(&self) -> &dyn MarketingLeadStore {
        &self.marketing_leads
    }

    async fn drop(&self) -> Result<(), Error> {
        self.db.drop(None).await?;
        Ok(())
    }
}

pub fn is_duplicate_key(error: &DatabaseError) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        _ => false,
    }
}

/// In-memory stores for exercising managers and endpoints without MongoDB.
/// They honor the same contracts as the mongo stores, including the unique
/// page slug and optimistic `modified_at` checks, and record every call.
#[cfg(any(test, feature = "test-support"))]
pub mod test {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use chrono::{DateTime, Utc};

    use crate::campaign::CampaignId;
    use crate::contractor::ContractorId;
    use crate::lead::{CachedLocation, LeadId};

    use super::*;

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[derive(Default)]
    struct CallLog(Mutex<Vec<&'static str>>);

    impl CallLog {
        fn record(&self, call: &'static str) {
            lock(&self.0).push(call);
        }

        fn count(&self, call: &'static str) -> usize {
            lock(&self.0).iter().filter(|c| **c == call).count()
        }

        fn count_writes(&self) -> usize {
            lock(&self.0)
                .iter()
                .filter(|c| {
                    c.starts_with("insert") || c.starts_with("replace") || c.starts_with("update")
                })
                .count()
        }
    }

    #[derive(Default)]
    pub struct MockDatabase {
        pub campaigns: MockCampaignStore,
        pub leads: MockLeadStore,
        pub marketing_leads: MockMarketingLeadStore,
    }

    impl MockDatabase {
        pub fn new() -> MockDatabase {
            MockDatabase::default()
        }
    }

    #[async_trait]
    impl Database for MockDatabase {
        fn campaigns(&self) -> &dyn CampaignStore {
            &self.campaigns
        }

        fn leads(&self) -> &dyn LeadStore {
            &self.leads
        }

        fn marketing_leads(&self) -> &dyn MarketingLeadStore {
            &self.marketing_leads
        }

        async fn drop(&self) -> Result<(), Error> {
            lock(&self.campaigns.documents).clear();
            lock(&self.leads.documents).clear();
            lock(&self.marketing_leads.documents).clear();
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockCampaignStore {
        documents: Mutex<Vec<Campaign>>,
        calls: CallLog,
        blind_slug_probes: Mutex<usize>,
    }

    impl MockCampaignStore {
        /// Makes the next `count` slug lookups report the slug as free, the
        /// way a probe does when another creation inserts right after it.
        pub fn miss_next_slug_probes(&self, count: usize) {
            *lock(&self.blind_slug_probes) = count;
        }

        pub fn put(&self, campaign: Campaign) {
            let mut documents = lock(&self.documents);
            documents.retain(|c| c.id != campaign.id);
            documents.push(campaign);
        }

        pub fn get(&self, campaign_id: CampaignId) -> Option<Campaign> {
            lock(&self.documents)
                .iter()
                .find(|c| c.id == campaign_id)
                .cloned()
        }

        pub fn all(&self) -> Vec<Campaign> {
            lock(&self.documents).clone()
        }

        pub fn calls(&self, call: &'static str) -> usize {
            self.calls.count(call)
        }

        pub fn writes(&self) -> usize {
            self.calls.count_writes()
        }
    }

    #[async_trait]
    impl CampaignStore for MockCampaignStore {
        async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
            self.calls.record("insert_campaign");
            let mut documents = lock(&self.documents);
            if documents.iter().any(|c| c.page_slug == campaign.page_slug) {
                return Err(Error::SlugAlreadyTaken {
                    page_slug: campaign.page_slug.clone(),
                });
            }
            documents.push(campaign.clone());
            Ok(())
        }

        async fn fetch_campaign_by_id(
            &self,
            campaign_id: CampaignId,
        ) -> Result<Option<Campaign>, Error> {
            self.calls.record("fetch_campaign_by_id");
            Ok(self.get(campaign_id))
        }

        async fn fetch_campaign_by_slug(
            &self,
            page_slug: &str,
        ) -> Result<Option<Campaign>, Error> {
            self.calls.record("fetch_campaign_by_slug");
            {
                let mut blind = lock(&self.blind_slug_probes);
                if *blind > 0 {
                    *blind -= 1;
                    return Ok(None);
                }
            }
            Ok(lock(&self.documents)
                .iter()
                .find(|c| c.page_slug == page_slug)
                .cloned())
        }

        async fn fetch_campaigns_by_contractor(
            &self,
            contractor_id: &ContractorId,
        ) -> Result<Vec<Campaign>, Error> {
            self.calls.record("fetch_campaigns_by_contractor");
            let mut campaigns: Vec<Campaign> = lock(&self.documents)
                .iter()
                .filter(|c| c.contractor_id == *contractor_id)
                .cloned()
                .collect();
            campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(campaigns)
        }

        async fn replace_campaign(
            &self,
            campaign: &Campaign,
            expected_modified_at: DateTime<Utc>,
        ) -> Result<(), Error> {
            self.calls.record("replace_campaign");
            let mut documents = lock(&self.documents);
            let existing = documents
                .iter_mut()
                .find(|c| c.id == campaign.id && c.modified_at == expected_modified_at)
                .ok_or(Error::ConcurrentModificationDetected)?;
            *existing = campaign.clone();
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockLeadStore {
        documents: Mutex<Vec<Lead>>,
        calls: CallLog,
    }

    impl MockLeadStore {
        pub fn put(&self, lead: Lead) {
            let mut documents = lock(&self.documents);
            documents.retain(|l| l.id != lead.id);
            documents.push(lead);
        }

        pub fn get(&self, lead_id: LeadId) -> Option<Lead> {
            lock(&self.documents)
                .iter()
                .find(|l| l.id == lead_id)
                .cloned()
        }

        pub fn all(&self) -> Vec<Lead> {
            lock(&self.documents).clone()
        }

        pub fn calls(&self, call: &'static str) -> usize {
            self.calls.count(call)
        }

        pub fn writes(&self) -> usize {
            self.calls.count_writes()
        }
    }

    #[async_trait]
    impl LeadStore for MockLeadStore {
        async fn insert_lead(&self, lead: &Lead) -> Result<(), Error> {
            self.calls.record("insert_lead");
            lock(&self.documents).push(lead.clone());
            Ok(())
        }

        async fn fetch_lead_by_id(&self, lead_id: LeadId) -> Result<Option<Lead>, Error> {
            self.calls.record("fetch_lead_by_id");
            Ok(self.get(lead_id))
        }

        async fn fetch_leads_by_campaigns(
            &self,
            campaign_ids: &[CampaignId],
        ) -> Result<Vec<Lead>, Error> {
            self.calls.record("fetch_leads_by_campaigns");
            let mut leads: Vec<Lead> = lock(&self.documents)
                .iter()
                .filter(|l| campaign_ids.contains(&l.campaign_id))
                .cloned()
                .collect();
            leads.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
            Ok(leads)
        }

        async fn exists_lead_since(
            &self,
            campaign_id: CampaignId,
            email: &str,
            since: DateTime<Utc>,
        ) -> Result<bool, Error> {
            self.calls.record("exists_lead_since");
            Ok(lock(&self.documents).iter().any(|l| {
                l.campaign_id == campaign_id && l.email == email && l.submitted_at >= since
            }))
        }

        async fn replace_lead(
            &self,
            lead: &Lead,
            expected_modified_at: DateTime<Utc>,
        ) -> Result<(), Error> {
            self.calls.record("replace_lead");
            let mut documents = lock(&self.documents);
            let existing = documents
                .iter_mut()
                .find(|l| l.id == lead.id && l.modified_at == expected_modified_at)
                .ok_or(Error::ConcurrentModificationDetected)?;
            *existing = lead.clone();
            Ok(())
        }

        async fn update_lead_location(
            &self,
            lead_id: LeadId,
            location: &CachedLocation,
        ) -> Result<(), Error> {
            self.calls.record("update_lead_location");
            let mut documents = lock(&self.documents);
            if let Some(existing) = documents.iter_mut().find(|l| l.id == lead_id) {
                existing.location = Some(location.clone());
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockMarketingLeadStore {
        documents: Mutex<Vec<MarketingLead>>,
        calls: CallLog,
    }

    impl MockMarketingLeadStore {
        pub fn put(&self, lead: MarketingLead) {
            lock(&self.documents).push(lead);
        }

        pub fn all(&self) -> Vec<MarketingLead> {
            lock(&self.documents).clone()
        }

        pub fn calls(&self, call: &'static str) -> usize {
            self.calls.count(call)
        }
    }

    #[async_trait]
    impl MarketingLeadStore for MockMarketingLeadStore {
        async fn insert_marketing_lead(&self, lead: &MarketingLead) -> Result<(), Error> {
            self.calls.record("insert_marketing_lead");
            lock(&self.documents).push(lead.clone());
            Ok(())
        }

        async fn exists_marketing_lead_since(
            &self,
            email: &str,
            since: DateTime<Utc>,
        ) -> Result<bool, Error> {
            self.calls.record("exists_marketing_lead_since");
            Ok(lock(&self.documents)
                .iter()
                .any(|l| l.email == email && l.submitted_at >= since))
        }
    }
}
