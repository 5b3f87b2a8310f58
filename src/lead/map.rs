use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

use crate::campaign::manager::{authorize_campaign, get_campaigns};
use crate::campaign::CampaignId;
use crate::contractor::ContractorId;
use crate::database::Database;
use crate::error::Error;
use crate::geocode::{GeocodeCache, Location};

use super::status::{self, MapStatus};
use super::{JobStatus, LeadId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapLead {
    pub id: LeadId,
    pub name: String,
    pub location: Option<Location>,
    pub status: MapStatus,
    pub submitted_at: DateTime<Utc>,
    pub job_status: JobStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub leads: Vec<MapLead>,
    pub total_leads: usize,
    pub mapped_leads: usize,
    pub leads_without_address: usize,
    pub leads_with_failed_geocode: usize,
}

/// Map pins for the contractor's leads, either across all campaigns or for
/// one of them. Locations come through the geocode cache; leads that cannot
/// be placed are still listed, without a location.
#[tracing::instrument(skip(db, cache, clock))]
pub async fn get_map_data(
    db: &dyn Database,
    cache: &GeocodeCache,
    clock: &dyn Clock,
    contractor_id: &ContractorId,
    campaign_id: Option<CampaignId>,
) -> Result<MapData, Error> {
    let campaign_ids: Vec<CampaignId> = match campaign_id {
        Some(campaign_id) => vec![authorize_campaign(db, campaign_id, contractor_id).await?.id],
        None => get_campaigns(db, contractor_id)
            .await?
            .into_iter()
            .map(|campaign| campaign.id)
            .collect(),
    };

    let leads = if campaign_ids.is_empty() {
        vec![]
    } else {
        db.leads().fetch_leads_by_campaigns(&campaign_ids).await?
    };

    let locations = cache.resolve_many(db, clock, &leads).await;
    let now = clock.utc();

    let mut data = MapData {
        leads: Vec::with_capacity(leads.len()),
        total_leads: leads.len(),
        mapped_leads: 0,
        leads_without_address: 0,
        leads_with_failed_geocode: 0,
    };

    for (lead, location) in leads.into_iter().zip(locations) {
        match (lead.has_address(), location) {
            (_, Some(_)) => data.mapped_leads += 1,
            (false, None) => data.leads_without_address += 1,
            (true, None) => data.leads_with_failed_geocode += 1,
        }

        data.leads.push(MapLead {
            id: lead.id,
            status: status::classify(&lead, now),
            name: lead.name,
            location,
            submitted_at: lead.submitted_at,
            job_status: lead.job_status,
        });
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Duration as TimeDelta;

    use super::*;
    use crate::campaign::manager::tests::{campaign_with_slug, contractor};
    use crate::database::test::MockDatabase;
    use crate::geocode::GeocodeLimits;
    use crate::lead::manager::tests::lead_in;
    use crate::lead::CachedLocation;
    use crate::test_support::{FakeGeocoder, MutableClock};

    fn cache(geocoder: Arc<FakeGeocoder>) -> GeocodeCache {
        GeocodeCache::new(
            geocoder,
            GeocodeLimits {
                max_concurrent: 4,
                request_spacing: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn counts_mapped_unaddressed_and_failed_leads() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let campaign = campaign_with_slug("elm");
        db.campaigns.put(campaign.clone());

        let mut cached = lead_in(campaign.id);
        cached.location = Some(CachedLocation {
            lat: 1.0,
            lng: 2.0,
            address: cached.address.clone(),
            geocoded_at: clock.utc(),
        });
        let mut unaddressed = lead_in(campaign.id);
        unaddressed.address = String::new();
        let mut stale = lead_in(campaign.id);
        stale.address = "456 Oak Ave".into();
        stale.submitted_at -= TimeDelta::days(2);
        for lead in [&cached, &unaddressed, &stale] {
            db.leads.put(lead.clone());
        }

        let data = get_map_data(
            &db,
            &cache(Arc::new(FakeGeocoder::no_match())),
            &clock,
            &contractor(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(data.total_leads, 3);
        assert_eq!(data.mapped_leads, 1);
        assert_eq!(data.leads_without_address, 1);
        assert_eq!(data.leads_with_failed_geocode, 1);

        let pin = data.leads.iter().find(|pin| pin.id == cached.id).unwrap();
        assert_eq!(pin.location, Some(Location { lat: 1.0, lng: 2.0 }));
        let pin = data.leads.iter().find(|pin| pin.id == stale.id).unwrap();
        assert_eq!(pin.location, None);
        assert_eq!(pin.status, MapStatus::Uncontacted);
    }

    #[tokio::test]
    async fn other_contractors_leads_are_not_shown() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let mine = campaign_with_slug("elm");
        let mut theirs = campaign_with_slug("oak");
        theirs.contractor_id = ContractorId::new("someone-else");
        db.campaigns.put(mine.clone());
        db.campaigns.put(theirs.clone());
        db.leads.put(lead_in(mine.id));
        db.leads.put(lead_in(theirs.id));
        let geocoder = Arc::new(FakeGeocoder::resolving(3.0, 4.0));

        let data = get_map_data(&db, &cache(geocoder.clone()), &clock, &contractor(), None)
            .await
            .unwrap();
        assert_eq!(data.total_leads, 1);
        assert_eq!(data.mapped_leads, 1);

        let foreign = get_map_data(
            &db,
            &cache(geocoder),
            &clock,
            &contractor(),
            Some(theirs.id),
        )
        .await;
        assert_eq!(
            foreign.unwrap_err(),
            Error::CampaignNotFound {
                campaign_id: theirs.id
            }
        );
    }
}
