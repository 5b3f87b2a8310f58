//! Lazily populated per-lead location cache.
//!
//! A lead's cached location is reused only while it was computed for the
//! lead's current address string. Anything else goes to the provider, and a
//! successful lookup overwrites the cache. Failures are never cached.
//!
//! Every provider call in the process goes through one `GeocodeCache`, which
//! caps concurrent calls and holds each permit for a fixed spacing after the
//! call so bulk callers stay under provider rate limits.

use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use mockable::Clock;
use tokio::sync::Semaphore;

use crate::database::Database;
use crate::lead::{CachedLocation, Lead, LeadId};

use super::{GeocodeResult, Geocoder, Location};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GeocodeLimits {
    pub max_concurrent: usize,
    pub request_spacing: Duration,
}

impl Default for GeocodeLimits {
    fn default() -> GeocodeLimits {
        GeocodeLimits {
            max_concurrent: 4,
            request_spacing: Duration::from_millis(100),
        }
    }
}

pub struct GeocodeCache {
    geocoder: Arc<dyn Geocoder>,
    permits: Semaphore,
    max_concurrent: usize,
    request_spacing: Duration,
}

impl GeocodeCache {
    pub fn new(geocoder: Arc<dyn Geocoder>, limits: GeocodeLimits) -> GeocodeCache {
        let max_concurrent = limits.max_concurrent.max(1);
        GeocodeCache {
            geocoder,
            permits: Semaphore::new(max_concurrent),
            max_concurrent,
            request_spacing: limits.request_spacing,
        }
    }

    /// Resolves `address` for the lead, consulting and refreshing the lead's
    /// cached location. Returns `None` when the lead is missing or the
    /// address cannot be resolved.
    #[tracing::instrument(skip(self, db, clock))]
    pub async fn resolve(
        &self,
        db: &dyn Database,
        clock: &dyn Clock,
        lead_id: LeadId,
        address: &str,
    ) -> Option<Location> {
        let lead = match db.leads().fetch_lead_by_id(lead_id).await {
            Ok(Some(lead)) => lead,
            Ok(None) => {
                tracing::warn!(%lead_id, "cannot geocode a lead that does not exist");
                return None;
            }
            Err(err) => {
                tracing::warn!(%lead_id, error = %err, "failed to read cached location");
                return None;
            }
        };

        self.resolve_with(db, clock, lead_id, lead.location.as_ref(), address)
            .await
    }

    /// Same as `resolve` for a lead that was already loaded, using its
    /// current address.
    pub async fn resolve_lead(
        &self,
        db: &dyn Database,
        clock: &dyn Clock,
        lead: &Lead,
    ) -> Option<Location> {
        self.resolve_with(db, clock, lead.id, lead.location.as_ref(), &lead.address)
            .await
    }

    /// Resolves a batch of leads under the concurrency cap. Results are in
    /// input order.
    #[tracing::instrument(skip_all, fields(leads = leads.len()))]
    pub async fn resolve_many(
        &self,
        db: &dyn Database,
        clock: &dyn Clock,
        leads: &[Lead],
    ) -> Vec<Option<Location>> {
        stream::iter(leads)
            .map(|lead| self.resolve_lead(db, clock, lead))
            .buffered(self.max_concurrent)
            .collect()
            .await
    }

    async fn resolve_with(
        &self,
        db: &dyn Database,
        clock: &dyn Clock,
        lead_id: LeadId,
        cached: Option<&CachedLocation>,
        address: &str,
    ) -> Option<Location> {
        if let Some(cached) = cached.filter(|cached| cached.address == address) {
            return Some(Location {
                lat: cached.lat,
                lng: cached.lng,
            });
        }

        if address.trim().is_empty() {
            return None;
        }

        let result = self.lookup(address).await?;

        let location = CachedLocation {
            lat: result.lat,
            lng: result.lng,
            address: address.to_string(),
            geocoded_at: clock.utc(),
        };
        if let Err(err) = db.leads().update_lead_location(lead_id, &location).await {
            tracing::warn!(%lead_id, error = %err, "failed to cache geocoded location");
        }

        Some(result.location())
    }

    async fn lookup(&self, address: &str) -> Option<GeocodeResult> {
        let _permit = self.permits.acquire().await.ok()?;

        let result = self.geocoder.geocode(address).await;

        if !self.request_spacing.is_zero() {
            tokio::time::sleep(self.request_spacing).await;
        }

        match result {
            Ok(Some(result)) => Some(result),
            Ok(None) => {
                tracing::info!(address, "geocoding provider found no match");
                None
            }
            Err(err) => {
                tracing::warn!(address, error = %err, "geocoding failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignId;
    use crate::database::test::MockDatabase;
    use crate::lead::manager::tests::{lead_in, now};
    use crate::test_support::{FakeGeocoder, MutableClock};

    fn cache(geocoder: Arc<FakeGeocoder>) -> GeocodeCache {
        GeocodeCache::new(
            geocoder,
            GeocodeLimits {
                max_concurrent: 2,
                request_spacing: Duration::ZERO,
            },
        )
    }

    fn cached_lead(address: &str) -> Lead {
        let mut lead = lead_in(CampaignId::new());
        lead.location = Some(CachedLocation {
            lat: 1.0,
            lng: 2.0,
            address: "123 Main St".into(),
            geocoded_at: now(),
        });
        lead.address = address.into();
        lead
    }

    #[tokio::test]
    async fn matching_address_is_served_from_cache() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let geocoder = Arc::new(FakeGeocoder::resolving(9.0, 9.0));
        let lead = cached_lead("123 Main St");
        db.leads.put(lead.clone());

        let location = cache(geocoder.clone())
            .resolve(&db, &clock, lead.id, "123 Main St")
            .await;

        assert_eq!(location, Some(Location { lat: 1.0, lng: 2.0 }));
        assert_eq!(geocoder.calls(), 0);
        assert_eq!(db.leads.writes(), 0);
    }

    #[tokio::test]
    async fn changed_address_invalidates_cache() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let geocoder = Arc::new(FakeGeocoder::resolving(3.0, 4.0));
        let lead = cached_lead("456 Oak Ave");
        db.leads.put(lead.clone());

        let location = cache(geocoder.clone())
            .resolve(&db, &clock, lead.id, "456 Oak Ave")
            .await;

        assert_eq!(location, Some(Location { lat: 3.0, lng: 4.0 }));
        assert_eq!(geocoder.calls(), 1);
        assert_eq!(geocoder.addresses(), vec!["456 Oak Ave".to_string()]);

        let stored = db.leads.get(lead.id).unwrap().location.unwrap();
        assert_eq!(stored.address, "456 Oak Ave");
        assert_eq!(stored.geocoded_at, clock.utc());
        assert_eq!((stored.lat, stored.lng), (3.0, 4.0));
    }

    #[tokio::test]
    async fn failure_leaves_cache_untouched() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let lead = cached_lead("456 Oak Ave");
        db.leads.put(lead.clone());

        for geocoder in [FakeGeocoder::no_match(), FakeGeocoder::failing()] {
            let geocoder = Arc::new(geocoder);

            let location = cache(geocoder.clone())
                .resolve(&db, &clock, lead.id, "456 Oak Ave")
                .await;

            assert_eq!(location, None);
            assert_eq!(geocoder.calls(), 1);
        }

        assert_eq!(db.leads.get(lead.id).unwrap().location, lead.location);
        assert_eq!(db.leads.writes(), 0);
    }

    #[tokio::test]
    async fn blank_address_is_never_sent() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let geocoder = Arc::new(FakeGeocoder::resolving(3.0, 4.0));
        let mut lead = lead_in(CampaignId::new());
        lead.address = "   ".into();
        db.leads.put(lead.clone());

        let location = cache(geocoder.clone()).resolve_lead(&db, &clock, &lead).await;

        assert_eq!(location, None);
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn missing_lead_resolves_to_nothing() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let geocoder = Arc::new(FakeGeocoder::resolving(3.0, 4.0));

        let location = cache(geocoder.clone())
            .resolve(&db, &clock, LeadId::new(), "123 Main St")
            .await;

        assert_eq!(location, None);
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn batch_keeps_input_order_and_respects_cap() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let geocoder = Arc::new(FakeGeocoder::resolving(3.0, 4.0));

        let mut leads = vec![cached_lead("123 Main St")];
        let mut blank = lead_in(CampaignId::new());
        blank.address = String::new();
        leads.push(blank);
        for n in 0..5 {
            let mut lead = lead_in(CampaignId::new());
            lead.address = format!("{n} Elm St");
            leads.push(lead);
        }
        for lead in &leads {
            db.leads.put(lead.clone());
        }

        let locations = cache(geocoder.clone())
            .resolve_many(&db, &clock, &leads)
            .await;

        assert_eq!(locations.len(), 7);
        assert_eq!(locations[0], Some(Location { lat: 1.0, lng: 2.0 }));
        assert_eq!(locations[1], None);
        assert!(locations[2..].iter().all(|l| *l == Some(Location { lat: 3.0, lng: 4.0 })));
        assert_eq!(geocoder.calls(), 5);
        assert!(geocoder.max_in_flight() <= 2);
    }
}
