//! Test doubles for the clock, the geocoding provider and the notifier.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::campaign::{Campaign, CampaignId};
use crate::geocode::{GeocodeError, GeocodeResult, Geocoder};
use crate::lead::{Lead, LeadId};
use crate::marketing::{MarketingLead, MarketingLeadId};
use crate::notify::{Notifier, NotifyError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> MutableClock {
        MutableClock(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        *lock(&self.0) += delta;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.0) = now;
    }
}

impl Default for MutableClock {
    /// 2024-06-01 15:00 UTC
    fn default() -> MutableClock {
        MutableClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap())
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

enum FakeOutcome {
    Resolve { lat: f64, lng: f64 },
    NoMatch,
    Fail,
}

/// Geocoder answering every address the same way and recording what it
/// was asked.
pub struct FakeGeocoder {
    outcome: FakeOutcome,
    addresses: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGeocoder {
    fn with_outcome(outcome: FakeOutcome) -> FakeGeocoder {
        FakeGeocoder {
            outcome,
            addresses: Mutex::new(vec![]),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn resolving(lat: f64, lng: f64) -> FakeGeocoder {
        FakeGeocoder::with_outcome(FakeOutcome::Resolve { lat, lng })
    }

    pub fn no_match() -> FakeGeocoder {
        FakeGeocoder::with_outcome(FakeOutcome::NoMatch)
    }

    pub fn failing() -> FakeGeocoder {
        FakeGeocoder::with_outcome(FakeOutcome::Fail)
    }

    pub fn calls(&self) -> usize {
        lock(&self.addresses).len()
    }

    pub fn addresses(&self) -> Vec<String> {
        lock(&self.addresses).clone()
    }

    /// The most calls that were ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>, GeocodeError> {
        lock(&self.addresses).push(address.to_string());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.outcome {
            FakeOutcome::Resolve { lat, lng } => Ok(Some(GeocodeResult {
                lat,
                lng,
                formatted_address: address.to_string(),
            })),
            FakeOutcome::NoMatch => Ok(None),
            FakeOutcome::Fail => Err(GeocodeError::Provider {
                status: "UNKNOWN_ERROR".to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    LeadSubmitted {
        campaign_id: CampaignId,
        lead_id: LeadId,
    },
    MarketingLeadSubmitted {
        marketing_lead_id: MarketingLeadId,
    },
}

/// Forwards every notification attempt to a channel, optionally failing
/// each delivery afterwards.
pub struct RecordingNotifier {
    sender: UnboundedSender<Notification>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> (RecordingNotifier, UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            RecordingNotifier {
                sender,
                fail: false,
            },
            receiver,
        )
    }

    pub fn failing() -> (RecordingNotifier, UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (RecordingNotifier { sender, fail: true }, receiver)
    }

    fn record(&self, notification: Notification) -> Result<(), NotifyError> {
        // the receiving test may have finished already
        let _ = self.sender.send(notification);

        if self.fail {
            return Err(NotifyError("mail server unavailable".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn lead_submitted(&self, campaign: &Campaign, lead: &Lead) -> Result<(), NotifyError> {
        self.record(Notification::LeadSubmitted {
            campaign_id: campaign.id,
            lead_id: lead.id,
        })
    }

    async fn marketing_lead_submitted(&self, lead: &MarketingLead) -> Result<(), NotifyError> {
        self.record(Notification::MarketingLeadSubmitted {
            marketing_lead_id: lead.id,
        })
    }
}
