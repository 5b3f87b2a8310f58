use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::typedid::{TypedId, TypedIdMarker};
use crate::utils::optional_datetime;

pub mod dates;
pub mod db;
pub mod dedup;
pub mod endpoints;
pub mod manager;
pub mod map;
pub mod status;
pub use endpoints::*;

pub type LeadId = TypedId<Lead>;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Lead {
    #[serde(rename = "_id")]
    pub id: LeadId,
    pub campaign_id: CampaignId,
    pub name: String,
    pub address: String,
    // always stored normalized, see dedup::normalize_email
    pub email: String,
    pub phone: String,
    pub notes: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub submitted_at: DateTime<Utc>,
    pub job_status: JobStatus,
    #[serde(default)]
    pub job: Option<Job>,
    #[serde(default, with = "optional_datetime")]
    pub scheduled_inspection_date: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_datetime")]
    pub tentative_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_cold_lead: bool,
    #[serde(default, with = "optional_datetime")]
    pub cold_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contact_attempt: i32,
    #[serde(default)]
    pub inspector: Option<String>,
    #[serde(default)]
    pub internal_notes: Option<String>,
    #[serde(default)]
    pub location: Option<CachedLocation>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl Lead {
    /// The cached location, if it was computed for the lead's current
    /// address. A cache entry for any other address is stale.
    pub fn fresh_location(&self) -> Option<&CachedLocation> {
        self.location
            .as_ref()
            .filter(|location| location.address == self.address)
    }

    pub fn has_address(&self) -> bool {
        !self.address.trim().is_empty()
    }
}

impl TypedIdMarker for Lead {
    fn tag() -> &'static str {
        "LED"
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    Contacted,
    Scheduled,
    Completed,
}

impl JobStatus {
    pub const EXPECTED: &'static str = "one of new, contacted, scheduled, completed";

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::New => "new",
            JobStatus::Contacted => "contacted",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == JobStatus::Completed
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<JobStatus, ()> {
        match s {
            "new" => Ok(JobStatus::New),
            "contacted" => Ok(JobStatus::Contacted),
            "scheduled" => Ok(JobStatus::Scheduled),
            "completed" => Ok(JobStatus::Completed),
            _ => Err(()),
        }
    }
}

/// Tracking record of a lead that was promoted to a job.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Job {
    pub status: JobState,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub promoted_at: DateTime<Utc>,
    pub prior: PriorLeadState,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Scheduled,
    InProgress,
    Completed,
}

impl JobState {
    /// The lead-level status a job in this state is mirrored as.
    pub fn job_status(self) -> JobStatus {
        match self {
            JobState::Scheduled | JobState::InProgress => JobStatus::Scheduled,
            JobState::Completed => JobStatus::Completed,
        }
    }
}

impl FromStr for JobState {
    type Err = ();

    fn from_str(s: &str) -> Result<JobState, ()> {
        match s {
            "scheduled" => Ok(JobState::Scheduled),
            "in_progress" => Ok(JobState::InProgress),
            "completed" => Ok(JobState::Completed),
            _ => Err(()),
        }
    }
}

/// The fields a promotion overwrites, as they were before it. Unscheduling a
/// job puts them back.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PriorLeadState {
    pub job_status: JobStatus,
    #[serde(default, with = "optional_datetime")]
    pub scheduled_inspection_date: Option<DateTime<Utc>>,
    pub inspector: Option<String>,
    pub internal_notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CachedLocation {
    pub lat: f64,
    pub lng: f64,
    // the address string these coordinates were computed from
    pub address: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub geocoded_at: DateTime<Utc>,
}
