use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod manager;
pub use endpoints::*;

pub type MarketingLeadId = TypedId<MarketingLead>;

/// A contact request from the platform's own marketing site. Unrelated to
/// campaigns and their leads.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MarketingLead {
    #[serde(rename = "_id")]
    pub id: MarketingLeadId,
    pub name: String,
    // normalized, see lead::dedup::normalize_email
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub submitted_at: DateTime<Utc>,
}

impl TypedIdMarker for MarketingLead {
    fn tag() -> &'static str {
        "MKT"
    }
}
