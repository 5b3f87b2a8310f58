use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contractor::ContractorId;
use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod manager;
pub mod slug;
pub use endpoints::*;

pub type CampaignId = TypedId<Campaign>;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: CampaignId,
    pub contractor_id: ContractorId,
    pub name: String,
    // assigned once at creation, never rewritten
    pub page_slug: String,
    pub status: CampaignStatus,
    pub service_radius: ServiceRadius,
    pub qr_code: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl Campaign {
    pub fn is_active(&self) -> bool {
        self.status == CampaignStatus::Active
    }
}

impl TypedIdMarker for Campaign {
    fn tag() -> &'static str {
        "CPN"
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum CampaignStatus {
    Active,
    Inactive,
}

/// How far from the showcased job a campaign canvasses, in miles.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum ServiceRadius {
    Miles1,
    Miles3,
    Miles5,
    Miles10,
    Miles25,
}

impl ServiceRadius {
    pub fn miles(self) -> u32 {
        match self {
            ServiceRadius::Miles1 => 1,
            ServiceRadius::Miles3 => 3,
            ServiceRadius::Miles5 => 5,
            ServiceRadius::Miles10 => 10,
            ServiceRadius::Miles25 => 25,
        }
    }
}

impl Default for ServiceRadius {
    fn default() -> ServiceRadius {
        ServiceRadius::Miles5
    }
}
