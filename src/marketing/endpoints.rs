use std::sync::Arc;

use actix_web::post;
use actix_web::web::{Data, Json};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::Error;
use crate::lead::dedup::DedupPolicy;
use crate::notify::Notifier;

use super::manager::{self, MarketingSubmission};
use super::{MarketingLead, MarketingLeadId};

#[derive(Clone, Debug, Deserialize)]
pub struct SubmitMarketingLeadBody {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketingLeadReceiptBody {
    pub id: MarketingLeadId,
    pub submitted_at: DateTime<Utc>,
}

impl MarketingLeadReceiptBody {
    pub fn render(lead: MarketingLead) -> MarketingLeadReceiptBody {
        MarketingLeadReceiptBody {
            id: lead.id,
            submitted_at: lead.submitted_at,
        }
    }
}

#[post("/marketing-leads")]
#[tracing::instrument(skip(db, clock, policy, notifier, body))]
pub async fn submit_marketing_lead(
    db: Data<Box<dyn Database>>,
    clock: Data<Box<dyn Clock>>,
    policy: Data<DedupPolicy>,
    notifier: Data<Arc<dyn Notifier>>,
    body: Json<SubmitMarketingLeadBody>,
) -> Result<Json<MarketingLeadReceiptBody>, Error> {
    let body = body.into_inner();

    let lead = manager::submit_marketing_lead(
        &***db,
        &***clock,
        &policy,
        notifier.get_ref().clone(),
        MarketingSubmission {
            name: body.name,
            email: body.email,
            company: body.company,
            phone: body.phone,
            message: body.message,
        },
    )
    .await?;

    Ok(Json(MarketingLeadReceiptBody::render(lead)))
}
