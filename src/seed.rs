use chrono::Duration;
use mockable::Clock;

use crate::campaign::manager::create_campaign;
use crate::campaign::ServiceRadius;
use crate::contractor::ContractorId;
use crate::database::Database;
use crate::error::Error;
use crate::lead::{CachedLocation, Job, JobState, JobStatus, Lead, LeadId, PriorLeadState};

pub const DEMO_CONTRACTOR: &str = "demo-contractor";

struct DemoLead {
    name: &'static str,
    address: &'static str,
    email: &'static str,
    hours_ago: i64,
    job_status: JobStatus,
    contact_attempt: i32,
    tentative_in_days: Option<i64>,
}

const DEMO_LEADS: &[DemoLead] = &[
    DemoLead {
        name: "Jordan Alvarez",
        address: "118 Oak Street, Springfield, IL",
        email: "jordan.alvarez@example.com",
        hours_ago: 3,
        job_status: JobStatus::New,
        contact_attempt: 0,
        tentative_in_days: None,
    },
    DemoLead {
        name: "Casey Nguyen",
        address: "124 Oak Street, Springfield, IL",
        email: "casey.nguyen@example.com",
        hours_ago: 50,
        job_status: JobStatus::New,
        contact_attempt: 0,
        tentative_in_days: Some(3),
    },
    DemoLead {
        name: "Riley Okafor",
        address: "131 Oak Street, Springfield, IL",
        email: "riley.okafor@example.com",
        hours_ago: 72,
        job_status: JobStatus::Contacted,
        contact_attempt: 2,
        tentative_in_days: None,
    },
    DemoLead {
        name: "Morgan Lee",
        address: "",
        email: "morgan.lee@example.com",
        hours_ago: 26,
        job_status: JobStatus::New,
        contact_attempt: 1,
        tentative_in_days: None,
    },
];

/// Replaces everything in the database with a demo contractor's campaigns
/// and leads in a spread of lifecycle states.
#[tracing::instrument(skip(db, clock))]
pub async fn seed(
    db: &dyn Database,
    clock: &dyn Clock,
    contractor_id: &ContractorId,
) -> Result<(), Error> {
    db.drop().await?;

    let campaign = create_campaign(
        db,
        clock,
        contractor_id,
        "Oak Street Storm Damage".to_string(),
        Some(ServiceRadius::Miles3),
    )
    .await?;
    create_campaign(db, clock, contractor_id, "Maple Ave Hail".to_string(), None).await?;

    let now = clock.utc();
    for demo in DEMO_LEADS {
        let submitted_at = now - Duration::hours(demo.hours_ago);
        let lead = Lead {
            id: LeadId::new(),
            campaign_id: campaign.id,
            name: demo.name.to_string(),
            address: demo.address.to_string(),
            email: demo.email.to_string(),
            phone: "555-0100".to_string(),
            notes: None,
            submitted_at,
            job_status: demo.job_status,
            job: None,
            scheduled_inspection_date: None,
            tentative_date: demo.tentative_in_days.map(|days| now + Duration::days(days)),
            is_cold_lead: false,
            cold_since: None,
            contact_attempt: demo.contact_attempt,
            inspector: None,
            internal_notes: None,
            location: None,
            modified_at: submitted_at,
        };

        db.leads().insert_lead(&lead).await?;
    }

    let promoted_at = now - Duration::hours(20);
    let job = Lead {
        id: LeadId::new(),
        campaign_id: campaign.id,
        name: "Taylor Brooks".to_string(),
        address: "140 Oak Street, Springfield, IL".to_string(),
        email: "taylor.brooks@example.com".to_string(),
        phone: "555-0142".to_string(),
        notes: Some("Shingles missing after the storm".to_string()),
        submitted_at: now - Duration::days(4),
        job_status: JobStatus::Scheduled,
        job: Some(Job {
            status: JobState::Scheduled,
            promoted_at,
            prior: PriorLeadState {
                job_status: JobStatus::Contacted,
                scheduled_inspection_date: None,
                inspector: None,
                internal_notes: None,
            },
        }),
        scheduled_inspection_date: Some(now + Duration::days(2)),
        tentative_date: None,
        is_cold_lead: false,
        cold_since: None,
        contact_attempt: 1,
        inspector: Some("Sam".to_string()),
        internal_notes: Some("Side gate code 4411".to_string()),
        location: Some(CachedLocation {
            lat: 39.7990,
            lng: -89.6440,
            address: "140 Oak Street, Springfield, IL".to_string(),
            geocoded_at: promoted_at,
        }),
        modified_at: promoted_at,
    };
    db.leads().insert_lead(&job).await?;

    tracing::info!(%contractor_id, page_slug = %campaign.page_slug, "seeded demo data");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test::MockDatabase;
    use crate::test_support::MutableClock;

    #[tokio::test]
    async fn seeds_demo_contractor() {
        let db = MockDatabase::new();
        let clock = MutableClock::default();
        let contractor_id = ContractorId::new(DEMO_CONTRACTOR);

        seed(&db, &clock, &contractor_id).await.unwrap();

        let campaigns = db.campaigns.all();
        assert_eq!(campaigns.len(), 2);
        assert!(campaigns.iter().all(|c| c.contractor_id == contractor_id));
        assert!(campaigns
            .iter()
            .any(|c| c.page_slug == "oak-street-storm-damage"));
        assert_eq!(db.leads.all().len(), DEMO_LEADS.len() + 1);
        assert!(db.leads.all().iter().any(|lead| lead.tentative_date.is_some()));
    }
}
