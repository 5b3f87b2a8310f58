use std::sync::Arc;

use actix_web::web::{self, Data, FormConfig, JsonConfig, PathConfig, QueryConfig, ServiceConfig};
use actix_web::{App, HttpResponse, HttpServer, ResponseError};
use mockable::{Clock, DefaultClock};
use mongodb::Client;
use tracing::info;
use tracing_actix_web::TracingLogger;

pub mod campaign;
pub mod config;
pub mod contractor;
pub mod database;
pub mod error;
pub mod geocode;
pub mod lead;
pub mod marketing;
pub mod notify;
pub mod seed;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod typedid;
pub mod utils;

use config::Config;
use contractor::{Authenticator, ContractorId};
use database::{Database, MongoDatabase};
use error::Error;
use geocode::GeocodeCache;
use lead::dedup::DedupPolicy;
use notify::{LoggingNotifier, Notifier};

/// Everything the endpoints pull out of the app data.
#[derive(Clone)]
pub struct AppState {
    pub db: Data<Box<dyn Database>>,
    pub authenticator: Data<Box<dyn Authenticator>>,
    pub clock: Data<Box<dyn Clock>>,
    pub notifier: Data<Arc<dyn Notifier>>,
    pub geocode_cache: Data<GeocodeCache>,
    pub dedup_policy: Data<DedupPolicy>,
}

impl AppState {
    pub fn new(
        db: Box<dyn Database>,
        authenticator: Box<dyn Authenticator>,
        clock: Box<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        geocode_cache: GeocodeCache,
        dedup_policy: DedupPolicy,
    ) -> AppState {
        AppState {
            db: Data::new(db),
            authenticator: Data::new(authenticator),
            clock: Data::new(clock),
            notifier: Data::new(notifier),
            geocode_cache: Data::new(geocode_cache),
            dedup_policy: Data::new(dedup_policy),
        }
    }

    pub fn configure(&self, cfg: &mut ServiceConfig) {
        cfg.app_data(JsonConfig::default().error_handler(|err, _req| {
            // format json errors with custom format
            Error::InvalidJson(err).into()
        }))
        .app_data(PathConfig::default().error_handler(|err, _req| {
            // format path errors with custom format
            Error::InvalidPath(err).into()
        }))
        .app_data(FormConfig::default().error_handler(|err, _req| {
            // format form errors with custom format
            Error::InvalidForm(err).into()
        }))
        .app_data(QueryConfig::default().error_handler(|err, _req| {
            // format query errors with custom format
            Error::InvalidQuery(err).into()
        }))
        .app_data(self.db.clone())
        .app_data(self.authenticator.clone())
        .app_data(self.clock.clone())
        .app_data(self.notifier.clone())
        .app_data(self.geocode_cache.clone())
        .app_data(self.dedup_policy.clone())
        .service(campaign::endpoints::create_campaign)
        .service(campaign::endpoints::get_campaigns)
        .service(campaign::endpoints::get_campaign_by_id)
        .service(campaign::endpoints::update_campaign)
        .service(campaign::endpoints::set_qr_code)
        .service(campaign::endpoints::get_public_campaign)
        .service(lead::endpoints::get_leads_in_campaign)
        .service(lead::endpoints::submit_lead)
        .service(lead::endpoints::get_map_data)
        .service(lead::endpoints::get_lead_by_id)
        .service(lead::endpoints::update_lead_status)
        .service(lead::endpoints::promote_lead_to_job)
        .service(lead::endpoints::update_job)
        .service(lead::endpoints::unschedule_job)
        .service(lead::endpoints::mark_job_as_cold)
        .service(lead::endpoints::restore_cold_lead)
        .service(lead::endpoints::record_contact_attempt)
        .service(marketing::endpoints::submit_marketing_lead);
    }
}

pub async fn path_not_found() -> HttpResponse {
    Error::PathNotFound.error_response()
}

pub async fn run(config: Config) -> Result<(), Error> {
    info!("connecting to db: {}", config.mongodb_uri);
    let db = Client::with_uri_str(&config.mongodb_uri)
        .await?
        .database(&config.database_name);
    let db = MongoDatabase::initialize(db).await?;

    if config.seed {
        let contractor_id = ContractorId::new(seed::DEMO_CONTRACTOR);
        seed::seed(&db, &DefaultClock, &contractor_id).await?;
    }

    let authenticator = config.authenticator();
    if authenticator.is_empty() {
        tracing::warn!("no bearer tokens configured, contractor endpoints will reject every request");
    }

    let state = AppState::new(
        Box::new(db),
        Box::new(authenticator),
        Box::new(DefaultClock),
        Arc::new(LoggingNotifier),
        GeocodeCache::new(config.geocoder()?, config.geocode_limits()),
        config.dedup_policy(),
    );

    info!(bind_address = %config.bind_address, "starting server");
    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(TracingLogger::default())
            .configure(move |cfg| state.configure(cfg))
            .default_service(web::to(path_not_found))
    })
    .bind(config.bind_address.as_str())?
    .run()
    .await?;

    Ok(())
}
