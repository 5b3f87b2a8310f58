//! Contractor identity and bearer-token authentication.
//!
//! Token verification belongs to an external identity provider; this module
//! only defines the seam (`Authenticator`) and the `AuthenticatedContractor`
//! extractor every contractor endpoint takes.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The uid an identity provider assigns to a contractor account.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ContractorId(String);

impl ContractorId {
    pub fn new(uid: impl Into<String>) -> ContractorId {
        ContractorId(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContractorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.write_str(&self.0)
    }
}

impl Debug for ContractorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Display::fmt(self, f)
    }
}

impl From<ContractorId> for Bson {
    fn from(id: ContractorId) -> Bson {
        id.0.into()
    }
}

pub trait Authenticator: Send + Sync {
    fn verify(&self, token: &str) -> Result<ContractorId, Error>;
}

/// Accepts a fixed set of tokens, each mapped to a contractor uid.
#[derive(Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, ContractorId>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: HashMap<String, ContractorId>) -> StaticTokenAuthenticator {
        StaticTokenAuthenticator { tokens }
    }

    /// Parses `token=uid` pairs separated by commas. Malformed pairs are
    /// skipped.
    pub fn parse(spec: &str) -> StaticTokenAuthenticator {
        let tokens = spec
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .map(|(token, uid)| (token.trim(), uid.trim()))
            .filter(|(token, uid)| !token.is_empty() && !uid.is_empty())
            .map(|(token, uid)| (token.to_string(), ContractorId::new(uid)))
            .collect();

        StaticTokenAuthenticator { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn verify(&self, token: &str) -> Result<ContractorId, Error> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(Error::InvalidCredentials)
    }
}

/// The contractor behind the request's `Authorization: Bearer` header.
#[derive(Clone, Debug)]
pub struct AuthenticatedContractor(pub ContractorId);

impl AuthenticatedContractor {
    pub fn id(&self) -> &ContractorId {
        &self.0
    }

    fn authenticate(req: &HttpRequest) -> Result<AuthenticatedContractor, Error> {
        let authenticator = req
            .app_data::<Data<Box<dyn Authenticator>>>()
            .ok_or_else(|| Error::ExistentialState("no authenticator configured".into()))?;

        let header = req
            .headers()
            .get(AUTHORIZATION)
            .ok_or(Error::MissingCredentials)?;
        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.trim().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .filter(|token| !token.is_empty())
            .ok_or(Error::MissingCredentials)?;

        let contractor_id = authenticator.verify(token)?;

        Ok(AuthenticatedContractor(contractor_id))
    }
}

impl FromRequest for AuthenticatedContractor {
    type Error = Error;
    type Future = Ready<Result<AuthenticatedContractor, Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = AuthenticatedContractor::authenticate(req);
        if let Err(err) = &result {
            tracing::debug!(error = %err, "rejected contractor credentials");
        }
        ready(result)
    }
}
