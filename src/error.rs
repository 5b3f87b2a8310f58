use std::fmt::{Debug, Display};
use std::io::Error as IoError;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError, UrlencodedError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derivative::Derivative;
use mongodb::bson::ser::Error as BsonError;
use mongodb::error::Error as DatabaseError;
use serde::{Serialize, Serializer};

use crate::campaign::CampaignId;
use crate::lead::{JobStatus, LeadId};

#[derive(Debug, Serialize, Derivative)]
#[derivative(PartialEq, Eq)]
#[serde(untagged)]
pub enum Error {
    // 400
    #[serde(serialize_with = "display")]
    InvalidJson(#[derivative(PartialEq = "ignore")] JsonPayloadError),
    #[serde(serialize_with = "display")]
    InvalidPath(#[derivative(PartialEq = "ignore")] PathError),
    #[serde(serialize_with = "display")]
    InvalidForm(#[derivative(PartialEq = "ignore")] UrlencodedError),
    #[serde(serialize_with = "display")]
    InvalidQuery(#[derivative(PartialEq = "ignore")] QueryPayloadError),
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    // 401
    MissingCredentials,
    InvalidCredentials,

    // 404
    PathNotFound,
    CampaignNotFound {
        campaign_id: CampaignId,
    },
    PageNotFound {
        page_slug: String,
    },
    LeadNotFound {
        lead_id: LeadId,
    },
    JobNotFound {
        lead_id: LeadId,
    },

    // 409
    DuplicateSubmission,
    ConcurrentModificationDetected,
    SlugAlreadyTaken {
        page_slug: String,
    },
    LeadAlreadyPromoted {
        lead_id: LeadId,
    },
    LeadIsCold {
        lead_id: LeadId,
    },
    LeadIsNotCold {
        lead_id: LeadId,
    },
    LeadIsCompleted {
        lead_id: LeadId,
    },
    InvalidTransition {
        lead_id: LeadId,
        from: JobStatus,
        to: JobStatus,
    },

    // 500
    ExistentialState(String),
    #[serde(serialize_with = "display")]
    FailedDatabaseCall(#[derivative(PartialEq = "ignore")] DatabaseError),
    #[serde(serialize_with = "display")]
    FailedToSerializeToBson(#[derivative(PartialEq = "ignore")] BsonError),
    #[serde(serialize_with = "display")]
    IoError(#[derivative(PartialEq = "ignore")] IoError),
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "E4001000",
            Error::InvalidPath(_) => "E4001001",
            Error::InvalidForm(_) => "E4001002",
            Error::InvalidQuery(_) => "E4001003",
            Error::InvalidField { .. } => "E4001004",
            Error::MissingCredentials => "E4011000",
            Error::InvalidCredentials => "E4011001",
            Error::PathNotFound => "E4041000",
            Error::CampaignNotFound { .. } => "E4041001",
            Error::PageNotFound { .. } => "E4041002",
            Error::LeadNotFound { .. } => "E4041003",
            Error::JobNotFound { .. } => "E4041004",
            Error::DuplicateSubmission => "E4091000",
            Error::ConcurrentModificationDetected => "E4091001",
            Error::SlugAlreadyTaken { .. } => "E4091002",
            Error::LeadAlreadyPromoted { .. } => "E4091003",
            Error::LeadIsCold { .. } => "E4091004",
            Error::LeadIsNotCold { .. } => "E4091005",
            Error::LeadIsCompleted { .. } => "E4091006",
            Error::InvalidTransition { .. } => "E4091007",
            Error::ExistentialState(_) => "E5001000",
            Error::FailedDatabaseCall(_) => "E5001001",
            Error::FailedToSerializeToBson(_) => "E5001002",
            Error::IoError(_) => "E5001003",
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "The given json could not be parsed",
            Error::InvalidPath(_) => "The given path could not be parsed",
            Error::InvalidForm(_) => "The given form could not be parsed",
            Error::InvalidQuery(_) => "The given query could not be parsed",
            Error::InvalidField { .. } => "A field in the request has an invalid value",
            Error::MissingCredentials => "The request does not carry a bearer token",
            Error::InvalidCredentials => "The provided bearer token is not valid",
            Error::PathNotFound => "The requested path was not found",
            Error::CampaignNotFound { .. } => "The requested campaign was not found",
            Error::PageNotFound { .. } => "The requested campaign page was not found",
            Error::LeadNotFound { .. } => "The requested lead was not found",
            Error::JobNotFound { .. } => "The requested lead has not been promoted to a job",
            Error::DuplicateSubmission => {
                "A submission from this email address was received recently"
            }
            Error::ConcurrentModificationDetected => {
                "The server detected a concurrent modification"
            }
            Error::SlugAlreadyTaken { .. } => "The requested page slug is already in use",
            Error::LeadAlreadyPromoted { .. } => "The requested lead is already a job",
            Error::LeadIsCold { .. } => "The requested lead is in the cold bucket",
            Error::LeadIsNotCold { .. } => "The requested lead is not in the cold bucket",
            Error::LeadIsCompleted { .. } => "The requested lead has already been completed",
            Error::InvalidTransition { .. } => {
                "The requested status change is not allowed for this lead"
            }
            Error::ExistentialState(_) => "The server detected an invalid state",
            Error::FailedDatabaseCall(_) => {
                "An error occurred when communicating with the database"
            }
            Error::FailedToSerializeToBson(_) => {
                "An error occurred when serializing an object to bson"
            }
            Error::IoError(_) => "An error occurred during an I/O operation",
        }
    }

    pub fn invalid_field(field: &'static str, expected: &'static str) -> Error {
        Error::InvalidField { field, expected }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Error::InvalidForm(_) => StatusCode::BAD_REQUEST,
            Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::InvalidField { .. } => StatusCode::BAD_REQUEST,
            Error::MissingCredentials => StatusCode::UNAUTHORIZED,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::PathNotFound => StatusCode::NOT_FOUND,
            Error::CampaignNotFound { .. } => StatusCode::NOT_FOUND,
            Error::PageNotFound { .. } => StatusCode::NOT_FOUND,
            Error::LeadNotFound { .. } => StatusCode::NOT_FOUND,
            Error::JobNotFound { .. } => StatusCode::NOT_FOUND,
            Error::DuplicateSubmission => StatusCode::CONFLICT,
            Error::ConcurrentModificationDetected => StatusCode::CONFLICT,
            Error::SlugAlreadyTaken { .. } => StatusCode::CONFLICT,
            Error::LeadAlreadyPromoted { .. } => StatusCode::CONFLICT,
            Error::LeadIsCold { .. } => StatusCode::CONFLICT,
            Error::LeadIsNotCold { .. } => StatusCode::CONFLICT,
            Error::LeadIsCompleted { .. } => StatusCode::CONFLICT,
            Error::InvalidTransition { .. } => StatusCode::CONFLICT,
            Error::ExistentialState(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedDatabaseCall(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToSerializeToBson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        #[derive(Serialize)]
        struct Dummy<'a> {
            error_code: &'static str,
            error_message: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            error_meta: Option<&'a Error>,
        }

        let status = self.status_code();

        // internal details stay in the logs
        let error_meta = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            None
        } else {
            Some(self)
        };

        HttpResponse::build(status).json(&Dummy {
            error_code: self.error_code(),
            error_message: self.error_message(),
            error_meta,
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Error {
        Error::FailedDatabaseCall(error)
    }
}

impl From<BsonError> for Error {
    fn from(error: BsonError) -> Error {
        Error::FailedToSerializeToBson(error)
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidJson(err) => Some(err),
            Error::InvalidPath(err) => Some(err),
            Error::InvalidForm(err) => Some(err),
            Error::InvalidQuery(err) => Some(err),
            Error::FailedDatabaseCall(err) => Some(err),
            Error::FailedToSerializeToBson(err) => Some(err),
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
