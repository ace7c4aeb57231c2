use actix_web::{error::ResponseError, HttpResponse};
use derive_more::Display;
use diesel::result::{DatabaseErrorKind, Error as DBError};
use serde_json::json;
use std::convert::From;

#[derive(Debug, Display, PartialEq)]
pub enum ServiceError {
    #[display(fmt = "Internal Server Error")]
    InternalServerError,

    #[display(fmt = "BadRequest: {}", _0)]
    BadRequest(String),

    #[display(fmt = "Conflict: {}", _0)]
    Conflict(String),

    /// the hold on a slot lapsed before it could be confirmed
    #[display(fmt = "Hold expired")]
    Expired,

    /// a lock token that doesn't match the hold on the slot
    #[display(fmt = "Invalid lock token")]
    InvalidToken,

    #[display(fmt = "Unauthorized")]
    Unauthorized,

    #[display(fmt = "Forbidden: {}", _0)]
    Forbidden(String),

    #[display(fmt = "Not Found")]
    NotFound,
}

// impl ResponseError trait allows to convert our errors into http responses with appropriate data
impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::InternalServerError => HttpResponse::InternalServerError()
                .json(json!({ "error": "Internal Server Error, Please try later" })),
            ServiceError::BadRequest(ref message) => {
                HttpResponse::BadRequest().json(json!({ "error": message }))
            }
            ServiceError::Conflict(ref message) => {
                HttpResponse::Conflict().json(json!({ "error": message }))
            }
            ServiceError::Expired => {
                HttpResponse::Gone().json(json!({ "error": "hold expired, please retry" }))
            }
            ServiceError::InvalidToken => HttpResponse::UnprocessableEntity()
                .json(json!({ "error": "invalid or foreign lock token" })),
            ServiceError::Unauthorized => {
                HttpResponse::Unauthorized().json(json!({ "error": "Unauthorized" }))
            }
            ServiceError::Forbidden(ref message) => {
                HttpResponse::Forbidden().json(json!({ "error": message }))
            }
            ServiceError::NotFound => {
                HttpResponse::NotFound().json(json!({ "error": "Not Found" }))
            }
        }
    }
}

impl From<DBError> for ServiceError {
    fn from(error: DBError) -> ServiceError {
        match error {
            DBError::NotFound => ServiceError::NotFound,
            DBError::DatabaseError(kind, info) => {
                if let DatabaseErrorKind::UniqueViolation = kind {
                    let message = info.details().unwrap_or_else(|| info.message()).to_string();
                    return ServiceError::Conflict(message);
                }
                error!("db error: {}", info.message());
                ServiceError::InternalServerError
            }
            _ => {
                error!("db error: {}", error);
                ServiceError::InternalServerError
            }
        }
    }
}

impl From<r2d2::Error> for ServiceError {
    fn from(error: r2d2::Error) -> ServiceError {
        error!("r2d2 connection pool error: {}", error);
        ServiceError::InternalServerError
    }
}

impl From<actix_threadpool::BlockingError<ServiceError>> for ServiceError {
    fn from(error: actix_threadpool::BlockingError<ServiceError>) -> ServiceError {
        match error {
            actix_threadpool::BlockingError::Error(e) => e,
            actix_threadpool::BlockingError::Canceled => {
                error!("actix threadpool canceled a blocking database call");
                ServiceError::InternalServerError
            }
        }
    }
}

impl From<argon2::Error> for ServiceError {
    fn from(error: argon2::Error) -> ServiceError {
        error!("argon2 hashing error: {}", error);
        ServiceError::InternalServerError
    }
}
