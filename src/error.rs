use crate::database::DbError;
use crate::lookup::LookupError;
use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use log::{debug, error};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} cannot be blank")]
    Blank(&'static str),

    #[error("{0} must be a number")]
    NotNumeric(&'static str),

    #[error("a user named '{0}' already exists")]
    DuplicateName(String),
}

/// Failures a handler can return. The body written here is replaced by the
/// 404/500 templates in `routes::error_handlers`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl AppError {
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        AppError::NotFound(what.into())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::Lookup(LookupError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status == StatusCode::NOT_FOUND {
            debug!("{}", self);
        } else {
            error!("{:?}", self);
        }
        HttpResponse::build(status).body(status.canonical_reason().unwrap_or("Error"))
    }
}
