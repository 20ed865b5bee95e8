use std::io;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::stats::CommandError;

pub(crate) enum StaticOrOwnedString {
    Static(&'static str),
    Owned(String),
}

impl Serialize for StaticOrOwnedString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            StaticOrOwnedString::Static(s) => serializer.serialize_str(s),
            StaticOrOwnedString::Owned(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&'static str> for StaticOrOwnedString {
    fn from(val: &'static str) -> Self {
        StaticOrOwnedString::Static(val)
    }
}

impl From<String> for StaticOrOwnedString {
    fn from(val: String) -> Self {
        StaticOrOwnedString::Owned(val)
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorBody {
    pub error: StaticOrOwnedString,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum AppError {
    #[error("{0} required")]
    MissingField(&'static str),
    #[error("value must be 'like' or 'dislike'")]
    InvalidValue,
    #[error("Invalid JSON")]
    MalformedBody,
    #[error("Not found")]
    NotFound,
    #[error("Forbidden")]
    Forbidden,
    #[error("storage failure: {0}")]
    Storage(#[from] io::Error),
}

impl From<CommandError> for AppError {
    fn from(value: CommandError) -> Self {
        match value {
            CommandError::MissingField(field) => AppError::MissingField(field),
            CommandError::InvalidValue => AppError::InvalidValue,
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::MissingField(_) | AppError::InvalidValue | AppError::MalformedBody => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> StaticOrOwnedString {
        match self {
            AppError::MissingField(_) => self.to_string().into(),
            AppError::InvalidValue => "value must be 'like' or 'dislike'".into(),
            AppError::MalformedBody => "Invalid JSON".into(),
            AppError::NotFound => "Not found".into(),
            AppError::Forbidden => "Forbidden".into(),
            // Details stay in the log
            AppError::Storage(_) => "Internal error".into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Storage(e) = &self {
            error!(error = %e, "request failed on storage");
        }

        let body = ErrorBody { error: self.message() };
        (self.status(), Json(body)).into_response()
    }
}

pub(crate) async fn not_found() -> AppError {
    AppError::NotFound
}
