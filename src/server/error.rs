//! Ошибки API сервера

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::error::{StoreError, ValidationError};
use crate::types::ErrorResponse;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("No input data provided")]
    NoInput,

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("artifact {path} expects features that differ from the served feature list")]
    FeatureMismatch { path: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NoInput | ServerError::BadRequest(_) | ServerError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::ModelNotLoaded | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::FeatureMismatch { .. } => StatusCode::CONFLICT,
            ServerError::Store(StoreError::NoArtifactFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
