use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use contrato_notify::ComposeError;
use contrato_types::models::DomainError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Não autenticado")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Delivery(String),

    #[error("Erro interno do servidor")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn contract_not_found() -> Self {
        Self::NotFound("Contrato não encontrado".to_string())
    }

    /// Storage error, reported as a conflict when a constraint refused the write.
    pub fn unless_conflict(err: anyhow::Error, message: &str) -> Self {
        if contrato_db::is_constraint_violation(&err) {
            Self::Conflict(message.to_string())
        } else {
            Self::Internal(err)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Delivery(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ComposeError> for ApiError {
    fn from(e: ComposeError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("Internal error: {:#}", e);
        }

        let body = json!({
            "success": false,
            "message": self.to_string(),
        });

        (self.status(), Json(body)).into_response()
    }
}
