// src/common/error.rs

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::review::ReviewStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Corpo JSON ilegível ou com tipos errados
    #[error(transparent)]
    JsonRejection(#[from] JsonRejection),

    #[error(transparent)]
    PathRejection(#[from] PathRejection),

    // Entrada malformada (telefone inválido, campo obrigatório ausente)
    #[error("{0}")]
    InvalidInput(String),

    // Contractor mal configurado (sem telefone, etc.)
    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("A review request is already pending for this contact")]
    ActiveRequestExists,

    #[error("Transição inválida: {from:?} não aceita {event}")]
    InvalidTransition {
        from: ReviewStatus,
        event: &'static str,
    },

    #[error("Unauthorized")]
    Unauthorized,

    // Falha do gateway de SMS (rede, timeout, número rejeitado)
    #[error("Falha no envio de SMS: {0}")]
    Dispatch(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "One or more fields are invalid",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::JsonRejection(rejection) => (rejection.status(), rejection.body_text()),
            AppError::PathRejection(rejection) => (rejection.status(), rejection.body_text()),
            AppError::InvalidInput(msg) | AppError::PreconditionFailed(msg) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            e @ (AppError::ActiveRequestExists | AppError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, e.to_string())
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Dispatch(reason) => {
                tracing::error!(%reason, "Falha no envio de SMS");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to send SMS".to_string())
            }

            // DatabaseError e InternalServerError viram 500; o detalhe fica só no log.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
