// src/middleware/cron.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{common::error::AppError, config::AppState};

const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Prova de que a chamada veio do agendador externo.
#[derive(Debug, Clone, Copy)]
pub struct CronAuth;

impl<S> FromRequestParts<S> for CronAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let expected = app_state.config.cron_secret.as_str();

        let provided = parts
            .headers
            .get(CRON_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());

        match provided {
            Some(secret) if !expected.is_empty() && secret == expected => Ok(CronAuth),
            _ => {
                tracing::warn!("Chamada de cron com segredo inválido");
                Err(AppError::Unauthorized)
            }
        }
    }
}
