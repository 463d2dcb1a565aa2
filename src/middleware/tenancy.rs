// src/middleware/tenancy.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// Cabeçalho enviado pelo painel (a sessão já foi validada na borda)
const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Contractor (tenant) da requisição.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TENANT_ID_HEADER)
            .ok_or_else(|| AppError::InvalidInput("The x-tenant-id header is required".into()))?;

        let value_str = value
            .to_str()
            .map_err(|_| AppError::InvalidInput("x-tenant-id contains invalid characters".into()))?;

        let tenant_id = Uuid::parse_str(value_str.trim())
            .map_err(|_| AppError::InvalidInput("x-tenant-id is not a valid UUID".into()))?;

        Ok(TenantContext(tenant_id))
    }
}
