// src/handlers/reviews.rs

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, extract::AppJson},
    config::AppState,
    middleware::tenancy::TenantContext,
    models::review::ReviewRequest,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendReviewPayload {
    #[validate(required(message = "Contact ID is required"))]
    pub contact_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendReviewResponse {
    pub success: bool,
    pub review_request: ReviewRequest,
}

// POST /api/reviews/send
#[utoipa::path(
    post,
    path = "/api/reviews/send",
    tag = "Reviews",
    request_body = SendReviewPayload,
    responses(
        (status = 200, description = "Pedido criado e SMS enviado", body = SendReviewResponse),
        (status = 400, description = "Dados inválidos ou contato em opt-out"),
        (status = 404, description = "Contato não encontrado"),
        (status = 409, description = "Já existe um pedido ativo para o contato"),
        (status = 500, description = "Falha no envio do SMS")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Contractor")
    )
)]
pub async fn send_review(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    AppJson(payload): AppJson<SendReviewPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let contact_id = payload
        .contact_id
        .ok_or_else(|| AppError::InvalidInput("Contact ID is required".into()))?;

    let review_request = app_state
        .review_service
        .send_single(tenant.0, contact_id, payload.campaign_id)
        .await?;

    Ok(Json(SendReviewResponse {
        success: true,
        review_request,
    }))
}
