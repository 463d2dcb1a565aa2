// src/handlers/campaigns.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, extract::{AppJson, AppPath}},
    config::AppState,
    middleware::tenancy::TenantContext,
    models::campaign::{CampaignStatus, ContactFilter, ReviewCampaign},
    services::campaign_service::CampaignDetail,
};

fn default_rate_limit() -> i32 {
    20
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignPayload {
    #[serde(default)]
    #[validate(length(min = 1, max = 120, message = "Campaign name is required"))]
    #[schema(example = "Spring blast")]
    pub name: String,

    #[serde(default)]
    pub contact_filter: ContactFilter,

    #[serde(default = "default_rate_limit")]
    #[validate(range(min = 1, max = 1000, message = "rateLimitPerHour must be between 1 and 1000"))]
    #[schema(example = 20)]
    pub rate_limit_per_hour: i32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EstimatePayload {
    pub contact_filter: ContactFilter,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EstimateResponse {
    #[schema(example = 42)]
    pub count: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCampaignPayload {
    #[serde(default)]
    #[schema(example = "start")]
    pub action: String,
}

// =============================================================================
//  LISTAGEM E CRIAÇÃO
// =============================================================================

// GET /api/reviews/campaigns
#[utoipa::path(
    get,
    path = "/api/reviews/campaigns",
    tag = "Campaigns",
    responses(
        (status = 200, description = "Campanhas do contractor", body = [ReviewCampaign])
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Contractor")
    )
)]
pub async fn list_campaigns(
    State(app_state): State<AppState>,
    tenant: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let campaigns = app_state.campaign_service.list_campaigns(tenant.0).await?;
    Ok(Json(json!({ "campaigns": campaigns })))
}

// POST /api/reviews/campaigns
#[utoipa::path(
    post,
    path = "/api/reviews/campaigns",
    tag = "Campaigns",
    request_body = CreateCampaignPayload,
    responses(
        (status = 201, description = "Campanha criada em rascunho", body = ReviewCampaign),
        (status = 400, description = "Nenhum contato elegível ou dados inválidos")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Contractor")
    )
)]
pub async fn create_campaign(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    AppJson(payload): AppJson<CreateCampaignPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let campaign = app_state
        .campaign_service
        .create_campaign(
            tenant.0,
            &payload.name,
            payload.contact_filter,
            payload.rate_limit_per_hour,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "campaign": campaign }))))
}

// POST /api/reviews/estimate
#[utoipa::path(
    post,
    path = "/api/reviews/estimate",
    tag = "Campaigns",
    request_body = EstimatePayload,
    responses(
        (status = 200, description = "Contatos elegíveis para o filtro", body = EstimateResponse)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do Contractor")
    )
)]
pub async fn estimate(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    AppJson(payload): AppJson<EstimatePayload>,
) -> Result<impl IntoResponse, AppError> {
    let count = app_state
        .campaign_service
        .estimate(tenant.0, &payload.contact_filter)
        .await?;
    Ok(Json(EstimateResponse { count }))
}

// =============================================================================
//  DETALHE, AÇÕES E REMOÇÃO
// =============================================================================

// GET /api/reviews/campaigns/{id}
#[utoipa::path(
    get,
    path = "/api/reviews/campaigns/{id}",
    tag = "Campaigns",
    responses(
        (status = 200, description = "Campanha e seus pedidos", body = CampaignDetail),
        (status = 404, description = "Campanha não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da Campanha"),
        ("x-tenant-id" = Uuid, Header, description = "ID do Contractor")
    )
)]
pub async fn get_campaign(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state.campaign_service.get_campaign(tenant.0, id).await?;
    Ok(Json(detail))
}

// PATCH /api/reviews/campaigns/{id}
#[utoipa::path(
    patch,
    path = "/api/reviews/campaigns/{id}",
    tag = "Campaigns",
    request_body = UpdateCampaignPayload,
    responses(
        (status = 200, description = "Novo status da campanha", body = CampaignStatus),
        (status = 400, description = "Ação inválida para o status atual"),
        (status = 404, description = "Campanha não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da Campanha"),
        ("x-tenant-id" = Uuid, Header, description = "ID do Contractor")
    )
)]
pub async fn update_campaign(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateCampaignPayload>,
) -> Result<impl IntoResponse, AppError> {
    let status = match payload.action.as_str() {
        "start" => app_state.campaign_service.start_campaign(tenant.0, id).await?,
        "pause" => app_state.campaign_service.pause_campaign(tenant.0, id).await?,
        _ => return Err(AppError::InvalidInput("Invalid action".into())),
    };

    Ok(Json(json!({ "success": true, "status": status })))
}

// DELETE /api/reviews/campaigns/{id}
#[utoipa::path(
    delete,
    path = "/api/reviews/campaigns/{id}",
    tag = "Campaigns",
    responses(
        (status = 200, description = "Campanha removida"),
        (status = 400, description = "Campanha em envio não pode ser removida"),
        (status = 404, description = "Campanha não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da Campanha"),
        ("x-tenant-id" = Uuid, Header, description = "ID do Contractor")
    )
)]
pub async fn delete_campaign(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.campaign_service.delete_campaign(tenant.0, id).await?;
    Ok(Json(json!({ "success": true })))
}
