// src/handlers/cron.rs

use axum::{extract::State, response::IntoResponse, Json};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::cron::CronAuth,
    services::{campaign_service::CampaignTickReport, drip_service::DripTickReport},
};

// POST /api/cron/process-campaigns
#[utoipa::path(
    post,
    path = "/api/cron/process-campaigns",
    tag = "Cron",
    responses(
        (status = 200, description = "Resumo do tick de campanhas", body = CampaignTickReport),
        (status = 401, description = "Segredo de cron inválido")
    ),
    params(
        ("x-cron-secret" = String, Header, description = "Segredo compartilhado com o agendador")
    )
)]
pub async fn process_campaigns(
    State(app_state): State<AppState>,
    _auth: CronAuth,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.campaign_service.process_tick().await?;
    Ok(Json(report))
}

// POST /api/cron/process-drip
#[utoipa::path(
    post,
    path = "/api/cron/process-drip",
    tag = "Cron",
    responses(
        (status = 200, description = "Resumo do tick de lembretes", body = DripTickReport),
        (status = 401, description = "Segredo de cron inválido")
    ),
    params(
        ("x-cron-secret" = String, Header, description = "Segredo compartilhado com o agendador")
    )
)]
pub async fn process_drip(
    State(app_state): State<AppState>,
    _auth: CronAuth,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.drip_service.process_tick().await?;
    Ok(Json(report))
}
