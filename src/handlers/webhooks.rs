// src/handlers/webhooks.rs

use axum::{
    extract::State,
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
    services::review_service::{TriggerOutcome, TriggerReview},
};

// =============================================================================
//  WEBHOOK EXTERNO: DISPARO DE PEDIDO DE REVIEW
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TriggerReviewPayload {
    #[serde(default)]
    #[validate(length(min = 1, message = "contact_phone is required"))]
    #[schema(example = "+15551234567")]
    pub contact_phone: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "contact_name is required"))]
    #[schema(example = "John Smith")]
    pub contact_name: String,

    // Guardado como veio; CRMs externos mandam de tudo aqui
    #[schema(example = "john@example.com")]
    pub contact_email: Option<String>,

    #[schema(example = "AC Repair")]
    pub job_type: Option<String>,

    #[schema(example = "Carlos")]
    pub tech_name: Option<String>,

    #[schema(example = "jobber")]
    pub source: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TriggerReviewResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    pub contact_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_request_id: Option<Uuid>,
}

impl From<TriggerOutcome> for TriggerReviewResponse {
    fn from(outcome: TriggerOutcome) -> Self {
        match outcome {
            TriggerOutcome::Sent { contact_id, review_request_id } => Self {
                success: true,
                message: "Review request sent".into(),
                skipped: false,
                contact_id,
                review_request_id: Some(review_request_id),
            },
            TriggerOutcome::Skipped { contact_id, reason } => Self {
                success: true,
                message: reason.message().into(),
                skipped: true,
                contact_id,
                review_request_id: None,
            },
        }
    }
}

// POST /api/webhooks/trigger-review/{contractor_id}
#[utoipa::path(
    post,
    path = "/api/webhooks/trigger-review/{contractor_id}",
    tag = "Webhooks",
    request_body = TriggerReviewPayload,
    responses(
        (status = 200, description = "Pedido enviado ou pulado (pendente/cooldown)", body = TriggerReviewResponse),
        (status = 400, description = "Dados inválidos, contato em opt-out ou contractor sem telefone"),
        (status = 403, description = "Assinatura inativa ou automação desligada"),
        (status = 404, description = "Contractor não encontrado"),
        (status = 500, description = "Falha no envio do SMS")
    ),
    params(
        ("contractor_id" = Uuid, Path, description = "ID do Contractor")
    )
)]
pub async fn trigger_review(
    State(app_state): State<AppState>,
    AppPath(contractor_id): AppPath<Uuid>,
    AppJson(payload): AppJson<TriggerReviewPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = app_state
        .review_service
        .trigger_review(
            contractor_id,
            TriggerReview {
                contact_phone: payload.contact_phone,
                contact_name: payload.contact_name,
                contact_email: payload.contact_email,
                job_type: payload.job_type,
                tech_name: payload.tech_name,
                source: payload.source,
            },
        )
        .await?;

    Ok(Json(TriggerReviewResponse::from(outcome)))
}

// GET /api/webhooks/trigger-review/{contractor_id}
#[utoipa::path(
    get,
    path = "/api/webhooks/trigger-review/{contractor_id}",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Descrição do endpoint para quem integra")
    ),
    params(
        ("contractor_id" = Uuid, Path, description = "ID do Contractor")
    )
)]
pub async fn describe_trigger_review(AppPath(contractor_id): AppPath<Uuid>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "endpoint": "trigger-review",
        "contractor_id": contractor_id,
        "method": "POST",
        "required_fields": ["contact_phone", "contact_name"],
        "optional_fields": ["contact_email", "job_type", "tech_name", "source"],
    }))
}
