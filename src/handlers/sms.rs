// src/handlers/sms.rs

// Webhooks da TextGrid. Nunca devolvem status de erro: o gateway reentrega
// em caso de falha, e a deduplicação por MessageSid cuida do resto.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    config::AppState,
    services::{
        inbound_service::InboundSms,
        textgrid::{empty_twiml, reply_twiml, verify_signature},
    },
};

const SIGNATURE_HEADER: &str = "x-textgrid-signature";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InboundSmsForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusCallbackForm {
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
    #[serde(rename = "SmsSid")]
    pub sms_sid: Option<String>,
    #[serde(rename = "MessageStatus")]
    pub message_status: Option<String>,
    #[serde(rename = "SmsStatus")]
    pub sms_status: Option<String>,
    #[serde(rename = "ErrorCode")]
    pub error_code: Option<String>,
}

fn xml(body: String) -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], body)
}

/// Confere a assinatura quando há segredo configurado.
fn signature_ok(app_state: &AppState, headers: &HeaderMap, path: &str, raw: &[u8]) -> bool {
    let Some(secret) = app_state.config.textgrid_webhook_secret.as_deref() else {
        return true;
    };
    let url = format!("{}{}", app_state.config.app_base_url.trim_end_matches('/'), path);
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|signature| verify_signature(secret, &url, raw, signature))
}

// POST /api/sms/inbound/{contractor_id}
#[utoipa::path(
    post,
    path = "/api/sms/inbound/{contractor_id}",
    tag = "SMS",
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "From, To, Body, MessageSid"),
    responses(
        (status = 200, description = "TwiML (vazio ou com resposta automática)", content_type = "text/xml", body = String)
    ),
    params(
        ("contractor_id" = Uuid, Path, description = "ID do Contractor")
    )
)]
pub async fn inbound_sms(
    State(app_state): State<AppState>,
    Path(contractor_id): Path<String>,
    headers: HeaderMap,
    raw: Bytes,
) -> impl IntoResponse {
    let Ok(contractor_id) = Uuid::parse_str(&contractor_id) else {
        tracing::warn!(%contractor_id, "SMS recebido com contractor inválido na URL");
        return xml(empty_twiml());
    };

    if !signature_ok(&app_state, &headers, &format!("/api/sms/inbound/{contractor_id}"), &raw) {
        tracing::warn!(%contractor_id, "Assinatura do webhook de SMS inválida");
        return xml(empty_twiml());
    }

    let form: InboundSmsForm = match serde_urlencoded::from_bytes(&raw) {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!(%contractor_id, error = %e, "Form de SMS ilegível");
            return xml(empty_twiml());
        }
    };

    let sms = InboundSms {
        from: form.from,
        to: form.to,
        body: form.body,
        message_sid: form.message_sid.filter(|s| !s.is_empty()),
    };

    match app_state.inbound_service.handle_sms(contractor_id, &sms).await {
        Ok(Some(reply)) => xml(reply_twiml(&reply)),
        Ok(None) => xml(empty_twiml()),
        Err(e) => {
            tracing::error!(%contractor_id, error = %e, "Falha ao processar SMS recebido");
            xml(empty_twiml())
        }
    }
}

// POST /api/sms/status/{contractor_id}
#[utoipa::path(
    post,
    path = "/api/sms/status/{contractor_id}",
    tag = "SMS",
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "MessageSid, MessageStatus, ErrorCode"),
    responses(
        (status = 200, description = "Recebido")
    ),
    params(
        ("contractor_id" = Uuid, Path, description = "ID do Contractor")
    )
)]
pub async fn status_callback(
    State(app_state): State<AppState>,
    Path(contractor_id): Path<String>,
    headers: HeaderMap,
    raw: Bytes,
) -> impl IntoResponse {
    let Ok(contractor_id) = Uuid::parse_str(&contractor_id) else {
        return StatusCode::OK;
    };

    if !signature_ok(&app_state, &headers, &format!("/api/sms/status/{contractor_id}"), &raw) {
        tracing::warn!(%contractor_id, "Assinatura do callback de status inválida");
        return StatusCode::OK;
    }

    let Ok(form) = serde_urlencoded::from_bytes::<StatusCallbackForm>(&raw) else {
        return StatusCode::OK;
    };

    let sid = form.message_sid.or(form.sms_sid);
    let status = form.message_status.or(form.sms_status);
    if let (Some(sid), Some(status)) = (sid, status) {
        if let Err(e) = app_state
            .inbound_service
            .handle_status(contractor_id, &sid, &status, form.error_code.as_deref())
            .await
        {
            tracing::error!(%contractor_id, %sid, error = %e, "Falha ao atualizar status da mensagem");
        }
    }

    StatusCode::OK
}
