// src/services/dispatcher.rs

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::DynStore,
    models::contact::{MessageDirection, NewMessage},
};

/// Uma mensagem pronta para o gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundSms {
    pub from: String,
    pub to: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_callback: Option<String>,
}

/// Recibo devolvido pelo gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SmsReceipt {
    pub sid: String,
    pub status: String,
}

/// Contrato com a operadora de SMS.
#[async_trait]
pub trait SmsGateway: Send + Sync + 'static {
    async fn send_sms(&self, sms: &OutboundSms) -> Result<SmsReceipt, AppError>;
}

pub type DynGateway = Arc<dyn SmsGateway>;

/// Envio único, com timeout, e registro da mensagem de saída.
/// Não faz retry: quem chama decide o destino do pedido em caso de falha.
#[derive(Clone)]
pub struct Dispatcher {
    gateway: DynGateway,
    store: DynStore,
    timeout: Duration,
    base_url: String,
}

impl Dispatcher {
    pub fn new(gateway: DynGateway, store: DynStore, timeout: Duration, base_url: impl Into<String>) -> Self {
        Self {
            gateway,
            store,
            timeout,
            base_url: base_url.into(),
        }
    }

    pub fn status_callback_url(&self, contractor_id: Uuid) -> Option<String> {
        let base = self.base_url.trim_end_matches('/');
        (!base.is_empty()).then(|| format!("{base}/api/sms/status/{contractor_id}"))
    }

    pub async fn send(
        &self,
        contractor_id: Uuid,
        contact_id: Uuid,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<SmsReceipt, AppError> {
        let sms = OutboundSms {
            from: from.to_string(),
            to: to.to_string(),
            body: body.to_string(),
            status_callback: self.status_callback_url(contractor_id),
        };

        let receipt = match tokio::time::timeout(self.timeout, self.gateway.send_sms(&sms)).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                tracing::warn!(%contractor_id, %contact_id, error = %e, "Falha no envio de SMS");
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(%contractor_id, %contact_id, timeout_secs = self.timeout.as_secs(), "Envio de SMS expirou");
                return Err(AppError::Dispatch(format!(
                    "gateway timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        // O SMS já saiu: falha ao registrar não pode virar falha de envio.
        if let Err(e) = self.record_outbound(contractor_id, contact_id, body, &receipt).await {
            tracing::error!(%contractor_id, %contact_id, sid = %receipt.sid, error = %e, "Falha ao registrar mensagem enviada");
        }

        Ok(receipt)
    }

    async fn record_outbound(
        &self,
        contractor_id: Uuid,
        contact_id: Uuid,
        body: &str,
        receipt: &SmsReceipt,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let conversation_id = self
            .store
            .upsert_conversation(contractor_id, contact_id, body, now)
            .await?;

        self.store
            .insert_message(&NewMessage {
                contractor_id,
                contact_id,
                conversation_id: Some(conversation_id),
                direction: MessageDirection::Outbound,
                body: body.to_string(),
                provider_sid: Some(receipt.sid.clone()),
                status: receipt.status.clone(),
            })
            .await?;

        self.store.touch_contact(contractor_id, contact_id, now).await
    }
}
