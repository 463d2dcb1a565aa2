// src/services/inbound_service.rs

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{error::AppError, phone::normalize_inbound},
    db::DynStore,
    models::{
        analytics::AnalyticsEvent,
        contact::{Contact, MessageDirection, NewContact, NewMessage},
    },
    services::{classifier::classify_rating, review_service::ReviewService},
};

/// Campos do webhook de SMS recebido (form do gateway).
#[derive(Debug, Clone)]
pub struct InboundSms {
    pub from: String,
    pub to: String,
    pub body: String,
    pub message_sid: Option<String>,
}

#[derive(Clone)]
pub struct InboundService {
    store: DynStore,
    reviews: ReviewService,
}

impl InboundService {
    pub fn new(store: DynStore, reviews: ReviewService) -> Self {
        Self { store, reviews }
    }

    /// Registra a mensagem e, se for uma nota para um pedido ativo, aplica a transição.
    /// Devolve o texto da resposta automática (se houver).
    /// Reentregas do mesmo MessageSid não geram transição nem resposta.
    pub async fn handle_sms(&self, contractor_id: Uuid, sms: &InboundSms) -> Result<Option<String>, AppError> {
        let from = normalize_inbound(&sms.from);
        if from.is_empty() || sms.to.trim().is_empty() {
            tracing::warn!(%contractor_id, "Webhook de SMS sem From ou To");
            return Ok(None);
        }

        let Some(contractor) = self.store.get_contractor(contractor_id).await? else {
            tracing::warn!(%contractor_id, "SMS recebido para contractor inexistente");
            return Ok(None);
        };

        // Reentrega: nada muda, nem a conversa.
        if let Some(sid) = sms.message_sid.as_deref() {
            if self.store.has_message(contractor_id, sid).await? {
                tracing::info!(%contractor_id, %sid, "MessageSid repetido; reentrega ignorada");
                return Ok(None);
            }
        }

        let now = Utc::now();
        let contact = self.resolve_contact(contractor_id, &from, now).await?;
        let conversation_id = self
            .store
            .upsert_conversation(contractor_id, contact.id, &sms.body, now)
            .await?;

        let inserted = self
            .store
            .insert_message(&NewMessage {
                contractor_id,
                contact_id: contact.id,
                conversation_id: Some(conversation_id),
                direction: MessageDirection::Inbound,
                body: sms.body.clone(),
                provider_sid: sms.message_sid.clone(),
                status: "received".into(),
            })
            .await?;

        // Outra entrega do mesmo sid gravou primeiro.
        if !inserted {
            tracing::info!(%contractor_id, sid = ?sms.message_sid, "MessageSid gravado em paralelo; ignorado");
            return Ok(None);
        }

        self.reviews
            .record_event(
                contractor_id,
                AnalyticsEvent::MessageReceived,
                json!({ "channel": "sms", "contact_id": contact.id, "from": from }),
            )
            .await;

        let Some(rating) = classify_rating(&sms.body) else {
            return Ok(None);
        };

        let Some(request) = self.store.find_active_request(contractor_id, contact.id).await? else {
            return Ok(None);
        };

        if !contractor.feature_review_automation {
            return Ok(None);
        }

        self.reviews
            .record_reply(&contractor, &contact, &request, rating, now)
            .await
    }

    async fn resolve_contact(&self, contractor_id: Uuid, phone: &str, now: chrono::DateTime<Utc>) -> Result<Contact, AppError> {
        if let Some(existing) = self.store.find_contact_by_phone(contractor_id, phone).await? {
            self.store.touch_contact(contractor_id, existing.id, now).await?;
            return Ok(existing);
        }

        // Sem nome conhecido: usa o próprio telefone até alguém editar.
        let created = self
            .store
            .create_contact(&NewContact {
                contractor_id,
                name: phone.to_string(),
                phone: phone.to_string(),
                email: None,
                source: "sms".into(),
                tags: vec![],
            })
            .await?;

        tracing::info!(%contractor_id, contact_id = %created.id, "Contato criado a partir de SMS");
        Ok(created)
    }

    /// Callback de status de entrega de uma mensagem enviada.
    pub async fn handle_status(
        &self,
        contractor_id: Uuid,
        message_sid: &str,
        status: &str,
        error_code: Option<&str>,
    ) -> Result<(), AppError> {
        if error_code.is_some() {
            tracing::warn!(%contractor_id, sid = %message_sid, status, error_code, "Falha de entrega reportada pelo gateway");
        }
        self.store
            .update_message_status(contractor_id, message_sid, status, error_code)
            .await
    }
}
