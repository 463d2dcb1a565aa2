// src/db/store.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        analytics::AnalyticsEvent,
        campaign::{CampaignCounters, CampaignStatus, ContactFilter, NewCampaign, ReviewCampaign},
        contact::{Contact, NewContact, NewMessage},
        contractor::ContractorConfig,
        review::{NewReviewRequest, ReviewRequest, ReviewStatus},
    },
};

/// Consulta de elegibilidade de contatos para uma campanha.
#[derive(Debug, Clone)]
pub struct EligibilityQuery<'a> {
    pub filter: &'a ContactFilter,
    /// Exclui quem já foi alvo desta campanha.
    pub campaign_id: Option<Uuid>,
    pub limit: Option<i64>,
}

pub type DynStore = Arc<dyn ReviewStore>;

/// Contrato do serviço com o banco relacional (tudo escopado por tenant).
#[async_trait]
pub trait ReviewStore: Send + Sync + 'static {
    // --- contractor ---

    async fn get_contractor(&self, contractor_id: Uuid) -> Result<Option<ContractorConfig>, AppError>;

    // --- contatos ---

    async fn get_contact(&self, contractor_id: Uuid, contact_id: Uuid) -> Result<Option<Contact>, AppError>;

    async fn find_contact_by_phone(&self, contractor_id: Uuid, phone: &str) -> Result<Option<Contact>, AppError>;

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact, AppError>;

    async fn update_contact_identity(
        &self,
        contractor_id: Uuid,
        contact_id: Uuid,
        name: &str,
        email: Option<&str>,
    ) -> Result<(), AppError>;

    async fn touch_contact(&self, contractor_id: Uuid, contact_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Contatos elegíveis em ordem estável (created_at, id).
    async fn eligible_contacts(&self, contractor_id: Uuid, query: &EligibilityQuery<'_>) -> Result<Vec<Contact>, AppError>;

    async fn count_eligible_contacts(&self, contractor_id: Uuid, filter: &ContactFilter) -> Result<i64, AppError>;

    // --- conversas e mensagens ---

    /// Busca ou cria a conversa do contato, atualizando o preview.
    async fn upsert_conversation(
        &self,
        contractor_id: Uuid,
        contact_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<Uuid, AppError>;

    async fn has_message(&self, contractor_id: Uuid, provider_sid: &str) -> Result<bool, AppError>;

    /// Retorna `false` quando o sid já foi gravado (webhook reentregue).
    async fn insert_message(&self, message: &NewMessage) -> Result<bool, AppError>;

    async fn update_message_status(
        &self,
        contractor_id: Uuid,
        provider_sid: &str,
        status: &str,
        error_code: Option<&str>,
    ) -> Result<(), AppError>;

    // --- review requests ---

    /// Falha com `AppError::ActiveRequestExists` se o contato já tiver um pedido ativo.
    async fn create_review_request(&self, request: &NewReviewRequest) -> Result<ReviewRequest, AppError>;

    /// Pedido ativo mais recente do contato.
    async fn find_active_request(&self, contractor_id: Uuid, contact_id: Uuid) -> Result<Option<ReviewRequest>, AppError>;

    async fn has_request_since(&self, contractor_id: Uuid, contact_id: Uuid, since: DateTime<Utc>) -> Result<bool, AppError>;

    /// Compare-and-set: grava `next` só se o status atual ainda for `expected`.
    /// `None` quando outro ator já mudou o pedido.
    async fn save_transition(
        &self,
        next: &ReviewRequest,
        expected: ReviewStatus,
    ) -> Result<Option<ReviewRequest>, AppError>;

    async fn clear_next_drip(&self, request_id: Uuid) -> Result<(), AppError>;

    async fn list_due_drips(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ReviewRequest>, AppError>;

    async fn list_campaign_requests(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<Vec<ReviewRequest>, AppError>;

    // --- campanhas ---

    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<ReviewCampaign, AppError>;

    async fn get_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<Option<ReviewCampaign>, AppError>;

    async fn list_campaigns(&self, contractor_id: Uuid) -> Result<Vec<ReviewCampaign>, AppError>;

    async fn list_sending_campaigns(&self, limit: i64) -> Result<Vec<ReviewCampaign>, AppError>;

    /// Compare-and-set do status; ajusta started_at/completed_at conforme o novo status.
    /// `false` quando a campanha não estava mais em `expected`.
    async fn set_campaign_status(
        &self,
        contractor_id: Uuid,
        campaign_id: Uuid,
        expected: CampaignStatus,
        status: CampaignStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn increment_campaign_counters(
        &self,
        contractor_id: Uuid,
        campaign_id: Uuid,
        delta: CampaignCounters,
    ) -> Result<(), AppError>;

    async fn delete_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<bool, AppError>;

    // --- analytics ---

    async fn record_event(&self, contractor_id: Uuid, event: AnalyticsEvent, metadata: Value) -> Result<(), AppError>;
}
