// src/services/review_service.rs

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{error::AppError, phone::normalize_e164},
    db::DynStore,
    models::{
        analytics::AnalyticsEvent,
        campaign::CampaignCounters,
        contact::{Contact, NewContact},
        contractor::{ContractorConfig, TemplatePurpose},
        review::{NewReviewRequest, ReviewEvent, ReviewRequest, ReviewStatus},
    },
    services::{
        dispatcher::Dispatcher,
        templates::{self, render, standard_vars},
    },
};

/// Resultado de abrir um pedido e disparar o SMS.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Sent(ReviewRequest),
    /// O gateway falhou; o pedido já foi gravado como `stopped`.
    Failed(ReviewRequest),
}

/// Dados recebidos do webhook externo (Jobber, Housecall Pro...).
#[derive(Debug, Clone, Default)]
pub struct TriggerReview {
    pub contact_phone: String,
    pub contact_name: String,
    pub contact_email: Option<String>,
    pub job_type: Option<String>,
    pub tech_name: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Pending,
    Cooldown,
}

impl SkipReason {
    pub fn message(self) -> &'static str {
        match self {
            SkipReason::Pending => "Review request already pending for this contact",
            SkipReason::Cooldown => "Contact received review request within the cooldown window",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Sent { contact_id: Uuid, review_request_id: Uuid },
    Skipped { contact_id: Uuid, reason: SkipReason },
}

/// Ciclo de vida de um pedido: criação, envio e transições.
/// Compartilhado pelo webhook, pelo envio avulso, pelas campanhas e pelo drip.
#[derive(Clone)]
pub struct ReviewService {
    store: DynStore,
    dispatcher: Dispatcher,
    cooldown: Duration,
}

impl ReviewService {
    pub fn new(store: DynStore, dispatcher: Dispatcher, cooldown_days: i64) -> Self {
        Self {
            store,
            dispatcher,
            cooldown: Duration::days(cooldown_days),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn load_contractor(&self, contractor_id: Uuid) -> Result<ContractorConfig, AppError> {
        self.store
            .get_contractor(contractor_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Contractor not found".into()))
    }

    // =========================================================================
    //  NÚCLEO: CRIAR + ENVIAR
    // =========================================================================

    /// Cria o pedido em `sent` e dispara o SMS.
    /// Falha de envio não é erro aqui: o pedido vira `stopped` e volta como `Failed`.
    /// `AppError::ActiveRequestExists` sobe para quem chamou decidir (409 ou pular).
    pub async fn open_request(
        &self,
        contractor: &ContractorConfig,
        from: &str,
        contact: &Contact,
        campaign_id: Option<Uuid>,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<SendOutcome, AppError> {
        let schedule = contractor.drip_schedule();
        let new = NewReviewRequest::new(contractor.id, contact.id, campaign_id, now, &schedule);
        let request = self.store.create_review_request(&new).await?;

        match self
            .dispatcher
            .send(contractor.id, contact.id, from, &contact.phone, body)
            .await
        {
            Ok(receipt) => {
                tracing::info!(
                    contractor_id = %contractor.id,
                    contact_id = %contact.id,
                    review_request_id = %request.id,
                    sid = %receipt.sid,
                    "Pedido de review enviado"
                );
                Ok(SendOutcome::Sent(request))
            }
            Err(e) => {
                tracing::warn!(
                    review_request_id = %request.id,
                    error = %e,
                    "Envio falhou; pedido encerrado sem retry"
                );
                let stopped = self
                    .apply_event(&request, ReviewEvent::SendFailed, now, contractor)
                    .await?
                    .unwrap_or(request);
                Ok(SendOutcome::Failed(stopped))
            }
        }
    }

    /// Aplica o evento e grava com compare-and-set.
    /// `None` quando outro ator mudou o pedido primeiro.
    pub async fn apply_event(
        &self,
        request: &ReviewRequest,
        event: ReviewEvent,
        now: DateTime<Utc>,
        contractor: &ContractorConfig,
    ) -> Result<Option<ReviewRequest>, AppError> {
        let next = request.apply(event, now, &contractor.drip_schedule())?;
        let saved = self.store.save_transition(&next, request.status).await?;

        if saved.is_none() {
            tracing::info!(
                review_request_id = %request.id,
                expected = request.status.as_str(),
                event = event.name(),
                "Transição descartada: pedido alterado por outro processo"
            );
        }
        Ok(saved)
    }

    pub async fn record_event(&self, contractor_id: Uuid, event: AnalyticsEvent, metadata: serde_json::Value) {
        if let Err(e) = self.store.record_event(contractor_id, event, metadata).await {
            tracing::warn!(%contractor_id, event = event.as_str(), error = %e, "Falha ao registrar evento de analytics");
        }
    }

    // =========================================================================
    //  ENVIO AVULSO (PAINEL)
    // =========================================================================

    pub async fn send_single(
        &self,
        contractor_id: Uuid,
        contact_id: Uuid,
        campaign_id: Option<Uuid>,
    ) -> Result<ReviewRequest, AppError> {
        let contractor = self.load_contractor(contractor_id).await?;
        let from = contractor.ensure_can_request_reviews(false)?.to_string();

        let contact = self
            .store
            .get_contact(contractor_id, contact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Contact not found".into()))?;

        if contact.opted_out {
            return Err(AppError::InvalidInput("Contact has opted out of messages".into()));
        }

        if let Some(campaign_id) = campaign_id {
            if self.store.get_campaign(contractor_id, campaign_id).await?.is_none() {
                return Err(AppError::NotFound("Campaign not found".into()));
            }
        }

        if self.store.find_active_request(contractor_id, contact_id).await?.is_some() {
            return Err(AppError::ActiveRequestExists);
        }

        let body = templates::render_for(&contractor, &contact, TemplatePurpose::ReviewRequest);
        let now = Utc::now();

        match self
            .open_request(&contractor, &from, &contact, campaign_id, &body, now)
            .await?
        {
            SendOutcome::Sent(request) => {
                if let Some(campaign_id) = campaign_id {
                    let delta = CampaignCounters { sent: 1, ..Default::default() };
                    if let Err(e) = self
                        .store
                        .increment_campaign_counters(contractor_id, campaign_id, delta)
                        .await
                    {
                        tracing::warn!(%campaign_id, error = %e, "Falha ao atualizar contadores da campanha");
                    }
                }
                self.record_event(
                    contractor_id,
                    AnalyticsEvent::ReviewRequestSent,
                    json!({
                        "contact_id": contact.id,
                        "review_request_id": request.id,
                        "campaign_id": campaign_id,
                    }),
                )
                .await;
                Ok(request)
            }
            SendOutcome::Failed(_) => Err(AppError::Dispatch(format!("send to contact {contact_id} failed"))),
        }
    }

    // =========================================================================
    //  WEBHOOK EXTERNO (TRIGGER)
    // =========================================================================

    pub async fn trigger_review(&self, contractor_id: Uuid, input: TriggerReview) -> Result<TriggerOutcome, AppError> {
        let phone = normalize_e164(&input.contact_phone)
            .ok_or_else(|| AppError::InvalidInput("Invalid phone number format".into()))?;

        let contractor = self.load_contractor(contractor_id).await?;
        let from = contractor.ensure_can_request_reviews(true)?.to_string();

        let source = input
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let contact = self.find_or_create_contact(contractor_id, &phone, &input, source).await?;

        if contact.opted_out {
            return Err(AppError::InvalidInput("Contact has opted out of messages".into()));
        }

        if self.store.find_active_request(contractor_id, contact.id).await?.is_some() {
            return Ok(TriggerOutcome::Skipped {
                contact_id: contact.id,
                reason: SkipReason::Pending,
            });
        }

        let now = Utc::now();
        if self
            .store
            .has_request_since(contractor_id, contact.id, now - self.cooldown)
            .await?
        {
            return Ok(TriggerOutcome::Skipped {
                contact_id: contact.id,
                reason: SkipReason::Cooldown,
            });
        }

        let template = templates::trigger_template(&contractor, input.job_type.as_deref(), input.tech_name.as_deref());
        let mut vars = standard_vars(&contractor, &contact);
        if let Some(job_type) = &input.job_type {
            vars.insert("job_type", job_type.clone());
        }
        if let Some(tech_name) = &input.tech_name {
            vars.insert("tech_name", tech_name.clone());
        }
        let body = render(template, &vars);

        let request = match self.open_request(&contractor, &from, &contact, None, &body, now).await {
            Ok(SendOutcome::Sent(request)) => request,
            Ok(SendOutcome::Failed(_)) => {
                return Err(AppError::Dispatch(format!("send to contact {} failed", contact.id)));
            }
            // Outra entrega do mesmo webhook ganhou a corrida.
            Err(AppError::ActiveRequestExists) => {
                return Ok(TriggerOutcome::Skipped {
                    contact_id: contact.id,
                    reason: SkipReason::Pending,
                });
            }
            Err(e) => return Err(e),
        };

        self.record_event(
            contractor_id,
            AnalyticsEvent::ReviewRequestSent,
            json!({
                "contact_id": contact.id,
                "review_request_id": request.id,
                "source": source.unwrap_or("webhook"),
                "job_type": input.job_type,
                "tech_name": input.tech_name,
                "triggered_by": "webhook",
            }),
        )
        .await;

        Ok(TriggerOutcome::Sent {
            contact_id: contact.id,
            review_request_id: request.id,
        })
    }

    async fn find_or_create_contact(
        &self,
        contractor_id: Uuid,
        phone: &str,
        input: &TriggerReview,
        source: Option<&str>,
    ) -> Result<Contact, AppError> {
        let name = input.contact_name.trim();
        let email = input.contact_email.as_deref().filter(|e| !e.trim().is_empty());

        if let Some(mut existing) = self.store.find_contact_by_phone(contractor_id, phone).await? {
            if existing.name != name {
                self.store
                    .update_contact_identity(contractor_id, existing.id, name, email)
                    .await?;
                existing.name = name.to_string();
                if let Some(email) = email {
                    existing.email = Some(email.to_string());
                }
            }
            return Ok(existing);
        }

        let created = self
            .store
            .create_contact(&NewContact {
                contractor_id,
                name: name.to_string(),
                phone: phone.to_string(),
                email: email.map(str::to_string),
                source: "import".into(),
                tags: source.map(str::to_string).into_iter().collect(),
            })
            .await?;

        tracing::info!(%contractor_id, contact_id = %created.id, ?source, "Contato criado via webhook");
        Ok(created)
    }

    // =========================================================================
    //  RESPOSTA DO CLIENTE
    // =========================================================================

    /// Aplica a nota ao pedido ativo e devolve a resposta automática renderizada.
    /// `None` quando o pedido já tinha sido resolvido por outro processo.
    pub async fn record_reply(
        &self,
        contractor: &ContractorConfig,
        contact: &Contact,
        request: &ReviewRequest,
        rating: u8,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AppError> {
        let Some(saved) = self
            .apply_event(request, ReviewEvent::Reply { rating }, now, contractor)
            .await?
        else {
            return Ok(None);
        };

        let positive = saved.status == ReviewStatus::Reviewed;

        if let Some(campaign_id) = saved.campaign_id {
            let delta = CampaignCounters {
                replies: 1,
                reviews: i32::from(positive),
                ..Default::default()
            };
            if let Err(e) = self
                .store
                .increment_campaign_counters(contractor.id, campaign_id, delta)
                .await
            {
                tracing::warn!(%campaign_id, error = %e, "Falha ao atualizar contadores da campanha");
            }
        }

        let metadata = json!({
            "contact_id": contact.id,
            "review_request_id": saved.id,
            "rating": rating,
        });
        let (outcome_event, purpose) = if positive {
            (AnalyticsEvent::ReviewPositive, TemplatePurpose::ReviewPositive)
        } else {
            (AnalyticsEvent::ReviewNegative, TemplatePurpose::ReviewNegative)
        };
        self.record_event(contractor.id, outcome_event, metadata.clone()).await;
        self.record_event(contractor.id, AnalyticsEvent::ReviewReply, metadata).await;

        tracing::info!(
            contractor_id = %contractor.id,
            review_request_id = %saved.id,
            rating,
            status = saved.status.as_str(),
            "Resposta de review registrada"
        );

        Ok(Some(templates::render_for(contractor, contact, purpose)))
    }
}
