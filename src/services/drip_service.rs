// src/services/drip_service.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::DynStore,
    models::{
        analytics::AnalyticsEvent,
        contractor::TemplatePurpose,
        review::{ReviewEvent, ReviewRequest, ReviewStatus},
    },
    services::{review_service::ReviewService, templates},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DripTickReport {
    /// Lembretes enviados.
    pub processed: u32,
    pub errors: u32,
    /// Pedidos vencidos encontrados no scan.
    pub total: u32,
}

/// O que aconteceu com um pedido vencido.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DripResult {
    Reminded,
    Skipped,
    Failed,
}

#[derive(Clone)]
pub struct DripService {
    store: DynStore,
    reviews: ReviewService,
    batch_size: i64,
}

impl DripService {
    pub fn new(store: DynStore, reviews: ReviewService, batch_size: i64) -> Self {
        Self {
            store,
            reviews,
            batch_size,
        }
    }

    pub async fn process_tick(&self) -> Result<DripTickReport, AppError> {
        self.process_at(Utc::now()).await
    }

    pub async fn process_at(&self, now: DateTime<Utc>) -> Result<DripTickReport, AppError> {
        let due = self.store.list_due_drips(now, self.batch_size).await?;
        let mut report = DripTickReport {
            total: due.len() as u32,
            ..Default::default()
        };

        for request in &due {
            match self.process_request(request, now).await {
                Ok(DripResult::Reminded) => report.processed += 1,
                Ok(DripResult::Skipped) => {}
                Ok(DripResult::Failed) => report.errors += 1,
                Err(e) => {
                    tracing::error!(review_request_id = %request.id, error = %e, "Falha ao processar lembrete");
                    report.errors += 1;
                }
            }
        }

        if report.total > 0 {
            tracing::info!(
                processed = report.processed,
                errors = report.errors,
                total = report.total,
                "Tick de drip concluído"
            );
        }
        Ok(report)
    }

    async fn process_request(&self, request: &ReviewRequest, now: DateTime<Utc>) -> Result<DripResult, AppError> {
        let Some(contractor) = self.store.get_contractor(request.contractor_id).await? else {
            self.store.clear_next_drip(request.id).await?;
            return Ok(DripResult::Skipped);
        };

        let contact = self
            .store
            .get_contact(request.contractor_id, request.contact_id)
            .await?
            .filter(|c| !c.opted_out);

        let Some(contact) = contact else {
            self.reviews
                .apply_event(request, ReviewEvent::OptedOut, now, &contractor)
                .await?;
            return Ok(DripResult::Skipped);
        };

        // Drip desligado ou telefone removido depois do envio.
        let from = match contractor.sending_phone() {
            Some(phone) if contractor.feature_review_drip => phone.to_string(),
            _ => {
                self.store.clear_next_drip(request.id).await?;
                return Ok(DripResult::Skipped);
            }
        };

        // Reserva o passo antes de enviar: dois ticks concorrentes não mandam o mesmo lembrete.
        let Some(reminded) = self
            .reviews
            .apply_event(request, ReviewEvent::DripDue, now, &contractor)
            .await?
        else {
            return Ok(DripResult::Skipped);
        };

        let purpose = match reminded.status {
            ReviewStatus::Reminded1 => TemplatePurpose::ReviewReminder1,
            _ => TemplatePurpose::ReviewReminder2,
        };
        let body = templates::render_for(&contractor, &contact, purpose);

        match self
            .reviews
            .dispatcher()
            .send(contractor.id, contact.id, &from, &contact.phone, &body)
            .await
        {
            Ok(_) => {
                self.reviews
                    .record_event(
                        contractor.id,
                        AnalyticsEvent::ReviewReminderSent,
                        json!({
                            "contact_id": contact.id,
                            "review_request_id": reminded.id,
                            "drip_step": reminded.drip_step,
                        }),
                    )
                    .await;
                Ok(DripResult::Reminded)
            }
            Err(e) => {
                tracing::warn!(review_request_id = %reminded.id, error = %e, "Lembrete falhou; sequência encerrada");
                self.reviews
                    .apply_event(&reminded, ReviewEvent::SendFailed, now, &contractor)
                    .await?;
                Ok(DripResult::Failed)
            }
        }
    }
}
