// src/services/campaign_service.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DynStore, EligibilityQuery},
    models::{
        analytics::AnalyticsEvent,
        campaign::{CampaignCounters, CampaignStatus, ContactFilter, NewCampaign, ReviewCampaign},
        contractor::TemplatePurpose,
        review::ReviewRequest,
    },
    services::{
        review_service::{ReviewService, SendOutcome},
        templates,
    },
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignDetail {
    pub campaign: ReviewCampaign,
    pub requests: Vec<ReviewRequest>,
}

/// Resumo de um tick do scheduler de campanhas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CampaignTickReport {
    /// SMS enviados com sucesso.
    pub processed: u32,
    pub errors: u32,
    /// Campanhas examinadas neste tick.
    pub campaigns: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct CampaignSettings {
    pub fanout: i64,
    pub ticks_per_hour: u32,
}

#[derive(Clone)]
pub struct CampaignService {
    store: DynStore,
    reviews: ReviewService,
    settings: CampaignSettings,
}

impl CampaignService {
    pub fn new(store: DynStore, reviews: ReviewService, settings: CampaignSettings) -> Self {
        Self {
            store,
            reviews,
            settings,
        }
    }

    // =========================================================================
    //  1. GESTÃO (PAINEL)
    // =========================================================================

    pub async fn create_campaign(
        &self,
        contractor_id: Uuid,
        name: &str,
        contact_filter: ContactFilter,
        rate_limit_per_hour: i32,
    ) -> Result<ReviewCampaign, AppError> {
        let total = self
            .store
            .count_eligible_contacts(contractor_id, &contact_filter)
            .await?;

        if total == 0 {
            return Err(AppError::InvalidInput(
                "No contacts match the selected criteria".into(),
            ));
        }

        let campaign = self
            .store
            .create_campaign(&NewCampaign {
                contractor_id,
                name: name.trim().to_string(),
                contact_filter,
                rate_limit_per_hour,
                total_contacts: i32::try_from(total).unwrap_or(i32::MAX),
            })
            .await?;

        tracing::info!(%contractor_id, campaign_id = %campaign.id, total, "Campanha criada");
        Ok(campaign)
    }

    /// Prévia do painel: quantos contatos o filtro alcança hoje.
    pub async fn estimate(&self, contractor_id: Uuid, contact_filter: &ContactFilter) -> Result<i64, AppError> {
        self.store.count_eligible_contacts(contractor_id, contact_filter).await
    }

    pub async fn list_campaigns(&self, contractor_id: Uuid) -> Result<Vec<ReviewCampaign>, AppError> {
        self.store.list_campaigns(contractor_id).await
    }

    async fn find_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<ReviewCampaign, AppError> {
        self.store
            .get_campaign(contractor_id, campaign_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Campaign not found".into()))
    }

    pub async fn get_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<CampaignDetail, AppError> {
        let campaign = self.find_campaign(contractor_id, campaign_id).await?;
        let requests = self
            .store
            .list_campaign_requests(contractor_id, campaign_id)
            .await?;
        Ok(CampaignDetail { campaign, requests })
    }

    pub async fn start_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<CampaignStatus, AppError> {
        let campaign = self.find_campaign(contractor_id, campaign_id).await?;
        let next = campaign.status.start()?;
        self.change_status(&campaign, next).await?;
        self.reviews
            .record_event(
                contractor_id,
                AnalyticsEvent::BlastStarted,
                json!({ "campaign_id": campaign_id }),
            )
            .await;

        tracing::info!(%contractor_id, %campaign_id, "▶️ Campanha iniciada");
        Ok(next)
    }

    pub async fn pause_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<CampaignStatus, AppError> {
        let campaign = self.find_campaign(contractor_id, campaign_id).await?;
        let next = campaign.status.pause()?;
        self.change_status(&campaign, next).await?;
        Ok(next)
    }

    async fn change_status(&self, campaign: &ReviewCampaign, next: CampaignStatus) -> Result<(), AppError> {
        let changed = self
            .store
            .set_campaign_status(campaign.contractor_id, campaign.id, campaign.status, next, Utc::now())
            .await?;
        if !changed {
            return Err(AppError::Conflict("Campaign status changed, reload and try again".into()));
        }
        Ok(())
    }

    pub async fn delete_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<(), AppError> {
        let campaign = self.find_campaign(contractor_id, campaign_id).await?;
        if campaign.status == CampaignStatus::Sending {
            return Err(AppError::InvalidInput(
                "Cannot delete a campaign that is currently sending".into(),
            ));
        }

        if !self.store.delete_campaign(contractor_id, campaign_id).await? {
            return Err(AppError::NotFound("Campaign not found".into()));
        }
        Ok(())
    }

    // =========================================================================
    //  2. TICK DO SCHEDULER
    // =========================================================================

    pub async fn process_tick(&self) -> Result<CampaignTickReport, AppError> {
        self.process_tick_at(Utc::now()).await
    }

    /// Processa até `fanout` campanhas em `sending`, cada uma dentro do seu orçamento.
    /// Erros de uma campanha não interrompem as demais.
    pub async fn process_tick_at(&self, now: DateTime<Utc>) -> Result<CampaignTickReport, AppError> {
        let campaigns = self.store.list_sending_campaigns(self.settings.fanout).await?;
        let mut report = CampaignTickReport {
            campaigns: campaigns.len() as u32,
            ..Default::default()
        };

        for campaign in &campaigns {
            match self.process_campaign(campaign, now).await {
                Ok((sent, errors)) => {
                    report.processed += sent;
                    report.errors += errors;
                }
                Err(e) => {
                    tracing::error!(campaign_id = %campaign.id, error = %e, "Falha ao processar campanha");
                    report.errors += 1;
                }
            }
        }

        if report.campaigns > 0 {
            tracing::info!(
                processed = report.processed,
                errors = report.errors,
                campaigns = report.campaigns,
                "Tick de campanhas concluído"
            );
        }
        Ok(report)
    }

    async fn process_campaign(&self, campaign: &ReviewCampaign, now: DateTime<Utc>) -> Result<(u32, u32), AppError> {
        let contractor = self.store.get_contractor(campaign.contractor_id).await?;

        // Contractor sem condições de enviar: pausa até alguém corrigir.
        let Some((contractor, from)) = contractor.and_then(|c| {
            let from = c.sending_phone()?.to_string();
            c.feature_review_automation.then_some((c, from))
        }) else {
            tracing::warn!(campaign_id = %campaign.id, "Contractor sem telefone ou automação; campanha pausada");
            self.finish_tick_status(campaign, CampaignStatus::Paused, now).await?;
            return Ok((0, 0));
        };

        let budget = campaign.tick_budget(self.settings.ticks_per_hour);
        let filter = &campaign.contact_filter.0;
        let contacts = self
            .store
            .eligible_contacts(
                campaign.contractor_id,
                &EligibilityQuery {
                    filter,
                    campaign_id: Some(campaign.id),
                    limit: Some(budget as i64),
                },
            )
            .await?;

        if contacts.is_empty() {
            if self.finish_tick_status(campaign, CampaignStatus::Completed, now).await? {
                tracing::info!(campaign_id = %campaign.id, sent = campaign.sent_count, "✅ Campanha concluída");
            }
            return Ok((0, 0));
        }

        let mut sent = 0u32;
        let mut errors = 0u32;

        for contact in &contacts {
            let body = templates::render_for(&contractor, contact, TemplatePurpose::ReviewBlast);

            match self
                .reviews
                .open_request(&contractor, &from, contact, Some(campaign.id), &body, now)
                .await
            {
                Ok(SendOutcome::Sent(request)) => {
                    sent += 1;
                    self.reviews
                        .record_event(
                            campaign.contractor_id,
                            AnalyticsEvent::ReviewRequestSent,
                            json!({
                                "contact_id": contact.id,
                                "review_request_id": request.id,
                                "campaign_id": campaign.id,
                            }),
                        )
                        .await;
                }
                Ok(SendOutcome::Failed(_)) => errors += 1,
                // Ganhou um pedido ativo entre a seleção e a inserção.
                Err(AppError::ActiveRequestExists) => {
                    tracing::debug!(contact_id = %contact.id, "Contato já tem pedido ativo; pulando");
                }
                Err(e) => {
                    tracing::error!(campaign_id = %campaign.id, contact_id = %contact.id, error = %e, "Falha ao abrir pedido");
                    errors += 1;
                }
            }
        }

        if sent > 0 {
            self.store
                .increment_campaign_counters(
                    campaign.contractor_id,
                    campaign.id,
                    CampaignCounters {
                        sent: sent as i32,
                        ..Default::default()
                    },
                )
                .await?;
        }

        Ok((sent, errors))
    }

    /// Só sai de `sending`: uma pausa manual durante o tick prevalece.
    async fn finish_tick_status(
        &self,
        campaign: &ReviewCampaign,
        next: CampaignStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let changed = self
            .store
            .set_campaign_status(campaign.contractor_id, campaign.id, CampaignStatus::Sending, next, now)
            .await?;
        if !changed {
            tracing::info!(campaign_id = %campaign.id, "Status da campanha mudou durante o tick; mantido");
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        models::review::ReviewStatus,
        test_utils::{Harness, ScriptedGateway},
    };

    fn service(h: &Harness) -> CampaignService {
        let reviews = ReviewService::new(h.store.clone(), h.dispatcher(), 90);
        CampaignService::new(
            h.store.clone(),
            reviews,
            CampaignSettings {
                fanout: 10,
                ticks_per_hour: 12,
            },
        )
    }

    fn excluding_reviewed() -> ContactFilter {
        ContactFilter {
            exclude_reviewed: true,
            exclude_pending: true,
            ..Default::default()
        }
    }

    /// 10 contatos: 3 opt-out, 2 com pedido ativo, 1 já avaliou. Sobram 4.
    fn seed_ten_contacts(h: &Harness) -> Vec<crate::models::contact::Contact> {
        let base = Utc::now() - Duration::days(60);
        (0..10)
            .map(|i| {
                let contact = h.add_contact_with(
                    &format!("Customer {i}"),
                    &format!("+1555000{i:04}"),
                    base + Duration::minutes(i),
                    |c| {
                        c.opted_out = i < 3;
                        c.has_left_review = i == 5;
                    },
                );
                if i == 3 || i == 4 {
                    h.add_request(&contact, ReviewStatus::Sent, base, None);
                }
                contact
            })
            .collect()
    }

    #[tokio::test]
    async fn create_counts_only_eligible_contacts() {
        let h = Harness::new();
        seed_ten_contacts(&h);

        let campaign = service(&h)
            .create_campaign(h.tenant(), "Spring blast", excluding_reviewed(), 20)
            .await
            .unwrap();

        assert_eq!(campaign.total_contacts, 4);
        assert_eq!(campaign.status, CampaignStatus::Draft);
    }

    #[tokio::test]
    async fn estimate_matches_campaign_total() {
        let h = Harness::new();
        seed_ten_contacts(&h);
        let svc = service(&h);

        assert_eq!(svc.estimate(h.tenant(), &excluding_reviewed()).await.unwrap(), 4);
        // Sem filtro só o opt-out e o pedido ativo tiram contatos
        assert_eq!(svc.estimate(h.tenant(), &ContactFilter::default()).await.unwrap(), 5);
        assert_eq!(svc.estimate(Uuid::new_v4(), &ContactFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_without_matching_contacts_is_rejected() {
        let h = Harness::new();
        h.add_contact_with("Opted", "+15550000001", Utc::now(), |c| c.opted_out = true);

        let err = service(&h)
            .create_campaign(h.tenant(), "Empty", ContactFilter::default(), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn tick_sends_budget_in_stable_order() {
        let h = Harness::new();
        let contacts = seed_ten_contacts(&h);
        // 24/h com ticks de 5 min = 2 por tick
        let campaign = h.add_campaign(CampaignStatus::Sending, excluding_reviewed(), 24);
        let svc = service(&h);

        let report = svc.process_tick_at(Utc::now()).await.unwrap();
        assert_eq!(report, CampaignTickReport { processed: 2, errors: 0, campaigns: 1 });

        let targeted: Vec<_> = h
            .store
            .requests()
            .into_iter()
            .filter(|r| r.campaign_id == Some(campaign.id))
            .map(|r| r.contact_id)
            .collect();
        assert_eq!(targeted, vec![contacts[6].id, contacts[7].id]);
        assert_eq!(h.store.campaign(campaign.id).unwrap().sent_count, 2);

        // Próximo tick pega os dois restantes; o seguinte completa a campanha.
        svc.process_tick_at(Utc::now()).await.unwrap();
        let last = svc.process_tick_at(Utc::now()).await.unwrap();
        assert_eq!(last.processed, 0);

        let stored = h.store.campaign(campaign.id).unwrap();
        assert_eq!(stored.status, CampaignStatus::Completed);
        assert!(stored.completed_at.is_some());
        assert_eq!(stored.sent_count, 4);

        // Contatos excluídos nunca receberam nada.
        for excluded in &contacts[..6] {
            assert!(h.gateway.sent_to(&excluded.phone).is_empty());
        }
        h.store.assert_single_active_per_contact();
    }

    #[tokio::test]
    async fn send_failure_stops_only_that_request() {
        let h = Harness::with_gateway(ScriptedGateway::failing_for(&["+15550000001"]));
        let a = h.add_contact_with("Alice", "+15550000001", Utc::now() - Duration::days(2), |_| {});
        let b = h.add_contact_with("Bob", "+15550000002", Utc::now() - Duration::days(1), |_| {});
        let campaign = h.add_campaign(CampaignStatus::Sending, ContactFilter::default(), 120);

        let report = service(&h).process_tick_at(Utc::now()).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.errors, 1);

        let status_of = |contact_id: Uuid| {
            h.store
                .requests()
                .into_iter()
                .find(|r| r.contact_id == contact_id)
                .map(|r| r.status)
        };
        assert_eq!(status_of(a.id), Some(ReviewStatus::Stopped));
        assert_eq!(status_of(b.id), Some(ReviewStatus::Sent));
        assert_eq!(h.store.campaign(campaign.id).unwrap().sent_count, 1);

        // O contato que falhou não é tentado de novo por esta campanha.
        service(&h).process_tick_at(Utc::now()).await.unwrap();
        assert_eq!(h.gateway.attempts(), 2);
    }

    #[tokio::test]
    async fn misconfigured_contractor_pauses_campaign() {
        let h = Harness::new();
        h.add_contact("Alice", "+15550000001");
        h.update_contractor(|c| c.phone_number = None);
        let campaign = h.add_campaign(CampaignStatus::Sending, ContactFilter::default(), 20);

        let report = service(&h).process_tick_at(Utc::now()).await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(h.store.campaign(campaign.id).unwrap().status, CampaignStatus::Paused);
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn manual_pause_during_tick_is_not_overwritten() {
        let h = Harness::new();
        let campaign = h.add_campaign(CampaignStatus::Sending, ContactFilter::default(), 20);

        // O tick leu a campanha em `sending`; o painel pausou logo depois.
        h.store.with(|d| d.campaigns[0].status = CampaignStatus::Paused);
        service(&h).process_campaign(&campaign, Utc::now()).await.unwrap();

        let stored = h.store.campaign(campaign.id).unwrap();
        assert_eq!(stored.status, CampaignStatus::Paused);
        assert!(stored.completed_at.is_none());
    }

    #[tokio::test]
    async fn tag_filter_uses_or_semantics() {
        let h = Harness::new();
        h.add_contact_with("Hvac", "+15550000001", Utc::now(), |c| c.tags = vec!["hvac".into()]);
        h.add_contact_with("Plumb", "+15550000002", Utc::now(), |c| c.tags = vec!["plumbing".into()]);
        h.add_contact_with("None", "+15550000003", Utc::now(), |_| {});

        let filter = ContactFilter {
            tags: vec!["hvac".into(), "plumbing".into()],
            ..Default::default()
        };
        let campaign = service(&h)
            .create_campaign(h.tenant(), "Tagged", filter, 20)
            .await
            .unwrap();
        assert_eq!(campaign.total_contacts, 2);
    }

    #[tokio::test]
    async fn store_outage_is_counted_and_tick_continues() {
        let h = Harness::new();
        h.add_contact("Alice", "+15550000001");
        h.add_campaign(CampaignStatus::Sending, ContactFilter::default(), 20);
        *h.store.fail_request_writes.lock().unwrap() = true;

        let report = service(&h).process_tick_at(Utc::now()).await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.errors, 1);
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn manual_lifecycle_actions() {
        let h = Harness::new();
        h.add_contact("Alice", "+15550000001");
        let svc = service(&h);
        let campaign = svc
            .create_campaign(h.tenant(), "Blast", ContactFilter::default(), 20)
            .await
            .unwrap();

        assert_eq!(svc.start_campaign(h.tenant(), campaign.id).await.unwrap(), CampaignStatus::Sending);
        assert!(h.store.campaign(campaign.id).unwrap().started_at.is_some());
        assert!(h.store.event_types().contains(&"blast_started"));

        let err = svc.delete_campaign(h.tenant(), campaign.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        assert_eq!(svc.pause_campaign(h.tenant(), campaign.id).await.unwrap(), CampaignStatus::Paused);
        svc.delete_campaign(h.tenant(), campaign.id).await.unwrap();

        let err = svc.get_campaign(h.tenant(), campaign.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn other_tenants_cannot_see_campaign() {
        let h = Harness::new();
        let campaign = h.add_campaign(CampaignStatus::Draft, ContactFilter::default(), 20);

        let err = service(&h).get_campaign(Uuid::new_v4(), campaign.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
