// src/test_utils.rs

// Fixtures compartilhadas pelos testes de serviço e de handler.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::memory::MemoryStore,
    models::{
        campaign::{CampaignStatus, ContactFilter, ReviewCampaign},
        contact::Contact,
        contractor::{tests::contractor, ContractorConfig},
        review::{ReviewRequest, ReviewStatus},
    },
    services::dispatcher::{Dispatcher, OutboundSms, SmsGateway, SmsReceipt},
};

/// Gateway falso: aceita tudo, exceto os números configurados para falhar.
#[derive(Default)]
pub struct ScriptedGateway {
    failing: Vec<String>,
    delay: Option<Duration>,
    attempts: AtomicUsize,
    sent: Mutex<Vec<OutboundSms>>,
}

impl ScriptedGateway {
    pub fn failing_for(numbers: &[&str]) -> Self {
        Self {
            failing: numbers.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutboundSms> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, phone: &str) -> Vec<OutboundSms> {
        self.sent().into_iter().filter(|s| s.to == phone).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SmsGateway for ScriptedGateway {
    async fn send_sms(&self, sms: &OutboundSms) -> Result<SmsReceipt, AppError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&sms.to) {
            return Err(AppError::Dispatch(format!("carrier rejected {}", sms.to)));
        }
        self.sent.lock().unwrap().push(sms.clone());
        Ok(SmsReceipt {
            sid: format!("SM{attempt:04}"),
            status: "queued".into(),
        })
    }
}

/// Store + gateway + contractor já cadastrado.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub contractor: ContractorConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_gateway(ScriptedGateway::default())
    }

    pub fn with_gateway(gateway: ScriptedGateway) -> Self {
        let store = Arc::new(MemoryStore::new());
        let contractor = contractor();
        store.add_contractor(contractor.clone());
        Self {
            store,
            gateway: Arc::new(gateway),
            contractor,
        }
    }

    pub fn tenant(&self) -> Uuid {
        self.contractor.id
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.gateway.clone(),
            self.store.clone(),
            Duration::from_secs(1),
            "https://app.example.com",
        )
    }

    /// Altera o contractor já gravado no store.
    pub fn update_contractor(&self, f: impl FnOnce(&mut ContractorConfig)) {
        let id = self.tenant();
        self.store.with(|d| {
            if let Some(c) = d.contractors.iter_mut().find(|c| c.id == id) {
                f(c);
            }
        });
    }

    pub fn add_contact(&self, name: &str, phone: &str) -> Contact {
        let created_at = Utc::now() - chrono::Duration::days(30);
        self.add_contact_with(name, phone, created_at, |_| {})
    }

    pub fn add_contact_with(
        &self,
        name: &str,
        phone: &str,
        created_at: DateTime<Utc>,
        f: impl FnOnce(&mut Contact),
    ) -> Contact {
        let mut c = Contact {
            id: Uuid::new_v4(),
            contractor_id: self.tenant(),
            name: name.into(),
            phone: phone.into(),
            email: None,
            source: "manual".into(),
            opted_out: false,
            has_left_review: false,
            tags: vec![],
            last_contacted_at: None,
            created_at,
            updated_at: created_at,
        };
        f(&mut c);
        self.store.add_contact(c.clone());
        c
    }

    pub fn add_campaign(&self, status: CampaignStatus, filter: ContactFilter, rate: i32) -> ReviewCampaign {
        let now = Utc::now();
        let campaign = ReviewCampaign {
            id: Uuid::new_v4(),
            contractor_id: self.tenant(),
            name: "Spring blast".into(),
            status,
            contact_filter: Json(filter),
            rate_limit_per_hour: rate,
            total_contacts: 0,
            sent_count: 0,
            reply_count: 0,
            review_count: 0,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.add_campaign(campaign.clone());
        campaign
    }

    /// Pedido já existente, gravado direto no store.
    pub fn add_request(
        &self,
        contact: &Contact,
        status: ReviewStatus,
        sent_at: DateTime<Utc>,
        next_drip_at: Option<DateTime<Utc>>,
    ) -> ReviewRequest {
        let request = ReviewRequest {
            id: Uuid::new_v4(),
            contractor_id: self.tenant(),
            contact_id: contact.id,
            campaign_id: None,
            status,
            rating: None,
            drip_step: match status {
                ReviewStatus::Reminded1 => 1,
                ReviewStatus::Reminded2 => 2,
                _ => 0,
            },
            next_drip_at,
            sent_at,
            replied_at: None,
            clicked_at: None,
            reviewed_at: None,
            created_at: sent_at,
            updated_at: sent_at,
        };
        self.store.insert_request(request.clone());
        request
    }
}
