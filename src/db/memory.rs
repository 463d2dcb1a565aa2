// src/db/memory.rs

// Store em memória para os testes dos serviços. Reproduz as mesmas regras
// do Postgres (índice parcial de pedido ativo, dedupe por sid, contadores).

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{EligibilityQuery, ReviewStore},
    models::{
        analytics::AnalyticsEvent,
        campaign::{CampaignCounters, CampaignStatus, ContactFilter, NewCampaign, ReviewCampaign},
        contact::{Contact, MessageDirection, NewContact, NewMessage},
        contractor::ContractorConfig,
        review::{NewReviewRequest, ReviewRequest, ReviewStatus},
    },
};

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub contractor_id: Uuid,
    pub contact_id: Uuid,
    pub direction: MessageDirection,
    pub body: String,
    pub provider_sid: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct StoredConversation {
    pub id: Uuid,
    pub contractor_id: Uuid,
    pub contact_id: Uuid,
    pub unread_count: i32,
    pub last_message_preview: String,
}

#[derive(Default)]
pub struct MemoryData {
    pub contractors: Vec<ContractorConfig>,
    pub contacts: Vec<Contact>,
    pub requests: Vec<ReviewRequest>,
    pub campaigns: Vec<ReviewCampaign>,
    pub conversations: Vec<StoredConversation>,
    pub messages: Vec<StoredMessage>,
    pub events: Vec<(Uuid, &'static str, Value)>,
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
    /// Quando ligado, toda escrita de pedido falha (simula queda do banco).
    pub fail_request_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MemoryData) -> R) -> R {
        let mut data = self.data.lock().expect("memory store poisoned");
        f(&mut data)
    }

    pub fn add_contractor(&self, contractor: ContractorConfig) {
        self.with(|d| d.contractors.push(contractor));
    }

    pub fn add_contact(&self, contact: Contact) {
        self.with(|d| d.contacts.push(contact));
    }

    pub fn add_campaign(&self, campaign: ReviewCampaign) {
        self.with(|d| d.campaigns.push(campaign));
    }

    pub fn insert_request(&self, request: ReviewRequest) {
        self.with(|d| d.requests.push(request));
    }

    pub fn requests(&self) -> Vec<ReviewRequest> {
        self.with(|d| d.requests.clone())
    }

    pub fn request(&self, id: Uuid) -> Option<ReviewRequest> {
        self.with(|d| d.requests.iter().find(|r| r.id == id).cloned())
    }

    pub fn campaign(&self, id: Uuid) -> Option<ReviewCampaign> {
        self.with(|d| d.campaigns.iter().find(|c| c.id == id).cloned())
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.with(|d| d.contacts.clone())
    }

    pub fn messages(&self) -> Vec<StoredMessage> {
        self.with(|d| d.messages.clone())
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.with(|d| d.events.iter().map(|(_, t, _)| *t).collect())
    }

    /// Verifica a regra central: no máximo um pedido ativo por contato.
    pub fn assert_single_active_per_contact(&self) {
        self.with(|d| {
            for contact in &d.contacts {
                let active = d
                    .requests
                    .iter()
                    .filter(|r| r.contact_id == contact.id && r.status.is_active())
                    .count();
                assert!(active <= 1, "contato {} com {} pedidos ativos", contact.id, active);
            }
        });
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if *self.fail_request_writes.lock().expect("memory store poisoned") {
            return Err(AppError::InternalServerError(anyhow::anyhow!("simulated store outage")));
        }
        Ok(())
    }
}

fn is_eligible(d: &MemoryData, contact: &Contact, contractor_id: Uuid, filter: &ContactFilter, campaign_id: Option<Uuid>) -> bool {
    if contact.contractor_id != contractor_id || contact.opted_out {
        return false;
    }
    if !filter.tags.is_empty() && !contact.tags.iter().any(|t| filter.tags.contains(t)) {
        return false;
    }
    if filter.exclude_reviewed && contact.has_left_review {
        return false;
    }
    let targeted = campaign_id.is_some_and(|cid| {
        d.requests
            .iter()
            .any(|r| r.campaign_id == Some(cid) && r.contact_id == contact.id)
    });
    let active = d.requests.iter().any(|r| {
        r.contractor_id == contractor_id && r.contact_id == contact.id && r.status.is_active()
    });
    !targeted && !active
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn get_contractor(&self, contractor_id: Uuid) -> Result<Option<ContractorConfig>, AppError> {
        Ok(self.with(|d| d.contractors.iter().find(|c| c.id == contractor_id).cloned()))
    }

    async fn get_contact(&self, contractor_id: Uuid, contact_id: Uuid) -> Result<Option<Contact>, AppError> {
        Ok(self.with(|d| {
            d.contacts
                .iter()
                .find(|c| c.contractor_id == contractor_id && c.id == contact_id)
                .cloned()
        }))
    }

    async fn find_contact_by_phone(&self, contractor_id: Uuid, phone: &str) -> Result<Option<Contact>, AppError> {
        Ok(self.with(|d| {
            d.contacts
                .iter()
                .find(|c| c.contractor_id == contractor_id && c.phone == phone)
                .cloned()
        }))
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact, AppError> {
        Ok(self.with(|d| {
            if let Some(existing) = d
                .contacts
                .iter()
                .find(|c| c.contractor_id == contact.contractor_id && c.phone == contact.phone)
            {
                return existing.clone();
            }
            let now = Utc::now();
            let created = Contact {
                id: Uuid::new_v4(),
                contractor_id: contact.contractor_id,
                name: contact.name.clone(),
                phone: contact.phone.clone(),
                email: contact.email.clone(),
                source: contact.source.clone(),
                opted_out: false,
                has_left_review: false,
                tags: contact.tags.clone(),
                last_contacted_at: None,
                created_at: now,
                updated_at: now,
            };
            d.contacts.push(created.clone());
            created
        }))
    }

    async fn update_contact_identity(
        &self,
        contractor_id: Uuid,
        contact_id: Uuid,
        name: &str,
        email: Option<&str>,
    ) -> Result<(), AppError> {
        self.with(|d| {
            if let Some(c) = d
                .contacts
                .iter_mut()
                .find(|c| c.contractor_id == contractor_id && c.id == contact_id)
            {
                c.name = name.to_string();
                if let Some(email) = email {
                    c.email = Some(email.to_string());
                }
            }
        });
        Ok(())
    }

    async fn touch_contact(&self, contractor_id: Uuid, contact_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        self.with(|d| {
            if let Some(c) = d
                .contacts
                .iter_mut()
                .find(|c| c.contractor_id == contractor_id && c.id == contact_id)
            {
                c.last_contacted_at = Some(at);
            }
        });
        Ok(())
    }

    async fn eligible_contacts(&self, contractor_id: Uuid, query: &EligibilityQuery<'_>) -> Result<Vec<Contact>, AppError> {
        Ok(self.with(|d| {
            let d: &MemoryData = d;
            let mut eligible: Vec<Contact> = d
                .contacts
                .iter()
                .filter(|c| is_eligible(d, c, contractor_id, query.filter, query.campaign_id))
                .cloned()
                .collect();
            eligible.sort_by_key(|c| (c.created_at, c.id));
            if let Some(limit) = query.limit {
                eligible.truncate(limit.max(0) as usize);
            }
            eligible
        }))
    }

    async fn count_eligible_contacts(&self, contractor_id: Uuid, filter: &ContactFilter) -> Result<i64, AppError> {
        Ok(self.with(|d| {
            let d: &MemoryData = d;
            d.contacts
                .iter()
                .filter(|c| is_eligible(d, c, contractor_id, filter, None))
                .count() as i64
        }))
    }

    async fn upsert_conversation(
        &self,
        contractor_id: Uuid,
        contact_id: Uuid,
        preview: &str,
        _at: DateTime<Utc>,
    ) -> Result<Uuid, AppError> {
        Ok(self.with(|d| {
            let preview: String = preview.chars().take(100).collect();
            if let Some(conv) = d
                .conversations
                .iter_mut()
                .find(|c| c.contractor_id == contractor_id && c.contact_id == contact_id)
            {
                conv.unread_count += 1;
                conv.last_message_preview = preview;
                return conv.id;
            }
            let id = Uuid::new_v4();
            d.conversations.push(StoredConversation {
                id,
                contractor_id,
                contact_id,
                unread_count: 1,
                last_message_preview: preview,
            });
            id
        }))
    }

    async fn has_message(&self, contractor_id: Uuid, provider_sid: &str) -> Result<bool, AppError> {
        Ok(self.with(|d| {
            d.messages.iter().any(|m| {
                m.contractor_id == contractor_id && m.provider_sid.as_deref() == Some(provider_sid)
            })
        }))
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<bool, AppError> {
        Ok(self.with(|d| {
            let duplicate = message.provider_sid.as_ref().is_some_and(|sid| {
                d.messages.iter().any(|m| {
                    m.contractor_id == message.contractor_id && m.provider_sid.as_ref() == Some(sid)
                })
            });
            if duplicate {
                return false;
            }
            d.messages.push(StoredMessage {
                contractor_id: message.contractor_id,
                contact_id: message.contact_id,
                direction: message.direction,
                body: message.body.clone(),
                provider_sid: message.provider_sid.clone(),
                status: message.status.clone(),
            });
            true
        }))
    }

    async fn update_message_status(
        &self,
        contractor_id: Uuid,
        provider_sid: &str,
        status: &str,
        _error_code: Option<&str>,
    ) -> Result<(), AppError> {
        self.with(|d| {
            for m in d.messages.iter_mut().filter(|m| {
                m.contractor_id == contractor_id && m.provider_sid.as_deref() == Some(provider_sid)
            }) {
                m.status = status.to_string();
            }
        });
        Ok(())
    }

    async fn create_review_request(&self, request: &NewReviewRequest) -> Result<ReviewRequest, AppError> {
        self.check_writable()?;
        self.with(|d| {
            let already_active = d.requests.iter().any(|r| {
                r.contractor_id == request.contractor_id
                    && r.contact_id == request.contact_id
                    && r.status.is_active()
            });
            if already_active {
                return Err(AppError::ActiveRequestExists);
            }
            let created = ReviewRequest {
                id: Uuid::new_v4(),
                contractor_id: request.contractor_id,
                contact_id: request.contact_id,
                campaign_id: request.campaign_id,
                status: ReviewStatus::Sent,
                rating: None,
                drip_step: 0,
                next_drip_at: request.next_drip_at,
                sent_at: request.sent_at,
                replied_at: None,
                clicked_at: None,
                reviewed_at: None,
                created_at: request.sent_at,
                updated_at: request.sent_at,
            };
            d.requests.push(created.clone());
            Ok(created)
        })
    }

    async fn find_active_request(&self, contractor_id: Uuid, contact_id: Uuid) -> Result<Option<ReviewRequest>, AppError> {
        Ok(self.with(|d| {
            d.requests
                .iter()
                .filter(|r| r.contractor_id == contractor_id && r.contact_id == contact_id && r.status.is_active())
                .max_by_key(|r| r.created_at)
                .cloned()
        }))
    }

    async fn has_request_since(&self, contractor_id: Uuid, contact_id: Uuid, since: DateTime<Utc>) -> Result<bool, AppError> {
        Ok(self.with(|d| {
            d.requests.iter().any(|r| {
                r.contractor_id == contractor_id && r.contact_id == contact_id && r.created_at >= since
            })
        }))
    }

    async fn save_transition(
        &self,
        next: &ReviewRequest,
        expected: ReviewStatus,
    ) -> Result<Option<ReviewRequest>, AppError> {
        self.check_writable()?;
        Ok(self.with(|d| {
            let current = d.requests.iter_mut().find(|r| r.id == next.id)?;
            if current.status != expected {
                return None;
            }
            current.status = next.status;
            current.rating = next.rating;
            current.drip_step = next.drip_step;
            current.next_drip_at = next.next_drip_at;
            current.replied_at = next.replied_at;
            current.reviewed_at = next.reviewed_at;
            current.updated_at = next.updated_at;
            Some(current.clone())
        }))
    }

    async fn clear_next_drip(&self, request_id: Uuid) -> Result<(), AppError> {
        self.check_writable()?;
        self.with(|d| {
            if let Some(r) = d.requests.iter_mut().find(|r| r.id == request_id) {
                r.next_drip_at = None;
            }
        });
        Ok(())
    }

    async fn list_due_drips(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ReviewRequest>, AppError> {
        Ok(self.with(|d| {
            let mut due: Vec<ReviewRequest> = d
                .requests
                .iter()
                .filter(|r| matches!(r.status, ReviewStatus::Sent | ReviewStatus::Reminded1))
                .filter(|r| r.next_drip_at.is_some_and(|at| at <= now))
                .cloned()
                .collect();
            due.sort_by_key(|r| r.next_drip_at);
            due.truncate(limit.max(0) as usize);
            due
        }))
    }

    async fn list_campaign_requests(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<Vec<ReviewRequest>, AppError> {
        Ok(self.with(|d| {
            d.requests
                .iter()
                .filter(|r| r.contractor_id == contractor_id && r.campaign_id == Some(campaign_id))
                .cloned()
                .collect()
        }))
    }

    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<ReviewCampaign, AppError> {
        let now = Utc::now();
        let created = ReviewCampaign {
            id: Uuid::new_v4(),
            contractor_id: campaign.contractor_id,
            name: campaign.name.clone(),
            status: CampaignStatus::Draft,
            contact_filter: Json(campaign.contact_filter.clone()),
            rate_limit_per_hour: campaign.rate_limit_per_hour,
            total_contacts: campaign.total_contacts,
            sent_count: 0,
            reply_count: 0,
            review_count: 0,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.with(|d| d.campaigns.push(created.clone()));
        Ok(created)
    }

    async fn get_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<Option<ReviewCampaign>, AppError> {
        Ok(self.with(|d| {
            d.campaigns
                .iter()
                .find(|c| c.contractor_id == contractor_id && c.id == campaign_id)
                .cloned()
        }))
    }

    async fn list_campaigns(&self, contractor_id: Uuid) -> Result<Vec<ReviewCampaign>, AppError> {
        Ok(self.with(|d| {
            d.campaigns
                .iter()
                .filter(|c| c.contractor_id == contractor_id)
                .cloned()
                .collect()
        }))
    }

    async fn list_sending_campaigns(&self, limit: i64) -> Result<Vec<ReviewCampaign>, AppError> {
        Ok(self.with(|d| {
            let mut sending: Vec<ReviewCampaign> = d
                .campaigns
                .iter()
                .filter(|c| c.status == CampaignStatus::Sending)
                .cloned()
                .collect();
            sending.sort_by_key(|c| c.updated_at);
            sending.truncate(limit.max(0) as usize);
            sending
        }))
    }

    async fn set_campaign_status(
        &self,
        contractor_id: Uuid,
        campaign_id: Uuid,
        expected: CampaignStatus,
        status: CampaignStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Ok(self.with(|d| {
            let Some(c) = d.campaigns.iter_mut().find(|c| {
                c.contractor_id == contractor_id && c.id == campaign_id && c.status == expected
            }) else {
                return false;
            };
            c.status = status;
            if status == CampaignStatus::Sending && c.started_at.is_none() {
                c.started_at = Some(at);
            }
            if status == CampaignStatus::Completed {
                c.completed_at = Some(at);
            }
            c.updated_at = at;
            true
        }))
    }

    async fn increment_campaign_counters(
        &self,
        contractor_id: Uuid,
        campaign_id: Uuid,
        delta: CampaignCounters,
    ) -> Result<(), AppError> {
        self.with(|d| {
            if let Some(c) = d
                .campaigns
                .iter_mut()
                .find(|c| c.contractor_id == contractor_id && c.id == campaign_id)
            {
                c.sent_count += delta.sent;
                c.reply_count += delta.replies;
                c.review_count += delta.reviews;
                c.updated_at = Utc::now();
            }
        });
        Ok(())
    }

    async fn delete_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<bool, AppError> {
        Ok(self.with(|d| {
            let before = d.campaigns.len();
            d.campaigns
                .retain(|c| !(c.contractor_id == contractor_id && c.id == campaign_id));
            d.campaigns.len() != before
        }))
    }

    async fn record_event(&self, contractor_id: Uuid, event: AnalyticsEvent, metadata: Value) -> Result<(), AppError> {
        self.with(|d| d.events.push((contractor_id, event.as_str(), metadata)));
        Ok(())
    }
}
