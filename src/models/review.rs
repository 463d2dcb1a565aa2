// src/models/review.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// =========================================================================
//  STATUS (Postgres enum review_status)
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "review_status")]
pub enum ReviewStatus {
    #[sqlx(rename = "sent")]
    #[serde(rename = "sent")]
    Sent,
    #[sqlx(rename = "reminded_1")]
    #[serde(rename = "reminded_1")]
    Reminded1,
    #[sqlx(rename = "reminded_2")]
    #[serde(rename = "reminded_2")]
    Reminded2,
    #[sqlx(rename = "reviewed")]
    #[serde(rename = "reviewed")]
    Reviewed,
    #[sqlx(rename = "negative")]
    #[serde(rename = "negative")]
    Negative,
    #[sqlx(rename = "stopped")]
    #[serde(rename = "stopped")]
    Stopped,
}

impl ReviewStatus {
    /// Status que contam para a regra "um pedido ativo por contato".
    pub const ACTIVE: [ReviewStatus; 3] = [
        ReviewStatus::Sent,
        ReviewStatus::Reminded1,
        ReviewStatus::Reminded2,
    ];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Sent => "sent",
            ReviewStatus::Reminded1 => "reminded_1",
            ReviewStatus::Reminded2 => "reminded_2",
            ReviewStatus::Reviewed => "reviewed",
            ReviewStatus::Negative => "negative",
            ReviewStatus::Stopped => "stopped",
        }
    }
}

/// Nota a partir da qual a resposta é tratada como positiva.
pub const POSITIVE_RATING_THRESHOLD: u8 = 4;

// =========================================================================
//  EVENTOS E TRANSIÇÕES
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
    /// Resposta do cliente classificada com uma nota 1..=5.
    Reply { rating: u8 },
    /// Tick do drip com next_drip_at vencido.
    DripDue,
    /// O gateway recusou o envio.
    SendFailed,
    /// O contato fez opt-out entre o envio e o lembrete.
    OptedOut,
}

impl ReviewEvent {
    pub fn name(self) -> &'static str {
        match self {
            ReviewEvent::Reply { .. } => "reply",
            ReviewEvent::DripDue => "drip_due",
            ReviewEvent::SendFailed => "send_failed",
            ReviewEvent::OptedOut => "opted_out",
        }
    }
}

/// Tabela de transições. Único lugar onde o ciclo de vida é decidido.
pub fn transition(from: ReviewStatus, event: ReviewEvent) -> Result<ReviewStatus, AppError> {
    use ReviewStatus::*;

    let to = match (from, event) {
        (Sent | Reminded1 | Reminded2, ReviewEvent::Reply { rating }) if (1..=5).contains(&rating) => {
            if rating >= POSITIVE_RATING_THRESHOLD {
                Reviewed
            } else {
                Negative
            }
        }
        (Sent, ReviewEvent::DripDue) => Reminded1,
        (Reminded1, ReviewEvent::DripDue) => Reminded2,
        (Sent | Reminded1 | Reminded2, ReviewEvent::SendFailed | ReviewEvent::OptedOut) => Stopped,
        _ => {
            return Err(AppError::InvalidTransition {
                from,
                event: event.name(),
            })
        }
    };

    Ok(to)
}

/// Intervalos do drip, já resolvidos a partir da configuração do contractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DripSchedule {
    pub enabled: bool,
    pub reminder1_days: i64,
    pub reminder2_days: i64,
}

impl DripSchedule {
    pub fn first_reminder_at(&self, sent_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.enabled
            .then(|| sent_at + Duration::days(self.reminder1_days))
    }
}

// =========================================================================
//  REVIEW REQUEST
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub id: Uuid,
    #[schema(ignore)]
    pub contractor_id: Uuid,
    pub contact_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub status: ReviewStatus,
    #[schema(example = 5)]
    pub rating: Option<i16>,
    pub drip_step: i32,
    pub next_drip_at: Option<DateTime<Utc>>,
    pub sent_at: DateTime<Utc>,
    pub replied_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewRequest {
    /// Aplica um evento e devolve o novo estado do pedido (sem persistir).
    /// Quem chama grava com compare-and-set sobre o status anterior.
    pub fn apply(
        &self,
        event: ReviewEvent,
        now: DateTime<Utc>,
        schedule: &DripSchedule,
    ) -> Result<ReviewRequest, AppError> {
        let to = transition(self.status, event)?;
        let mut next = self.clone();
        next.status = to;
        next.updated_at = now;

        match event {
            ReviewEvent::Reply { rating } => {
                next.rating = Some(i16::from(rating));
                next.replied_at = Some(now);
                next.next_drip_at = None;
                if to == ReviewStatus::Reviewed {
                    next.reviewed_at = Some(now);
                }
            }
            ReviewEvent::DripDue => {
                next.drip_step = self.drip_step + 1;
                next.next_drip_at = match to {
                    ReviewStatus::Reminded1 => Some(now + Duration::days(schedule.reminder2_days)),
                    _ => None,
                };
            }
            ReviewEvent::SendFailed | ReviewEvent::OptedOut => {
                next.next_drip_at = None;
            }
        }

        Ok(next)
    }
}

/// Dados para criar um pedido novo (sempre nasce em `sent`).
#[derive(Debug, Clone)]
pub struct NewReviewRequest {
    pub contractor_id: Uuid,
    pub contact_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub sent_at: DateTime<Utc>,
    pub next_drip_at: Option<DateTime<Utc>>,
}

impl NewReviewRequest {
    pub fn new(
        contractor_id: Uuid,
        contact_id: Uuid,
        campaign_id: Option<Uuid>,
        now: DateTime<Utc>,
        schedule: &DripSchedule,
    ) -> Self {
        Self {
            contractor_id,
            contact_id,
            campaign_id,
            sent_at: now,
            next_drip_at: schedule.first_reminder_at(now),
        }
    }
}
