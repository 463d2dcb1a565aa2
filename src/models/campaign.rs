// src/models/campaign.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "campaign_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Sending,
    Paused,
    Completed,
}

impl CampaignStatus {
    /// Ações manuais do painel. O scheduler pausa/completa por conta própria.
    pub fn start(self) -> Result<CampaignStatus, AppError> {
        match self {
            CampaignStatus::Draft | CampaignStatus::Paused => Ok(CampaignStatus::Sending),
            _ => Err(AppError::InvalidInput(
                "Campaign can only be started from draft or paused status".into(),
            )),
        }
    }

    pub fn pause(self) -> Result<CampaignStatus, AppError> {
        match self {
            CampaignStatus::Sending => Ok(CampaignStatus::Paused),
            _ => Err(AppError::InvalidInput("Can only pause a sending campaign".into())),
        }
    }
}

/// Filtro de contatos salvo em JSONB (`contact_filter`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactFilter {
    /// Semântica OR: basta o contato ter uma das tags.
    #[schema(example = json!(["hvac", "2024"]))]
    pub tags: Vec<String>,
    pub exclude_reviewed: bool,
    /// Contatos com pedido ativo nunca recebem outro; a flag fica para o painel.
    pub exclude_pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCampaign {
    pub id: Uuid,
    #[schema(ignore)]
    pub contractor_id: Uuid,
    #[schema(example = "Spring blast")]
    pub name: String,
    pub status: CampaignStatus,
    #[schema(value_type = ContactFilter)]
    pub contact_filter: Json<ContactFilter>,
    #[schema(example = 20)]
    pub rate_limit_per_hour: i32,
    pub total_contacts: i32,
    pub sent_count: i32,
    pub reply_count: i32,
    pub review_count: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewCampaign {
    /// Orçamento de envios por tick: max(1, floor(rate / ticks_por_hora)).
    pub fn tick_budget(&self, ticks_per_hour: u32) -> usize {
        let per_tick = self.rate_limit_per_hour.max(0) as u32 / ticks_per_hour.max(1);
        per_tick.max(1) as usize
    }
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub contractor_id: Uuid,
    pub name: String,
    pub contact_filter: ContactFilter,
    pub rate_limit_per_hour: i32,
    pub total_contacts: i32,
}

/// Incrementos aplicados de forma atômica no banco (`x = x + $n`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignCounters {
    pub sent: i32,
    pub replies: i32,
    pub reviews: i32,
}
