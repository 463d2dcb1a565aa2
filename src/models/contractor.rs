// src/models/contractor.rs

// Configuração do contractor (tenant). Somente leitura para este serviço:
// quem escreve é o painel de configurações.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::{common::error::AppError, models::review::DripSchedule};

// --- TEMPLATES ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplatePurpose {
    ReviewRequest,
    ReviewPositive,
    ReviewNegative,
    ReviewReminder1,
    ReviewReminder2,
    ReviewBlast,
}

impl TemplatePurpose {
    /// Chave usada no JSONB `contractors.templates`.
    pub fn key(self) -> &'static str {
        match self {
            TemplatePurpose::ReviewRequest => "review_request",
            TemplatePurpose::ReviewPositive => "review_positive",
            TemplatePurpose::ReviewNegative => "review_negative",
            TemplatePurpose::ReviewReminder1 => "review_reminder_1",
            TemplatePurpose::ReviewReminder2 => "review_reminder_2",
            TemplatePurpose::ReviewBlast => "review_blast",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            TemplatePurpose::ReviewRequest => {
                "Hey {{contact_name}}, thanks for choosing {{business_name}}! How'd we do? Reply 1-5"
            }
            TemplatePurpose::ReviewPositive => {
                "Awesome, thank you! Would you mind leaving us a quick Google review? {{review_link}}"
            }
            TemplatePurpose::ReviewNegative => {
                "We're sorry to hear that. Someone will reach out to make it right."
            }
            TemplatePurpose::ReviewReminder1 => {
                "Hey {{contact_name}}, just checking in! We'd love to hear how your experience was with {{business_name}}. Reply 1-5 when you get a chance."
            }
            TemplatePurpose::ReviewReminder2 => {
                "Hi {{contact_name}}, last reminder - would you take 30 seconds to rate your experience with {{business_name}}? Reply 1-5. Thanks!"
            }
            TemplatePurpose::ReviewBlast => {
                "Hey {{contact_name}}, hope all is well! We're collecting feedback from customers - would you mind rating your experience with {{business_name}}? Reply 1-5"
            }
        }
    }

    pub fn default_delay_days(self) -> Option<i64> {
        match self {
            TemplatePurpose::ReviewReminder1 => Some(3),
            TemplatePurpose::ReviewReminder2 => Some(7),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateEntry {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub delay_days: Option<i64>,
}

// --- CONTRACTOR ---

/// Teto para `delay_days` vindo do JSONB de templates.
pub const MAX_REMINDER_DELAY_DAYS: i64 = 365;

#[derive(Debug, Clone, FromRow)]
pub struct ContractorConfig {
    pub id: Uuid,
    pub business_name: String,
    pub phone_number: Option<String>,
    pub subscription_status: String,
    pub feature_review_automation: bool,
    pub feature_review_drip: bool,
    pub google_review_link: Option<String>,
    pub templates: Json<HashMap<String, TemplateEntry>>,
}

impl ContractorConfig {
    pub fn template(&self, purpose: TemplatePurpose) -> &str {
        self.templates
            .get(purpose.key())
            .and_then(|t| t.message.as_deref())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| purpose.default_message())
    }

    fn delay_days(&self, purpose: TemplatePurpose) -> i64 {
        self.templates
            .get(purpose.key())
            .and_then(|t| t.delay_days)
            .filter(|d| *d > 0)
            .or_else(|| purpose.default_delay_days())
            .unwrap_or(0)
            .min(MAX_REMINDER_DELAY_DAYS)
    }

    pub fn drip_schedule(&self) -> DripSchedule {
        DripSchedule {
            enabled: self.feature_review_drip,
            reminder1_days: self.delay_days(TemplatePurpose::ReviewReminder1),
            reminder2_days: self.delay_days(TemplatePurpose::ReviewReminder2),
        }
    }

    pub fn subscription_active(&self) -> bool {
        matches!(self.subscription_status.as_str(), "trialing" | "active")
    }

    /// Telefone de origem configurado (não vazio).
    pub fn sending_phone(&self) -> Option<&str> {
        self.phone_number.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Pré-condições para disparar pedidos (webhook externo e envio avulso).
    pub fn ensure_can_request_reviews(&self, check_subscription: bool) -> Result<&str, AppError> {
        let phone = self
            .sending_phone()
            .ok_or_else(|| AppError::PreconditionFailed("Contractor phone not configured".into()))?;

        if check_subscription && !self.subscription_active() {
            return Err(AppError::Forbidden("Contractor subscription not active".into()));
        }

        if !self.feature_review_automation {
            return Err(AppError::Forbidden(
                "Review automation is disabled for this contractor".into(),
            ));
        }

        Ok(phone)
    }
}
