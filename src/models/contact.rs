// src/models/contact.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- CONTATO ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    #[schema(ignore)]
    pub contractor_id: Uuid,
    #[schema(example = "John Smith")]
    pub name: String,
    #[schema(example = "+15551234567")]
    pub phone: String,
    pub email: Option<String>,
    #[schema(example = "sms")]
    pub source: String,
    pub opted_out: bool,
    pub has_left_review: bool,
    #[schema(example = json!(["jobber"]))]
    pub tags: Vec<String>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Os templates usam só o primeiro nome.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub contractor_id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub source: String,
    pub tags: Vec<String>,
}

// --- MENSAGENS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub contractor_id: Uuid,
    pub contact_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub direction: MessageDirection,
    pub body: String,
    /// Sid do gateway; chave de deduplicação dos webhooks.
    pub provider_sid: Option<String>,
    pub status: String,
}
