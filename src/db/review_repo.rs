// src/db/review_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{EligibilityQuery, ReviewStore},
    models::{
        analytics::AnalyticsEvent,
        campaign::{CampaignCounters, CampaignStatus, ContactFilter, NewCampaign, ReviewCampaign},
        contact::{Contact, NewContact, NewMessage},
        contractor::ContractorConfig,
        review::{NewReviewRequest, ReviewRequest, ReviewStatus},
    },
};

const CONTACT_COLUMNS: &str = r#"
    id, contractor_id, name, phone, email, source, opted_out, has_left_review,
    tags, last_contacted_at, created_at, updated_at
"#;

const REQUEST_COLUMNS: &str = r#"
    id, contractor_id, contact_id, campaign_id, status, rating, drip_step, next_drip_at,
    sent_at, replied_at, clicked_at, reviewed_at, created_at, updated_at
"#;

const CAMPAIGN_COLUMNS: &str = r#"
    id, contractor_id, name, status, contact_filter, rate_limit_per_hour,
    total_contacts, sent_count, reply_count, review_count,
    started_at, completed_at, created_at, updated_at
"#;

// Filtro de elegibilidade compartilhado entre a listagem e a contagem.
// $1 contractor, $2 tags, $3 exclude_reviewed, $4 campaign_id (opcional).
// Contatos com pedido ativo ficam sempre de fora: criar outro violaria a
// regra de um pedido ativo por contato.
const ELIGIBILITY_PREDICATE: &str = r#"
    c.contractor_id = $1
    AND c.opted_out = false
    AND (cardinality($2::text[]) = 0 OR c.tags && $2::text[])
    AND ($3 = false OR c.has_left_review = false)
    AND ($4::uuid IS NULL OR NOT EXISTS (
        SELECT 1 FROM review_requests r
        WHERE r.campaign_id = $4 AND r.contact_id = c.id
    ))
    AND NOT EXISTS (
        SELECT 1 FROM review_requests r
        WHERE r.contractor_id = $1
          AND r.contact_id = c.id
          AND r.status IN ('sent', 'reminded_1', 'reminded_2')
    )
"#;

#[derive(Clone)]
pub struct ReviewRepository {
    pool: PgPool,
}

impl ReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewStore for ReviewRepository {
    // =========================================================================
    //  CONTRACTOR
    // =========================================================================

    async fn get_contractor(&self, contractor_id: Uuid) -> Result<Option<ContractorConfig>, AppError> {
        let contractor = sqlx::query_as::<_, ContractorConfig>(
            r#"
            SELECT
                id, business_name, phone_number, subscription_status,
                feature_review_automation, feature_review_drip,
                google_review_link, templates
            FROM contractors
            WHERE id = $1
            "#,
        )
        .bind(contractor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contractor)
    }

    // =========================================================================
    //  CONTATOS
    // =========================================================================

    async fn get_contact(&self, contractor_id: Uuid, contact_id: Uuid) -> Result<Option<Contact>, AppError> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE contractor_id = $1 AND id = $2"
        );
        let contact = sqlx::query_as::<_, Contact>(&sql)
            .bind(contractor_id)
            .bind(contact_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(contact)
    }

    async fn find_contact_by_phone(&self, contractor_id: Uuid, phone: &str) -> Result<Option<Contact>, AppError> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE contractor_id = $1 AND phone = $2"
        );
        let contact = sqlx::query_as::<_, Contact>(&sql)
            .bind(contractor_id)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;

        Ok(contact)
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact, AppError> {
        // Dois webhooks simultâneos do mesmo número: o segundo recebe a linha existente.
        let sql = format!(
            r#"
            INSERT INTO contacts (contractor_id, name, phone, email, source, tags)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (contractor_id, phone)
            DO UPDATE SET updated_at = contacts.updated_at
            RETURNING {CONTACT_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Contact>(&sql)
            .bind(contact.contractor_id)
            .bind(&contact.name)
            .bind(&contact.phone)
            .bind(contact.email.as_deref())
            .bind(&contact.source)
            .bind(&contact.tags)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn update_contact_identity(
        &self,
        contractor_id: Uuid,
        contact_id: Uuid,
        name: &str,
        email: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE contacts
            SET name = $3, email = COALESCE($4, email), updated_at = NOW()
            WHERE contractor_id = $1 AND id = $2
            "#,
        )
        .bind(contractor_id)
        .bind(contact_id)
        .bind(name)
        .bind(email)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn touch_contact(&self, contractor_id: Uuid, contact_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE contacts SET last_contacted_at = $3 WHERE contractor_id = $1 AND id = $2")
            .bind(contractor_id)
            .bind(contact_id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn eligible_contacts(&self, contractor_id: Uuid, query: &EligibilityQuery<'_>) -> Result<Vec<Contact>, AppError> {
        let sql = format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts c
            WHERE {ELIGIBILITY_PREDICATE}
            ORDER BY c.created_at ASC, c.id ASC
            LIMIT $5
            "#
        );
        let contacts = sqlx::query_as::<_, Contact>(&sql)
            .bind(contractor_id)
            .bind(&query.filter.tags)
            .bind(query.filter.exclude_reviewed)
            .bind(query.campaign_id)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(contacts)
    }

    async fn count_eligible_contacts(&self, contractor_id: Uuid, filter: &ContactFilter) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) FROM contacts c WHERE {ELIGIBILITY_PREDICATE}");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(contractor_id)
            .bind(&filter.tags)
            .bind(filter.exclude_reviewed)
            .bind(None::<Uuid>)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    //  CONVERSAS E MENSAGENS
    // =========================================================================

    async fn upsert_conversation(
        &self,
        contractor_id: Uuid,
        contact_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<Uuid, AppError> {
        let preview: String = preview.chars().take(100).collect();

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO conversations (
                contractor_id, contact_id, status, unread_count, last_message_at, last_message_preview
            )
            VALUES ($1, $2, 'open', 1, $3, $4)
            ON CONFLICT (contractor_id, contact_id)
            DO UPDATE SET
                status = 'open',
                unread_count = conversations.unread_count + 1,
                last_message_at = EXCLUDED.last_message_at,
                last_message_preview = EXCLUDED.last_message_preview
            RETURNING id
            "#,
        )
        .bind(contractor_id)
        .bind(contact_id)
        .bind(at)
        .bind(preview)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn has_message(&self, contractor_id: Uuid, provider_sid: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM messages WHERE contractor_id = $1 AND provider_sid = $2)",
        )
        .bind(contractor_id)
        .bind(provider_sid)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (
                contractor_id, contact_id, conversation_id, direction, channel, body, provider_sid, status
            )
            VALUES ($1, $2, $3, $4, 'sms', $5, $6, $7)
            ON CONFLICT (contractor_id, provider_sid) DO NOTHING
            "#,
        )
        .bind(message.contractor_id)
        .bind(message.contact_id)
        .bind(message.conversation_id)
        .bind(message.direction)
        .bind(&message.body)
        .bind(message.provider_sid.as_deref())
        .bind(&message.status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_message_status(
        &self,
        contractor_id: Uuid,
        provider_sid: &str,
        status: &str,
        error_code: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE messages
            SET status = $3, error_code = COALESCE($4, error_code), updated_at = NOW()
            WHERE contractor_id = $1 AND provider_sid = $2
            "#,
        )
        .bind(contractor_id)
        .bind(provider_sid)
        .bind(status)
        .bind(error_code)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    //  REVIEW REQUESTS
    // =========================================================================

    async fn create_review_request(&self, request: &NewReviewRequest) -> Result<ReviewRequest, AppError> {
        let sql = format!(
            r#"
            INSERT INTO review_requests (
                contractor_id, contact_id, campaign_id, status, drip_step, next_drip_at, sent_at
            )
            VALUES ($1, $2, $3, 'sent', 0, $4, $5)
            RETURNING {REQUEST_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ReviewRequest>(&sql)
            .bind(request.contractor_id)
            .bind(request.contact_id)
            .bind(request.campaign_id)
            .bind(request.next_drip_at)
            .bind(request.sent_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                // O índice parcial review_requests_one_active garante a regra no banco
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return AppError::ActiveRequestExists;
                    }
                }
                e.into()
            })
    }

    async fn find_active_request(&self, contractor_id: Uuid, contact_id: Uuid) -> Result<Option<ReviewRequest>, AppError> {
        let sql = format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM review_requests
            WHERE contractor_id = $1
              AND contact_id = $2
              AND status IN ('sent', 'reminded_1', 'reminded_2')
            ORDER BY created_at DESC
            LIMIT 1
            "#
        );
        let request = sqlx::query_as::<_, ReviewRequest>(&sql)
            .bind(contractor_id)
            .bind(contact_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(request)
    }

    async fn has_request_since(&self, contractor_id: Uuid, contact_id: Uuid, since: DateTime<Utc>) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM review_requests
                WHERE contractor_id = $1 AND contact_id = $2 AND created_at >= $3
            )
            "#,
        )
        .bind(contractor_id)
        .bind(contact_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn save_transition(
        &self,
        next: &ReviewRequest,
        expected: ReviewStatus,
    ) -> Result<Option<ReviewRequest>, AppError> {
        let sql = format!(
            r#"
            UPDATE review_requests
            SET status = $3,
                rating = $4,
                drip_step = $5,
                next_drip_at = $6,
                replied_at = $7,
                reviewed_at = $8,
                updated_at = $9
            WHERE id = $1 AND status = $2
            RETURNING {REQUEST_COLUMNS}
            "#
        );
        let saved = sqlx::query_as::<_, ReviewRequest>(&sql)
            .bind(next.id)
            .bind(expected)
            .bind(next.status)
            .bind(next.rating)
            .bind(next.drip_step)
            .bind(next.next_drip_at)
            .bind(next.replied_at)
            .bind(next.reviewed_at)
            .bind(next.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(saved)
    }

    async fn clear_next_drip(&self, request_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE review_requests SET next_drip_at = NULL, updated_at = NOW() WHERE id = $1")
            .bind(request_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_due_drips(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ReviewRequest>, AppError> {
        let sql = format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM review_requests
            WHERE status IN ('sent', 'reminded_1')
              AND next_drip_at IS NOT NULL
              AND next_drip_at <= $1
            ORDER BY next_drip_at ASC
            LIMIT $2
            "#
        );
        let due = sqlx::query_as::<_, ReviewRequest>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(due)
    }

    async fn list_campaign_requests(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<Vec<ReviewRequest>, AppError> {
        let sql = format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM review_requests
            WHERE contractor_id = $1 AND campaign_id = $2
            ORDER BY created_at DESC
            "#
        );
        let requests = sqlx::query_as::<_, ReviewRequest>(&sql)
            .bind(contractor_id)
            .bind(campaign_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(requests)
    }

    // =========================================================================
    //  CAMPANHAS
    // =========================================================================

    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<ReviewCampaign, AppError> {
        let sql = format!(
            r#"
            INSERT INTO review_campaigns (
                contractor_id, name, status, contact_filter, rate_limit_per_hour, total_contacts
            )
            VALUES ($1, $2, 'draft', $3, $4, $5)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, ReviewCampaign>(&sql)
            .bind(campaign.contractor_id)
            .bind(&campaign.name)
            .bind(Json(&campaign.contact_filter))
            .bind(campaign.rate_limit_per_hour)
            .bind(campaign.total_contacts)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn get_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<Option<ReviewCampaign>, AppError> {
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM review_campaigns WHERE contractor_id = $1 AND id = $2"
        );
        let campaign = sqlx::query_as::<_, ReviewCampaign>(&sql)
            .bind(contractor_id)
            .bind(campaign_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(campaign)
    }

    async fn list_campaigns(&self, contractor_id: Uuid) -> Result<Vec<ReviewCampaign>, AppError> {
        let sql = format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS}
            FROM review_campaigns
            WHERE contractor_id = $1
            ORDER BY created_at DESC
            "#
        );
        let campaigns = sqlx::query_as::<_, ReviewCampaign>(&sql)
            .bind(contractor_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(campaigns)
    }

    async fn list_sending_campaigns(&self, limit: i64) -> Result<Vec<ReviewCampaign>, AppError> {
        // updated_at avança a cada tick processado: as campanhas se revezam no fan-out
        let sql = format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS}
            FROM review_campaigns
            WHERE status = 'sending'
            ORDER BY updated_at ASC
            LIMIT $1
            "#
        );
        let campaigns = sqlx::query_as::<_, ReviewCampaign>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(campaigns)
    }

    async fn set_campaign_status(
        &self,
        contractor_id: Uuid,
        campaign_id: Uuid,
        expected: CampaignStatus,
        status: CampaignStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE review_campaigns
            SET status = $2,
                started_at = CASE
                    WHEN $2::campaign_status = 'sending'::campaign_status THEN COALESCE(started_at, $3)
                    ELSE started_at
                END,
                completed_at = CASE
                    WHEN $2::campaign_status = 'completed'::campaign_status THEN $3
                    ELSE completed_at
                END,
                updated_at = $3
            WHERE id = $1 AND contractor_id = $4 AND status = $5
            "#,
        )
        .bind(campaign_id)
        .bind(status)
        .bind(at)
        .bind(contractor_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_campaign_counters(
        &self,
        contractor_id: Uuid,
        campaign_id: Uuid,
        delta: CampaignCounters,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE review_campaigns
            SET sent_count = sent_count + $2,
                reply_count = reply_count + $3,
                review_count = review_count + $4,
                updated_at = NOW()
            WHERE id = $1 AND contractor_id = $5
            "#,
        )
        .bind(campaign_id)
        .bind(delta.sent)
        .bind(delta.replies)
        .bind(delta.reviews)
        .bind(contractor_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_campaign(&self, contractor_id: Uuid, campaign_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM review_campaigns WHERE contractor_id = $1 AND id = $2")
            .bind(contractor_id)
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    //  ANALYTICS
    // =========================================================================

    async fn record_event(&self, contractor_id: Uuid, event: AnalyticsEvent, metadata: Value) -> Result<(), AppError> {
        sqlx::query("INSERT INTO analytics_events (contractor_id, event_type, metadata) VALUES ($1, $2, $3)")
            .bind(contractor_id)
            .bind(event.as_str())
            .bind(metadata)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
