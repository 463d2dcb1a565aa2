// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Webhooks ---
        handlers::webhooks::trigger_review,
        handlers::webhooks::describe_trigger_review,

        // --- SMS ---
        handlers::sms::inbound_sms,
        handlers::sms::status_callback,

        // --- Reviews ---
        handlers::reviews::send_review,

        // --- Campaigns ---
        handlers::campaigns::list_campaigns,
        handlers::campaigns::create_campaign,
        handlers::campaigns::estimate,
        handlers::campaigns::get_campaign,
        handlers::campaigns::update_campaign,
        handlers::campaigns::delete_campaign,

        // --- Cron ---
        handlers::cron::process_campaigns,
        handlers::cron::process_drip,
    ),
    components(
        schemas(
            // --- Reviews ---
            models::review::ReviewStatus,
            models::review::ReviewRequest,
            models::contact::Contact,

            // --- Campaigns ---
            models::campaign::CampaignStatus,
            models::campaign::ContactFilter,
            models::campaign::ReviewCampaign,
            services::campaign_service::CampaignDetail,

            // --- Cron ---
            services::campaign_service::CampaignTickReport,
            services::drip_service::DripTickReport,

            // --- Payloads ---
            handlers::webhooks::TriggerReviewPayload,
            handlers::webhooks::TriggerReviewResponse,
            handlers::reviews::SendReviewPayload,
            handlers::reviews::SendReviewResponse,
            handlers::campaigns::CreateCampaignPayload,
            handlers::campaigns::UpdateCampaignPayload,
            handlers::campaigns::EstimatePayload,
            handlers::campaigns::EstimateResponse,
        )
    ),
    tags(
        (name = "Webhooks", description = "Gatilho de pedidos vindo de CRMs externos"),
        (name = "SMS", description = "Webhooks do gateway TextGrid"),
        (name = "Reviews", description = "Envio avulso de pedidos de avaliação"),
        (name = "Campaigns", description = "Campanhas em massa"),
        (name = "Cron", description = "Ticks do agendador (campanhas e lembretes)")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "tenant_header",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-tenant-id"))),
        );
        components.add_security_scheme(
            "cron_secret",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-cron-secret"))),
        );
    }
}
