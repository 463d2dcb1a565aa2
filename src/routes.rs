// src/routes.rs

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers};

pub fn app(app_state: AppState) -> Router {
    // Webhooks públicos (chamados por CRMs externos e pelo gateway de SMS)
    let webhook_routes = Router::new()
        .route(
            "/trigger-review/{contractor_id}",
            post(handlers::webhooks::trigger_review).get(handlers::webhooks::describe_trigger_review),
        );

    let sms_routes = Router::new()
        .route("/inbound/{contractor_id}", post(handlers::sms::inbound_sms))
        .route("/status/{contractor_id}", post(handlers::sms::status_callback));

    // Painel: o tenant vem do cabeçalho x-tenant-id
    let review_routes = Router::new()
        .route("/send", post(handlers::reviews::send_review))
        .route("/estimate", post(handlers::campaigns::estimate))
        .route(
            "/campaigns",
            get(handlers::campaigns::list_campaigns).post(handlers::campaigns::create_campaign),
        )
        .route(
            "/campaigns/{id}",
            get(handlers::campaigns::get_campaign)
                .patch(handlers::campaigns::update_campaign)
                .delete(handlers::campaigns::delete_campaign),
        );

    // Agendador externo (Vercel Cron e afins chamam via GET)
    let cron_routes = Router::new()
        .route(
            "/process-campaigns",
            post(handlers::cron::process_campaigns).get(handlers::cron::process_campaigns),
        )
        .route(
            "/process-drip",
            post(handlers::cron::process_drip).get(handlers::cron::process_drip),
        );

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/webhooks", webhook_routes)
        .nest("/api/sms", sms_routes)
        .nest("/api/reviews", review_routes)
        .nest("/api/cron", cron_routes)
        .with_state(app_state)
}
