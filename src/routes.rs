// src/routes.rs

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers};

pub fn app(app_state: AppState) -> Router {
    let webhook_routes = Router::new().route(
        "/facebook-leads",
        get(handlers::webhooks::verify_webhook).post(handlers::webhooks::receive_leads),
    );

    let agent_routes = Router::new()
        .route("/", get(handlers::agents::list_agents))
        .route(
            "/{id}",
            get(handlers::agents::get_agent).put(handlers::agents::update_agent),
        );

    // Rotas estáticas têm prioridade sobre `/{id}`
    let lead_routes = Router::new()
        .route("/", get(handlers::leads::list_leads))
        .route("/incomplete", get(handlers::leads::list_incomplete))
        .route("/reprocess-from-cleaned", post(handlers::leads::reprocess_from_cleaned))
        .route("/process-salesforce", post(handlers::leads::process_salesforce))
        .route(
            "/batch",
            get(handlers::leads::batch_status).post(handlers::leads::start_batch),
        )
        .route("/batch/stop", post(handlers::leads::stop_batch))
        .route(
            "/config",
            get(handlers::module_config::get_config)
                .put(handlers::module_config::update_config)
                .post(handlers::module_config::update_blocked_form),
        )
        .route("/{id}", get(handlers::leads::get_lead))
        .route("/{id}/consult-meta", post(handlers::leads::consult_meta));

    let oauth_routes = Router::new()
        .route("/authorize", get(handlers::oauth::authorize))
        .route("/callback", get(handlers::oauth::callback))
        .route("/status", get(handlers::oauth::status));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/webhooks", webhook_routes)
        .nest("/api/agents", agent_routes)
        .nest("/api/custom-module1/log-leads-suvi", lead_routes)
        .nest("/api/oauth/salesforce", oauth_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
