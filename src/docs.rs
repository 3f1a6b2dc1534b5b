// src/docs.rs

use utoipa::OpenApi;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Webhooks ---
        handlers::webhooks::verify_webhook,
        handlers::webhooks::receive_leads,

        // --- Agents ---
        handlers::agents::list_agents,
        handlers::agents::get_agent,
        handlers::agents::update_agent,

        // --- Leads ---
        handlers::leads::list_leads,
        handlers::leads::get_lead,
        handlers::leads::consult_meta,
        handlers::leads::reprocess_from_cleaned,
        handlers::leads::process_salesforce,
        handlers::leads::list_incomplete,

        // --- Batch ---
        handlers::leads::batch_status,
        handlers::leads::start_batch,
        handlers::leads::stop_batch,

        // --- Module Config ---
        handlers::module_config::get_config,
        handlers::module_config::update_config,
        handlers::module_config::update_blocked_form,

        // --- Salesforce OAuth ---
        handlers::oauth::authorize,
        handlers::oauth::callback,
        handlers::oauth::status,
    ),
    components(
        schemas(
            // --- Webhook ---
            models::facebook::LeadgenWebhook,
            models::facebook::WebhookEntry,
            models::facebook::WebhookChange,
            models::facebook::WebhookReceipt,

            // --- Leads ---
            models::lead::ProcessingStatus,
            models::lead::CampaignType,
            models::lead::PipelineStep,
            models::lead::LeadRecord,
            models::lead::LeadDetail,
            models::lead::IncompleteLead,
            models::batch::LeadIdRequest,

            // --- Batch ---
            models::batch::BatchState,
            models::batch::BatchProgress,
            models::batch::StartBatchRequest,

            // --- Agents ---
            models::agent::TokenField,
            models::agent::AgentView,
            models::agent::UpdateAgentRequest,
            models::agent::TokenOutcomeView,
            models::agent::UpdateAgentResponse,

            // --- Module Config ---
            models::module_config::ConfigEntryView,
            models::module_config::ModuleConfigResponse,
            models::module_config::ConfigEntryInput,
            models::module_config::UpdateConfigRequest,
            models::module_config::FormBlockAction,
            models::module_config::FormBlockRequest,

            // --- Salesforce ---
            models::salesforce::SalesforceErrorKind,
            models::salesforce::Severity,
            models::salesforce::ClassifiedSalesforceError,
            models::salesforce::OAuthStatus,
        )
    ),
    tags(
        (name = "Webhooks", description = "Recepção de leads do Facebook Lead Ads"),
        (name = "Leads", description = "Log de leads e reprocessamento manual por etapa"),
        (name = "Batch", description = "Reprocessamento em lote dos leads incompletos"),
        (name = "Agents", description = "Agentes digitais e credenciais do WhatsApp"),
        (name = "Module Config", description = "Configuração do módulo (segredos cifrados)"),
        (name = "Salesforce OAuth", description = "Conexão com o Salesforce")
    )
)]
pub struct ApiDoc;
