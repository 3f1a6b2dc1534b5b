// src/models/agent.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Agente digital como está no banco. Os três segredos do WhatsApp ficam cifrados.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Agent {
    pub id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub search_indexes: Vec<String>,
    pub workflow_ids: Vec<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_business_account_id: Option<String>,
    pub whatsapp_access_token: Option<String>,
    pub whatsapp_webhook_verify_token: Option<String>,
    pub whatsapp_app_secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Campos de credencial protegidos pelo guard de escrita.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum TokenField {
    AccessToken,
    WebhookVerifyToken,
    AppSecret,
}

impl TokenField {
    pub const ALL: [TokenField; 3] =
        [TokenField::AccessToken, TokenField::WebhookVerifyToken, TokenField::AppSecret];

    pub fn column(&self) -> &'static str {
        match self {
            TokenField::AccessToken => "whatsapp_access_token",
            TokenField::WebhookVerifyToken => "whatsapp_webhook_verify_token",
            TokenField::AppSecret => "whatsapp_app_secret",
        }
    }

    // Tamanho mínimo aceito para um valor novo
    pub fn min_len(&self) -> usize {
        match self {
            TokenField::AccessToken => 50,
            TokenField::WebhookVerifyToken => 8,
            TokenField::AppSecret => 32,
        }
    }

    pub fn stored<'a>(&self, agent: &'a Agent) -> Option<&'a str> {
        match self {
            TokenField::AccessToken => agent.whatsapp_access_token.as_deref(),
            TokenField::WebhookVerifyToken => agent.whatsapp_webhook_verify_token.as_deref(),
            TokenField::AppSecret => agent.whatsapp_app_secret.as_deref(),
        }
    }
}

// --- VISÃO MASCARADA (GET) ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    pub id: Uuid,
    pub client_id: Uuid,
    #[schema(example = "Asistente Ventas")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = json!(["proyectos", "faq"]))]
    pub search_indexes: Vec<String>,
    pub workflow_ids: Vec<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_business_account_id: Option<String>,
    // Nunca em texto puro: prefixo de 4 caracteres + "..."
    #[schema(example = "EAAG...")]
    pub whatsapp_access_token: Option<String>,
    pub whatsapp_webhook_verify_token: Option<String>,
    pub whatsapp_app_secret: Option<String>,
    pub has_access_token: bool,
    pub has_webhook_verify_token: bool,
    pub has_app_secret: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- PAYLOAD DO PUT ---

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentRequest {
    #[validate(length(min = 2, message = "O nome deve ter no mínimo 2 caracteres"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub search_indexes: Option<Vec<String>>,
    pub workflow_ids: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_business_account_id: Option<String>,

    pub whatsapp_access_token: Option<String>,
    pub whatsapp_webhook_verify_token: Option<String>,
    pub whatsapp_app_secret: Option<String>,

    // Sem esta flag os campos de token são ignorados
    #[serde(default)]
    pub update_tokens: bool,
}

impl UpdateAgentRequest {
    pub fn token_value(&self, field: TokenField) -> Option<&str> {
        match field {
            TokenField::AccessToken => self.whatsapp_access_token.as_deref(),
            TokenField::WebhookVerifyToken => self.whatsapp_webhook_verify_token.as_deref(),
            TokenField::AppSecret => self.whatsapp_app_secret.as_deref(),
        }
    }
}

/// Campos não sensíveis a atualizar (None = manter).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentProfileUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub search_indexes: Option<Vec<String>>,
    pub workflow_ids: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_business_account_id: Option<String>,
}

impl From<&UpdateAgentRequest> for AgentProfileUpdate {
    fn from(req: &UpdateAgentRequest) -> Self {
        Self {
            name: req.name.clone(),
            description: req.description.clone(),
            search_indexes: req.search_indexes.clone(),
            workflow_ids: req.workflow_ids.clone(),
            is_active: req.is_active,
            whatsapp_phone_number_id: req.whatsapp_phone_number_id.clone(),
            whatsapp_business_account_id: req.whatsapp_business_account_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenOutcomeView {
    pub field: TokenField,
    #[schema(example = "rejected")]
    pub outcome: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentResponse {
    pub agent: AgentView,
    pub token_updates: Vec<TokenOutcomeView>,
}
