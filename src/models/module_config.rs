// src/models/module_config.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Linha de `modulos_suvi_12_config`. Valores sensíveis ficam cifrados.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub is_sensitive: bool,
    pub updated_at: DateTime<Utc>,
}

/// Catálogo das chaves conhecidas do módulo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    FacebookAccessToken,
    FacebookAppSecret,
    FacebookWebhookVerifyToken,
    AiApiKey,
    AiModel,
    SalesforceClientId,
    SalesforceClientSecret,
    SalesforceAccessToken,
    SalesforceRefreshToken,
    SalesforceInstanceUrl,
    SalesforceTokenIssuedAt,
    SalesforceOwnerGroupId,
    SalesforceRecordTypeInternal,
    SalesforceRecordTypeAgency,
    InternalCampaigns,
    AgencyCampaigns,
    BlockedFormIds,
    DefaultCountryCode,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 18] = [
        ConfigKey::FacebookAccessToken,
        ConfigKey::FacebookAppSecret,
        ConfigKey::FacebookWebhookVerifyToken,
        ConfigKey::AiApiKey,
        ConfigKey::AiModel,
        ConfigKey::SalesforceClientId,
        ConfigKey::SalesforceClientSecret,
        ConfigKey::SalesforceAccessToken,
        ConfigKey::SalesforceRefreshToken,
        ConfigKey::SalesforceInstanceUrl,
        ConfigKey::SalesforceTokenIssuedAt,
        ConfigKey::SalesforceOwnerGroupId,
        ConfigKey::SalesforceRecordTypeInternal,
        ConfigKey::SalesforceRecordTypeAgency,
        ConfigKey::InternalCampaigns,
        ConfigKey::AgencyCampaigns,
        ConfigKey::BlockedFormIds,
        ConfigKey::DefaultCountryCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::FacebookAccessToken => "facebook_access_token",
            ConfigKey::FacebookAppSecret => "facebook_app_secret",
            ConfigKey::FacebookWebhookVerifyToken => "facebook_webhook_verify_token",
            ConfigKey::AiApiKey => "ai_api_key",
            ConfigKey::AiModel => "ai_model",
            ConfigKey::SalesforceClientId => "salesforce_client_id",
            ConfigKey::SalesforceClientSecret => "salesforce_client_secret",
            ConfigKey::SalesforceAccessToken => "salesforce_access_token",
            ConfigKey::SalesforceRefreshToken => "salesforce_refresh_token",
            ConfigKey::SalesforceInstanceUrl => "salesforce_instance_url",
            ConfigKey::SalesforceTokenIssuedAt => "salesforce_token_issued_at",
            ConfigKey::SalesforceOwnerGroupId => "salesforce_owner_group_id",
            ConfigKey::SalesforceRecordTypeInternal => "salesforce_record_type_internal",
            ConfigKey::SalesforceRecordTypeAgency => "salesforce_record_type_agency",
            ConfigKey::InternalCampaigns => "internal_campaigns",
            ConfigKey::AgencyCampaigns => "agency_campaigns",
            ConfigKey::BlockedFormIds => "blocked_form_ids",
            ConfigKey::DefaultCountryCode => "default_country_code",
        }
    }

    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            ConfigKey::FacebookAccessToken
                | ConfigKey::FacebookAppSecret
                | ConfigKey::FacebookWebhookVerifyToken
                | ConfigKey::AiApiKey
                | ConfigKey::SalesforceClientId
                | ConfigKey::SalesforceClientSecret
                | ConfigKey::SalesforceAccessToken
                | ConfigKey::SalesforceRefreshToken
        )
    }

    // Listas guardadas como array JSON
    pub fn is_json_list(&self) -> bool {
        matches!(
            self,
            ConfigKey::InternalCampaigns | ConfigKey::AgencyCampaigns | ConfigKey::BlockedFormIds
        )
    }

    pub fn parse(key: &str) -> Option<ConfigKey> {
        Self::ALL.iter().copied().find(|k| k.as_str() == key)
    }
}

// --- VISÃO PARA O PAINEL ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntryView {
    #[schema(example = "ai_api_key")]
    pub key: String,
    // Segredos aparecem mascarados (4 caracteres + "...")
    #[schema(example = "sk-p...")]
    pub value: String,
    pub is_sensitive: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfigResponse {
    pub entries: Vec<ConfigEntryView>,
    #[schema(example = json!(["1234567890"]))]
    pub blocked_form_ids: Vec<String>,
}

// --- PAYLOADS ---

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntryInput {
    #[validate(length(min = 1, max = 128, message = "required"))]
    #[schema(example = "internal_campaigns")]
    pub key: String,
    #[schema(example = "[\"Lanzamiento Torre Norte\"]")]
    pub value: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigRequest {
    #[validate(length(min = 1, message = "required"), nested)]
    pub entries: Vec<ConfigEntryInput>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FormBlockAction {
    Block,
    Unblock,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormBlockRequest {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "1234567890")]
    pub form_id: String,
    pub action: FormBlockAction,
}
