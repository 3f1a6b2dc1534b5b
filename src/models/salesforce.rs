// src/models/salesforce.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// --- ERROS CLASSIFICADOS ---

/// Corpo de erro do REST do Salesforce (vem sempre como array).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesforceApiError {
    pub message: String,
    pub error_code: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SalesforceErrorKind {
    InvalidRecordType,
    InvalidCrossReference,
    RequiredFieldMissing,
    DuplicateValue,
    SessionExpired,
    RowLock,
    ValidationRule,
    InvalidField,
    MalformedQuery,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// Erro do Salesforce traduzido para o painel, com sugestão de correção.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedSalesforceError {
    #[schema(example = "INVALID_CROSS_REFERENCE_KEY")]
    pub code: String,
    pub kind: SalesforceErrorKind,
    pub message: String,
    pub fields: Vec<String>,
    pub suggestion: String,
    pub severity: Severity,
    pub ignorable: bool,
    pub http_status: u16,
}

impl fmt::Display for ClassifiedSalesforceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salesforce {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ClassifiedSalesforceError {}

// --- OAUTH ---

/// Resposta do endpoint `/services/oauth2/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub instance_url: String,
    pub issued_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OAuthStatus {
    pub connected: bool,
    #[schema(example = "https://suvi.my.salesforce.com")]
    pub instance_url: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// --- REST ---

#[derive(Debug, Clone, Deserialize)]
pub struct SObjectCreated {
    pub id: String,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse<T> {
    pub total_size: u64,
    pub records: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdRecord {
    #[serde(rename = "Id")]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupMemberRecord {
    #[serde(rename = "UserOrGroupId")]
    pub user_or_group_id: String,
}
