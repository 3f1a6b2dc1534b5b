use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    models::lead::StatusTransitionError,
    services::{crypto::CryptoError, http::UpstreamError, lead_pipeline::PipelineFailure},
};

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Requisição inválida: {0}")]
    InvalidInput(String),

    #[error("Lead não encontrado")]
    LeadNotFound,

    #[error("Agente não encontrado")]
    AgentNotFound,

    #[error("Token de verificação do webhook inválido")]
    InvalidWebhookToken,

    #[error("Assinatura do webhook inválida")]
    InvalidSignature,

    #[error("{0}")]
    Conflict(String),

    #[error("Lead em estado inconsistente: {0}")]
    InconsistentLead(String),

    #[error(transparent)]
    InvalidTransition(#[from] StatusTransitionError),

    // Falha de uma etapa do pipeline (já gravada no lead)
    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Erro de criptografia: {0}")]
    Crypto(#[from] CryptoError),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

// O formato que vai para o cliente
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self { status, error: error.into(), details: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), json!(messages));
                }
                ApiError {
                    status: StatusCode::BAD_REQUEST,
                    error: "Um ou mais campos são inválidos.".into(),
                    details: Some(Value::Object(details)),
                }
            }
            AppError::InvalidInput(msg) => ApiError::new(StatusCode::BAD_REQUEST, msg),
            AppError::LeadNotFound | AppError::AgentNotFound => {
                ApiError::new(StatusCode::NOT_FOUND, err.to_string())
            }
            AppError::InvalidWebhookToken | AppError::InvalidSignature => {
                ApiError::new(StatusCode::FORBIDDEN, err.to_string())
            }
            AppError::Conflict(msg) => ApiError::new(StatusCode::CONFLICT, msg),
            AppError::InconsistentLead(_) | AppError::InvalidTransition(_) => {
                ApiError::new(StatusCode::CONFLICT, err.to_string())
            }
            AppError::Pipeline(failure) => {
                let details = json!({
                    "leadId": failure.lead_id,
                    "step": failure.step,
                    "salesforce": failure.salesforce,
                });
                ApiError {
                    status: StatusCode::BAD_GATEWAY,
                    error: failure.message,
                    details: Some(details),
                }
            }
            AppError::Upstream(ref upstream) => {
                tracing::warn!("Falha em serviço externo: {}", upstream);
                ApiError::new(StatusCode::BAD_GATEWAY, err.to_string())
            }

            // Todos os outros erros (DatabaseError, Crypto, InternalServerError) viram 500.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let api: ApiError = AppError::LeadNotFound.into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.error, "Lead não encontrado");
    }

    #[test]
    fn database_errors_hide_details() {
        let api: ApiError = AppError::DatabaseError(sqlx::Error::RowNotFound).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.error, "Ocorreu um erro inesperado.");
    }

    #[test]
    fn webhook_token_is_forbidden() {
        let api: ApiError = AppError::InvalidWebhookToken.into();
        assert_eq!(api.status, StatusCode::FORBIDDEN);
    }
}
