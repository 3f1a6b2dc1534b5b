// src/handlers/webhooks.rs

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    models::{
        facebook::{LeadgenWebhook, WebhookChallengeQuery, WebhookReceipt},
        module_config::ConfigKey,
    },
    services::lead_pipeline::IngestOutcome,
};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

// GET /api/webhooks/facebook-leads
#[utoipa::path(
    get,
    path = "/api/webhooks/facebook-leads",
    tag = "Webhooks",
    params(WebhookChallengeQuery),
    responses(
        (status = 200, description = "Challenge devolvido ao Facebook", body = String),
        (status = 403, description = "Token de verificação não confere")
    )
)]
pub async fn verify_webhook(
    State(app_state): State<AppState>,
    Query(query): Query<WebhookChallengeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let expected = app_state.settings.value(ConfigKey::FacebookWebhookVerifyToken).await?;

    let subscribed = query.mode.as_deref() == Some("subscribe");
    let token_ok = matches!((&expected, &query.verify_token), (Some(e), Some(t)) if e == t);
    if !subscribed || !token_ok {
        tracing::warn!(mode = ?query.mode, "⚠️ Handshake do webhook recusado");
        return Err(AppError::InvalidWebhookToken.into());
    }

    tracing::info!("✅ Webhook do Facebook verificado");
    Ok((StatusCode::OK, query.challenge.unwrap_or_default()))
}

// POST /api/webhooks/facebook-leads
#[utoipa::path(
    post,
    path = "/api/webhooks/facebook-leads",
    tag = "Webhooks",
    request_body = LeadgenWebhook,
    responses(
        (status = 200, description = "Evento recebido", body = WebhookReceipt),
        (status = 400, description = "Payload inválido"),
        (status = 403, description = "Assinatura X-Hub-Signature-256 inválida")
    )
)]
pub async fn receive_leads(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // Só dá para validar a assinatura se o app secret estiver configurado
    if let Some(secret) = app_state.settings.value(ConfigKey::FacebookAppSecret).await? {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        verify_signature(&secret, &body, signature)?;
    }

    let payload: LeadgenWebhook = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidInput(format!("Payload do webhook inválido: {e}")))?;

    let changes = payload.leadgen_changes();
    let mut receipt = WebhookReceipt { received: changes.len(), ..Default::default() };

    for change in &changes {
        match app_state.pipeline.ingest(change).await {
            Ok(IngestOutcome::Processed(_)) => receipt.processed += 1,
            Ok(IngestOutcome::Failed(failure)) => {
                tracing::warn!(lead_id = %failure.lead_id, step = %failure.step, "Lead do webhook parou com erro");
                receipt.failed += 1;
            }
            Ok(IngestOutcome::SkippedBlocked) => receipt.skipped_blocked += 1,
            Ok(IngestOutcome::SkippedDuplicate) => receipt.skipped_duplicate += 1,
            Err(e) => {
                tracing::error!(leadgen_id = %change.leadgen_id, "❌ Falha ao registrar lead do webhook: {}", e);
                receipt.failed += 1;
            }
        }
    }

    Ok((StatusCode::OK, Json(receipt)))
}

/// Confere `sha256=<hex>` contra o HMAC-SHA256 do corpo bruto.
fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> Result<(), AppError> {
    let signature = header
        .and_then(|h| h.strip_prefix("sha256="))
        .and_then(|h| hex::decode(h).ok())
        .ok_or(AppError::InvalidSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&signature).map_err(|_| AppError::InvalidSignature)
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trip() {
        let body = br#"{"object":"page","entry":[]}"#;
        let header = sign("app-secret", body);
        assert!(verify_signature("app-secret", body, Some(&header)).is_ok());
    }

    #[test]
    fn wrong_or_missing_signature_is_rejected() {
        let body = br#"{"object":"page","entry":[]}"#;
        let header = sign("outro-segredo", body);
        assert!(matches!(
            verify_signature("app-secret", body, Some(&header)),
            Err(AppError::InvalidSignature)
        ));
        assert!(verify_signature("app-secret", body, None).is_err());
        assert!(verify_signature("app-secret", body, Some("sha256=zz")).is_err());
        assert!(verify_signature("app-secret", body, Some("md5=abc")).is_err());
    }
}
