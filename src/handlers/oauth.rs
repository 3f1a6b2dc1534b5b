// src/handlers/oauth.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    models::salesforce::{OAuthCallbackQuery, OAuthStatus},
};

// GET /api/oauth/salesforce/authorize
#[utoipa::path(
    get,
    path = "/api/oauth/salesforce/authorize",
    tag = "Salesforce OAuth",
    responses(
        (status = 307, description = "Redireciona para o login do Salesforce"),
        (status = 502, description = "salesforce_client_id não configurado")
    )
)]
pub async fn authorize(State(app_state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let url = app_state.oauth.authorize_url().await?;
    Ok(Redirect::temporary(&url))
}

// GET /api/oauth/salesforce/callback
#[utoipa::path(
    get,
    path = "/api/oauth/salesforce/callback",
    tag = "Salesforce OAuth",
    params(OAuthCallbackQuery),
    responses(
        (status = 200, description = "Tokens trocados e guardados", body = OAuthStatus),
        (status = 400, description = "Callback sem code, com erro ou state desconhecido"),
        (status = 502, description = "O Salesforce recusou a troca do code")
    )
)]
pub async fn callback(
    State(app_state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::warn!(error = %error, "⚠️ Salesforce negou a autorização: {}", description);
        return Err(AppError::InvalidInput(format!("Autorização negada: {error} {description}")).into());
    }

    let state = query.state.unwrap_or_default();
    if !app_state.oauth.consume_state(&state)? {
        return Err(AppError::InvalidInput("Parâmetro state inválido ou expirado".into()).into());
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Callback sem o parâmetro code".into()))?;

    let status = app_state.oauth.exchange_code(&code).await?;
    Ok((StatusCode::OK, Json(status)))
}

// GET /api/oauth/salesforce/status
#[utoipa::path(
    get,
    path = "/api/oauth/salesforce/status",
    tag = "Salesforce OAuth",
    responses((status = 200, description = "Estado da conexão com o Salesforce", body = OAuthStatus))
)]
pub async fn status(State(app_state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok((StatusCode::OK, Json(app_state.oauth.status().await?)))
}
