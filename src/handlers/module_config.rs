// src/handlers/module_config.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    models::module_config::{FormBlockRequest, ModuleConfigResponse, UpdateConfigRequest},
    services::module_settings::SetOutcome,
};

async fn snapshot(app_state: &AppState) -> Result<ModuleConfigResponse, AppError> {
    Ok(ModuleConfigResponse {
        entries: app_state.settings.masked_entries().await?,
        blocked_form_ids: app_state.settings.blocked_form_ids().await?,
    })
}

// GET /api/custom-module1/log-leads-suvi/config
#[utoipa::path(
    get,
    path = "/api/custom-module1/log-leads-suvi/config",
    tag = "Module Config",
    responses((status = 200, description = "Configuração com segredos mascarados", body = ModuleConfigResponse))
)]
pub async fn get_config(State(app_state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok((StatusCode::OK, Json(snapshot(&app_state).await?)))
}

// PUT /api/custom-module1/log-leads-suvi/config
#[utoipa::path(
    put,
    path = "/api/custom-module1/log-leads-suvi/config",
    tag = "Module Config",
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Configuração salva", body = ModuleConfigResponse),
        (status = 400, description = "Entrada inválida")
    )
)]
pub async fn update_config(
    State(app_state): State<AppState>,
    Json(payload): Json<UpdateConfigRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate().map_err(AppError::from)?;

    let mut saved = 0;
    for entry in &payload.entries {
        if app_state.settings.set(&entry.key, &entry.value).await? == SetOutcome::Saved {
            saved += 1;
        }
    }
    tracing::info!(saved, total = payload.entries.len(), "⚙️ Configuração do módulo atualizada");

    Ok((StatusCode::OK, Json(snapshot(&app_state).await?)))
}

// POST /api/custom-module1/log-leads-suvi/config
#[utoipa::path(
    post,
    path = "/api/custom-module1/log-leads-suvi/config",
    tag = "Module Config",
    request_body = FormBlockRequest,
    responses(
        (status = 200, description = "Lista de formulários bloqueados atualizada", body = ModuleConfigResponse),
        (status = 400, description = "Entrada inválida")
    )
)]
pub async fn update_blocked_form(
    State(app_state): State<AppState>,
    Json(payload): Json<FormBlockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate().map_err(AppError::from)?;
    app_state.settings.update_blocked_form(&payload.form_id, payload.action).await?;
    tracing::info!(form_id = %payload.form_id, action = ?payload.action, "Formulário bloqueado/desbloqueado");

    Ok((StatusCode::OK, Json(snapshot(&app_state).await?)))
}
