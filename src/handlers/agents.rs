// src/handlers/agents.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    models::agent::{AgentView, UpdateAgentRequest, UpdateAgentResponse},
};

// GET /api/agents
#[utoipa::path(
    get,
    path = "/api/agents",
    tag = "Agents",
    responses((status = 200, description = "Agentes com credenciais mascaradas", body = Vec<AgentView>))
)]
pub async fn list_agents(State(app_state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let agents = app_state.agent_service.list().await?;
    Ok((StatusCode::OK, Json(agents)))
}

// GET /api/agents/{id}
#[utoipa::path(
    get,
    path = "/api/agents/{id}",
    tag = "Agents",
    params(("id" = Uuid, Path, description = "ID do agente")),
    responses(
        (status = 200, description = "Agente com credenciais mascaradas", body = AgentView),
        (status = 404, description = "Agente não encontrado")
    )
)]
pub async fn get_agent(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = app_state.agent_service.get(id).await?;
    Ok((StatusCode::OK, Json(agent)))
}

// PUT /api/agents/{id}
// Tokens só são gravados com `updateTokens: true`; valores mascarados voltam como rejeitados.
#[utoipa::path(
    put,
    path = "/api/agents/{id}",
    tag = "Agents",
    params(("id" = Uuid, Path, description = "ID do agente")),
    request_body = UpdateAgentRequest,
    responses(
        (status = 200, description = "Agente atualizado, com o destino de cada token", body = UpdateAgentResponse),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Agente não encontrado")
    )
)]
pub async fn update_agent(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAgentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = app_state.agent_service.update(id, payload).await?;
    Ok((StatusCode::OK, Json(response)))
}
