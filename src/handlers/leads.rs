// src/handlers/leads.rs

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    models::{
        batch::{BatchProgress, LeadIdRequest, StartBatchRequest},
        lead::{IncompleteLead, LeadDetail, LeadRecord, ProcessingStatus},
    },
};

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeadListQuery {
    /// Filtra por `processing_status` (ex.: `error`, `completado`)
    pub status: Option<String>,
    pub limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

// GET /api/custom-module1/log-leads-suvi
#[utoipa::path(
    get,
    path = "/api/custom-module1/log-leads-suvi",
    tag = "Leads",
    params(LeadListQuery),
    responses(
        (status = 200, description = "Leads mais recentes primeiro", body = Vec<LeadRecord>),
        (status = 400, description = "Status desconhecido")
    )
)]
pub async fn list_leads(
    State(app_state): State<AppState>,
    Query(query): Query<LeadListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(ProcessingStatus::from_str)
        .transpose()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let leads = app_state.lead_store.list(status, clamp_limit(query.limit)).await?;
    Ok((StatusCode::OK, Json(leads)))
}

// GET /api/custom-module1/log-leads-suvi/{id}
#[utoipa::path(
    get,
    path = "/api/custom-module1/log-leads-suvi/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Lead com a etapa derivada dos dados", body = LeadDetail),
        (status = 404, description = "Lead não encontrado")
    )
)]
pub async fn get_lead(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = app_state.lead_store.find(id).await?.ok_or(AppError::LeadNotFound)?;
    Ok((StatusCode::OK, Json(LeadDetail::from_record(lead))))
}

// POST /api/custom-module1/log-leads-suvi/{id}/consult-meta
#[utoipa::path(
    post,
    path = "/api/custom-module1/log-leads-suvi/{id}/consult-meta",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Dados do Graph API consultados e limpos", body = LeadDetail),
        (status = 404, description = "Lead não encontrado"),
        (status = 502, description = "Falha na etapa, gravada no lead")
    )
)]
pub async fn consult_meta(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = app_state.pipeline.consult_meta(id).await?;
    Ok((StatusCode::OK, Json(LeadDetail::from_record(lead))))
}

// POST /api/custom-module1/log-leads-suvi/reprocess-from-cleaned
#[utoipa::path(
    post,
    path = "/api/custom-module1/log-leads-suvi/reprocess-from-cleaned",
    tag = "Leads",
    request_body = LeadIdRequest,
    responses(
        (status = 200, description = "Lead reenriquecido pela IA", body = LeadDetail),
        (status = 409, description = "Lead ainda sem dados limpos"),
        (status = 502, description = "Falha na etapa, gravada no lead")
    )
)]
pub async fn reprocess_from_cleaned(
    State(app_state): State<AppState>,
    Json(payload): Json<LeadIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = app_state.pipeline.reprocess_from_cleaned(payload.lead_id).await?;
    Ok((StatusCode::OK, Json(LeadDetail::from_record(lead))))
}

// POST /api/custom-module1/log-leads-suvi/process-salesforce
#[utoipa::path(
    post,
    path = "/api/custom-module1/log-leads-suvi/process-salesforce",
    tag = "Leads",
    request_body = LeadIdRequest,
    responses(
        (status = 200, description = "Lead classificado e sincronizado", body = LeadDetail),
        (status = 409, description = "Lead ainda não enriquecido"),
        (status = 502, description = "Erro do Salesforce, classificado em `details.salesforce`")
    )
)]
pub async fn process_salesforce(
    State(app_state): State<AppState>,
    Json(payload): Json<LeadIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = app_state.pipeline.process_salesforce(payload.lead_id).await?;
    Ok((StatusCode::OK, Json(LeadDetail::from_record(lead))))
}

// GET /api/custom-module1/log-leads-suvi/incomplete
#[utoipa::path(
    get,
    path = "/api/custom-module1/log-leads-suvi/incomplete",
    tag = "Leads",
    params(LeadListQuery),
    responses((status = 200, description = "Leads não completados e a próxima etapa de cada um", body = Vec<IncompleteLead>))
)]
pub async fn list_incomplete(
    State(app_state): State<AppState>,
    Query(query): Query<LeadListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let leads = app_state.lead_store.list_incomplete(clamp_limit(query.limit)).await?;
    let incomplete: Vec<IncompleteLead> = leads.iter().map(IncompleteLead::from).collect();
    Ok((StatusCode::OK, Json(incomplete)))
}

// --- LOTE ---

// GET /api/custom-module1/log-leads-suvi/batch
#[utoipa::path(
    get,
    path = "/api/custom-module1/log-leads-suvi/batch",
    tag = "Batch",
    responses((status = 200, description = "Progresso do lote atual (ou do último)", body = BatchProgress))
)]
pub async fn batch_status(State(app_state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(app_state.batch.progress()))
}

// POST /api/custom-module1/log-leads-suvi/batch
#[utoipa::path(
    post,
    path = "/api/custom-module1/log-leads-suvi/batch",
    tag = "Batch",
    request_body = StartBatchRequest,
    responses(
        (status = 202, description = "Lote iniciado em segundo plano", body = BatchProgress),
        (status = 409, description = "Já existe um lote em execução")
    )
)]
pub async fn start_batch(
    State(app_state): State<AppState>,
    Json(payload): Json<StartBatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate().map_err(AppError::from)?;
    let progress = app_state.batch.start(payload.limit).await?;
    Ok((StatusCode::ACCEPTED, Json(progress)))
}

// POST /api/custom-module1/log-leads-suvi/batch/stop
#[utoipa::path(
    post,
    path = "/api/custom-module1/log-leads-suvi/batch/stop",
    tag = "Batch",
    responses((status = 200, description = "Parada pedida; o lead em andamento termina", body = BatchProgress))
)]
pub async fn stop_batch(State(app_state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(app_state.batch.stop()))
}
