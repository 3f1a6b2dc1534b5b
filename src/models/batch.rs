// src/models/batch.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
    // Parou por falhas consecutivas
    Aborted,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub state: BatchState,
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub consecutive_failures: usize,
    pub current_lead_id: Option<Uuid>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self {
            state: BatchState::Idle,
            total: 0,
            processed: 0,
            succeeded: 0,
            failed: 0,
            consecutive_failures: 0,
            current_lead_id: None,
            last_error: None,
            started_at: None,
            finished_at: None,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartBatchRequest {
    // Limite de leads no lote (padrão 50)
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<i64>,
}

/// Corpo dos endpoints de reprocessamento manual.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadIdRequest {
    pub lead_id: Uuid,
}
