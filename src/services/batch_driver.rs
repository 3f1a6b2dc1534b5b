// src/services/batch_driver.rs

//! Lote de reprocessamento dos leads incompletos.
//!
//! Um lead por vez, com pausa fixa entre eles. Para depois de
//! `MAX_CONSECUTIVE_FAILURES` falhas seguidas; o cancelamento só impede o próximo lead.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::LeadStore,
    models::batch::{BatchProgress, BatchState},
    services::lead_pipeline::LeadProcessor,
};

pub const PACING_DELAY: Duration = Duration::from_secs(1);
pub const MAX_CONSECUTIVE_FAILURES: usize = 5;
pub const DEFAULT_BATCH_LIMIT: i64 = 50;

type SharedProgress = Arc<Mutex<BatchProgress>>;

fn lock(progress: &SharedProgress) -> MutexGuard<'_, BatchProgress> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct BatchDriver {
    processor: Arc<dyn LeadProcessor>,
    delay: Duration,
    max_failures: usize,
}

impl BatchDriver {
    pub fn new(processor: Arc<dyn LeadProcessor>, delay: Duration) -> Self {
        Self { processor, delay, max_failures: MAX_CONSECUTIVE_FAILURES }
    }

    /// Processa os leads em ordem e devolve o estado final do lote.
    pub async fn run(
        &self,
        lead_ids: Vec<Uuid>,
        progress: SharedProgress,
        cancel: CancellationToken,
    ) -> BatchState {
        let mut final_state = BatchState::Completed;

        for (index, lead_id) in lead_ids.iter().copied().enumerate() {
            if index > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
            if cancel.is_cancelled() {
                tracing::info!(processed = index, "⏹️ Lote cancelado");
                final_state = BatchState::Cancelled;
                break;
            }

            lock(&progress).current_lead_id = Some(lead_id);
            let result = self.processor.resume(lead_id).await;

            let mut p = lock(&progress);
            p.processed += 1;
            match result {
                Ok(_) => {
                    p.succeeded += 1;
                    p.consecutive_failures = 0;
                }
                Err(e) => {
                    tracing::warn!(lead_id = %lead_id, "⚠️ Lead falhou no lote: {}", e);
                    p.failed += 1;
                    p.consecutive_failures += 1;
                    p.last_error = Some(e.to_string());
                }
            }
            if p.consecutive_failures >= self.max_failures {
                tracing::error!(failures = p.consecutive_failures, "🛑 Lote interrompido por falhas consecutivas");
                final_state = BatchState::Aborted;
                break;
            }
        }

        let mut p = lock(&progress);
        p.state = final_state;
        p.current_lead_id = None;
        p.finished_at = Some(Utc::now());
        final_state
    }
}

/// Um lote por vez, rodando em segundo plano, com progresso consultável.
pub struct BatchController {
    store: Arc<dyn LeadStore>,
    driver: Arc<BatchDriver>,
    progress: SharedProgress,
    cancel: Mutex<Option<CancellationToken>>,
}

impl BatchController {
    pub fn new(store: Arc<dyn LeadStore>, driver: BatchDriver) -> Self {
        Self {
            store,
            driver: Arc::new(driver),
            progress: Arc::new(Mutex::new(BatchProgress::default())),
            cancel: Mutex::new(None),
        }
    }

    pub fn progress(&self) -> BatchProgress {
        lock(&self.progress).clone()
    }

    pub async fn start(&self, limit: Option<i64>) -> Result<BatchProgress, AppError> {
        if lock(&self.progress).state == BatchState::Running {
            return Err(AppError::Conflict("Já existe um lote em execução".into()));
        }

        let leads = self.store.list_incomplete(limit.unwrap_or(DEFAULT_BATCH_LIMIT)).await?;
        let lead_ids: Vec<Uuid> = leads.iter().map(|l| l.id).collect();

        let token = CancellationToken::new();
        {
            // Revalida: outro start pode ter entrado durante a consulta
            let mut p = lock(&self.progress);
            if p.state == BatchState::Running {
                return Err(AppError::Conflict("Já existe um lote em execução".into()));
            }
            *p = BatchProgress {
                state: BatchState::Running,
                total: lead_ids.len(),
                started_at: Some(Utc::now()),
                ..BatchProgress::default()
            };
        }
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());

        tracing::info!(total = lead_ids.len(), "▶️ Lote iniciado");
        let driver = self.driver.clone();
        let progress = self.progress.clone();
        tokio::spawn(async move {
            let state = driver.run(lead_ids, progress, token).await;
            tracing::info!(state = ?state, "Lote finalizado");
        });

        Ok(self.progress())
    }

    /// Pede a parada; o lead em andamento termina normalmente.
    pub fn stop(&self) -> BatchProgress {
        if let Some(token) = self.cancel.lock().unwrap_or_else(PoisonError::into_inner).take() {
            token.cancel();
        }
        self.progress()
    }
}
