// src/db/lead_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::lead::{
        CampaignType, LeadRecord, MetaSnapshot, NewLead, PipelineStep, ProcessingStatus,
    },
};

/// Persistência dos leads. Cada etapa do pipeline grava só a sua coluna.
/// Não há trava otimista: duas execuções no mesmo lead podem se sobrepor.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Cria o lead em `recibido`. Retorna `None` se o `leadgen_id` já existe.
    async fn insert_received(&self, lead: &NewLead) -> Result<Option<LeadRecord>, AppError>;

    async fn find(&self, id: Uuid) -> Result<Option<LeadRecord>, AppError>;

    async fn list(
        &self,
        status: Option<ProcessingStatus>,
        limit: i64,
    ) -> Result<Vec<LeadRecord>, AppError>;

    /// Leads que ainda não chegaram em `completado`, do mais antigo ao mais novo.
    async fn list_incomplete(&self, limit: i64) -> Result<Vec<LeadRecord>, AppError>;

    async fn set_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        current_step: &str,
    ) -> Result<(), AppError>;

    /// Reset explícito para reprocessamento (único caminho que volta o status).
    /// Volta o lead para `step` e apaga o que essa etapa e as seguintes gravaram.
    async fn reset_for_reentry(&self, id: Uuid, step: PipelineStep) -> Result<(), AppError>;

    async fn save_meta(&self, id: Uuid, meta: &MetaSnapshot) -> Result<(), AppError>;

    async fn save_cleaned(&self, id: Uuid, cleaned: &Value) -> Result<(), AppError>;

    async fn save_enrichment(
        &self,
        id: Uuid,
        enriched: &Value,
        summary: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn save_classification(
        &self,
        id: Uuid,
        campaign_type: CampaignType,
        opportunity_type_id: Option<&str>,
    ) -> Result<(), AppError>;

    async fn save_account(
        &self,
        id: Uuid,
        account_id: &str,
        account_name: &str,
        owner_id: &str,
    ) -> Result<(), AppError>;

    async fn complete(
        &self,
        id: Uuid,
        opportunity_id: &str,
        completed_at: DateTime<Utc>,
        processing_time_seconds: Decimal,
    ) -> Result<(), AppError>;

    async fn mark_failed(
        &self,
        id: Uuid,
        step: PipelineStep,
        message: &str,
    ) -> Result<(), AppError>;
}

// O repositório dos leads, responsável pela tabela 'log_leads_suvi'
#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Garante que o UPDATE achou a linha
    fn expect_row(rows: u64) -> Result<(), AppError> {
        if rows == 0 {
            return Err(AppError::LeadNotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl LeadStore for LeadRepository {
    async fn insert_received(&self, lead: &NewLead) -> Result<Option<LeadRecord>, AppError> {
        // ON CONFLICT DO NOTHING: o Facebook reenvia o mesmo evento às vezes
        let record = sqlx::query_as::<_, LeadRecord>(
            r#"
            INSERT INTO log_leads_suvi (leadgen_id, page_id, form_id, ad_id, processing_status, current_step)
            VALUES ($1, $2, $3, $4, $5, 'Lead recibido')
            ON CONFLICT (leadgen_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&lead.leadgen_id)
        .bind(&lead.page_id)
        .bind(&lead.form_id)
        .bind(&lead.ad_id)
        .bind(ProcessingStatus::Recibido)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find(&self, id: Uuid) -> Result<Option<LeadRecord>, AppError> {
        let record = sqlx::query_as::<_, LeadRecord>("SELECT * FROM log_leads_suvi WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list(
        &self,
        status: Option<ProcessingStatus>,
        limit: i64,
    ) -> Result<Vec<LeadRecord>, AppError> {
        let records = sqlx::query_as::<_, LeadRecord>(
            r#"
            SELECT * FROM log_leads_suvi
            WHERE ($1::TEXT IS NULL OR processing_status = $1)
            ORDER BY received_at DESC
            LIMIT $2
            "#,
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn list_incomplete(&self, limit: i64) -> Result<Vec<LeadRecord>, AppError> {
        let records = sqlx::query_as::<_, LeadRecord>(
            r#"
            SELECT * FROM log_leads_suvi
            WHERE processing_status <> $1
            ORDER BY received_at ASC
            LIMIT $2
            "#,
        )
        .bind(ProcessingStatus::Completado)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        current_step: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE log_leads_suvi SET processing_status = $2, current_step = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(current_step)
        .execute(&self.pool)
        .await?;
        Self::expect_row(result.rows_affected())
    }

    async fn reset_for_reentry(&self, id: Uuid, step: PipelineStep) -> Result<(), AppError> {
        // $4 = posição da etapa; colunas de etapas >= $4 voltam a NULL
        let result = sqlx::query(
            r#"
            UPDATE log_leads_suvi SET
                processing_status = $2,
                current_step = $3,
                facebook_raw_data = CASE WHEN $4 <= 0 THEN NULL ELSE facebook_raw_data END,
                facebook_cleaned_data = CASE WHEN $4 <= 1 THEN NULL ELSE facebook_cleaned_data END,
                ai_enriched_data = CASE WHEN $4 <= 2 THEN NULL ELSE ai_enriched_data END,
                ai_summary = CASE WHEN $4 <= 2 THEN NULL ELSE ai_summary END,
                ai_processed_at = CASE WHEN $4 <= 2 THEN NULL ELSE ai_processed_at END,
                campaign_type = CASE WHEN $4 <= 3 THEN NULL ELSE campaign_type END,
                opportunity_type_id = CASE WHEN $4 <= 3 THEN NULL ELSE opportunity_type_id END,
                salesforce_account_id = CASE WHEN $4 <= 4 THEN NULL ELSE salesforce_account_id END,
                salesforce_account_name = CASE WHEN $4 <= 4 THEN NULL ELSE salesforce_account_name END,
                salesforce_owner_id = CASE WHEN $4 <= 4 THEN NULL ELSE salesforce_owner_id END,
                salesforce_opportunity_id = NULL,
                error_message = NULL,
                error_step = NULL,
                completed_at = NULL,
                processing_time_seconds = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(step.status())
        .bind(step.label())
        .bind(step.position())
        .execute(&self.pool)
        .await?;
        Self::expect_row(result.rows_affected())
    }

    async fn save_meta(&self, id: Uuid, meta: &MetaSnapshot) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE log_leads_suvi SET
                facebook_raw_data = $2,
                campaign_name = COALESCE($3, campaign_name),
                ad_name = COALESCE($4, ad_name),
                ad_id = COALESCE($5, ad_id),
                form_id = COALESCE($6, form_id),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&meta.raw)
        .bind(&meta.campaign_name)
        .bind(&meta.ad_name)
        .bind(&meta.ad_id)
        .bind(&meta.form_id)
        .execute(&self.pool)
        .await?;
        Self::expect_row(result.rows_affected())
    }

    async fn save_cleaned(&self, id: Uuid, cleaned: &Value) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE log_leads_suvi SET facebook_cleaned_data = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(cleaned)
        .execute(&self.pool)
        .await?;
        Self::expect_row(result.rows_affected())
    }

    async fn save_enrichment(
        &self,
        id: Uuid,
        enriched: &Value,
        summary: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE log_leads_suvi SET
                ai_enriched_data = $2,
                ai_summary = $3,
                ai_processed_at = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(enriched)
        .bind(summary)
        .bind(processed_at)
        .execute(&self.pool)
        .await?;
        Self::expect_row(result.rows_affected())
    }

    async fn save_classification(
        &self,
        id: Uuid,
        campaign_type: CampaignType,
        opportunity_type_id: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE log_leads_suvi SET
                campaign_type = $2,
                opportunity_type_id = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(campaign_type)
        .bind(opportunity_type_id)
        .execute(&self.pool)
        .await?;
        Self::expect_row(result.rows_affected())
    }

    async fn save_account(
        &self,
        id: Uuid,
        account_id: &str,
        account_name: &str,
        owner_id: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE log_leads_suvi SET
                salesforce_account_id = $2,
                salesforce_account_name = $3,
                salesforce_owner_id = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(account_id)
        .bind(account_name)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Self::expect_row(result.rows_affected())
    }

    async fn complete(
        &self,
        id: Uuid,
        opportunity_id: &str,
        completed_at: DateTime<Utc>,
        processing_time_seconds: Decimal,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE log_leads_suvi SET
                salesforce_opportunity_id = $2,
                processing_status = $3,
                current_step = 'Completado',
                error_message = NULL,
                error_step = NULL,
                completed_at = $4,
                processing_time_seconds = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(opportunity_id)
        .bind(ProcessingStatus::Completado)
        .bind(completed_at)
        .bind(processing_time_seconds)
        .execute(&self.pool)
        .await?;
        Self::expect_row(result.rows_affected())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        step: PipelineStep,
        message: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE log_leads_suvi SET
                processing_status = $2,
                error_step = $3,
                error_message = $4,
                current_step = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(ProcessingStatus::Error)
        .bind(step.as_str())
        .bind(message)
        .bind(format!("Error en {}", step.as_str()))
        .execute(&self.pool)
        .await?;
        Self::expect_row(result.rows_affected())
    }
}
