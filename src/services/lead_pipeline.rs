// src/services/lead_pipeline.rs

//! Orquestrador de um lead: consulta Meta -> limpeza -> IA -> classificação -> Salesforce.
//!
//! Cada etapa grava a sua coluna e o seu status. A primeira falha deixa o lead
//! em `error` com `error_step`/`error_message`; não há nova tentativa automática.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::LeadStore,
    models::{
        facebook::{GraphLead, LeadgenChange},
        lead::{
            CleanedLead, LeadRecord, LeadStage, MetaSnapshot, NewLead, PipelineStep, ProcessingStatus,
            SalesforceIds,
        },
        module_config::ConfigKey,
        salesforce::ClassifiedSalesforceError,
    },
    services::{
        ai_client::LeadEnricher,
        campaign_classifier::{classify_lead, Classification},
        graph_client::LeadSource,
        http::UpstreamError,
        lead_cleaner::LeadCleaner,
        module_settings::ModuleSettings,
        salesforce_sync::{SalesforceSync, SyncFailure},
    },
};

const DEFAULT_COUNTRY_CODE: &str = "57";

/// Falha de uma etapa, já gravada no lead.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct PipelineFailure {
    pub lead_id: Uuid,
    pub step: PipelineStep,
    pub message: String,
    pub salesforce: Option<ClassifiedSalesforceError>,
}

impl PipelineFailure {
    fn new(lead_id: Uuid, step: PipelineStep, error: &AppError) -> Self {
        let salesforce = match error {
            AppError::Upstream(UpstreamError::Salesforce(classified)) => Some(classified.clone()),
            _ => None,
        };
        Self { lead_id, step, message: error.to_string(), salesforce }
    }
}

/// Status corrente de uma execução; toda mudança passa pela checagem de avanço.
pub struct Progress<'a> {
    store: &'a dyn LeadStore,
    lead_id: Uuid,
    status: ProcessingStatus,
}

impl<'a> Progress<'a> {
    pub fn store(&self) -> &'a dyn LeadStore {
        self.store
    }

    pub async fn enter(&mut self, step: PipelineStep) -> Result<(), AppError> {
        let next = step.status();
        self.status.check_transition(next)?;
        self.store.set_status(self.lead_id, next, step.label()).await?;
        self.status = next;
        tracing::debug!(lead_id = %self.lead_id, step = %step, "➡️ Etapa iniciada");
        Ok(())
    }
}

#[derive(Debug)]
pub enum IngestOutcome {
    Processed(Box<LeadRecord>),
    Failed(PipelineFailure),
    SkippedBlocked,
    SkippedDuplicate,
}

/// Execução de um lead do início ao fim, usada pelo lote.
#[async_trait]
pub trait LeadProcessor: Send + Sync {
    async fn resume(&self, lead_id: Uuid) -> Result<LeadRecord, AppError>;
}

pub struct LeadPipeline {
    store: Arc<dyn LeadStore>,
    settings: ModuleSettings,
    source: Arc<dyn LeadSource>,
    enricher: Arc<dyn LeadEnricher>,
    salesforce: SalesforceSync,
}

impl LeadPipeline {
    pub fn new(
        store: Arc<dyn LeadStore>,
        settings: ModuleSettings,
        source: Arc<dyn LeadSource>,
        enricher: Arc<dyn LeadEnricher>,
        salesforce: SalesforceSync,
    ) -> Self {
        Self { store, settings, source, enricher, salesforce }
    }

    pub fn store(&self) -> &Arc<dyn LeadStore> {
        &self.store
    }

    /// Evento do webhook: filtra formulários bloqueados, grava `recibido` e processa.
    pub async fn ingest(&self, change: &LeadgenChange) -> Result<IngestOutcome, AppError> {
        if let Some(form_id) = &change.form_id {
            if self.settings.is_form_blocked(form_id).await? {
                tracing::info!(leadgen_id = %change.leadgen_id, form_id = %form_id, "🚫 Formulário bloqueado, lead ignorado");
                return Ok(IngestOutcome::SkippedBlocked);
            }
        }

        let new_lead = NewLead {
            leadgen_id: change.leadgen_id.clone(),
            page_id: change.page_id.clone(),
            form_id: change.form_id.clone(),
            ad_id: change.ad_id.clone(),
        };
        let Some(lead) = self.store.insert_received(&new_lead).await? else {
            tracing::info!(leadgen_id = %change.leadgen_id, "Lead duplicado, ignorado");
            return Ok(IngestOutcome::SkippedDuplicate);
        };
        tracing::info!(lead_id = %lead.id, leadgen_id = %lead.leadgen_id, "📥 Lead recebido");

        match self.run(lead.id).await {
            Ok(record) => Ok(IngestOutcome::Processed(Box::new(record))),
            Err(AppError::Pipeline(failure)) => Ok(IngestOutcome::Failed(failure)),
            Err(e) => Err(e),
        }
    }

    /// Pipeline completo a partir da consulta ao Graph API.
    pub async fn run(&self, lead_id: Uuid) -> Result<LeadRecord, AppError> {
        let lead = self.load(lead_id).await?;
        let mut progress = self.reenter(&lead, PipelineStep::ConsultarMeta).await?;
        let cleaned = self.fetch_and_clean(&mut progress, &lead).await?;
        self.enrich_and_sync(&mut progress, lead_id, &cleaned).await
    }

    /// Refaz só a consulta ao Graph API e a limpeza.
    pub async fn consult_meta(&self, lead_id: Uuid) -> Result<LeadRecord, AppError> {
        let lead = self.load(lead_id).await?;
        let mut progress = self.reenter(&lead, PipelineStep::ConsultarMeta).await?;
        self.fetch_and_clean(&mut progress, &lead).await?;
        self.load(lead_id).await
    }

    /// Refaz o enriquecimento a partir de `facebook_cleaned_data`.
    pub async fn reprocess_from_cleaned(&self, lead_id: Uuid) -> Result<LeadRecord, AppError> {
        let lead = self.load(lead_id).await?;
        let cleaned = cleaned_data(&lead)?;
        let mut progress = self.reenter(&lead, PipelineStep::EnriquecerIa).await?;
        self.enrich(&mut progress, lead_id, &cleaned).await?;
        self.load(lead_id).await
    }

    /// Classifica e sincroniza com o Salesforce usando `ai_enriched_data`.
    pub async fn process_salesforce(&self, lead_id: Uuid) -> Result<LeadRecord, AppError> {
        let lead = self.load(lead_id).await?;
        let enriched = enriched_data(&lead)?;
        let mut progress = self.reenter(&lead, PipelineStep::Clasificar).await?;
        self.classify_and_sync(&mut progress, &lead, &enriched).await
    }

    /// Reentra na etapa seguinte ao último dado gravado e segue até o fim.
    pub async fn resume(&self, lead_id: Uuid) -> Result<LeadRecord, AppError> {
        let lead = self.load(lead_id).await?;
        let stage = LeadStage::from_data(&lead).map_err(AppError::InconsistentLead)?;

        match stage.next_step() {
            None => Ok(lead),
            Some(PipelineStep::ConsultarMeta) => self.run(lead_id).await,
            Some(PipelineStep::LimpiarDatos) => {
                let mut progress = self.reenter(&lead, PipelineStep::LimpiarDatos).await?;
                let cleaned = self.clean(&mut progress, &lead).await?;
                self.enrich_and_sync(&mut progress, lead_id, &cleaned).await
            }
            Some(PipelineStep::EnriquecerIa) => {
                let cleaned = cleaned_data(&lead)?;
                let mut progress = self.reenter(&lead, PipelineStep::EnriquecerIa).await?;
                self.enrich_and_sync(&mut progress, lead_id, &cleaned).await
            }
            Some(_) => self.process_salesforce(lead_id).await,
        }
    }

    // --- ETAPAS ---

    async fn fetch_and_clean(
        &self,
        progress: &mut Progress<'_>,
        lead: &LeadRecord,
    ) -> Result<CleanedLead, AppError> {
        let step = PipelineStep::ConsultarMeta;
        let fetched = self.fetch_meta(progress, lead).await;
        self.checked(lead.id, step, fetched).await?;
        let lead = self.load(lead.id).await?;
        self.clean(progress, &lead).await
    }

    async fn fetch_meta(&self, progress: &mut Progress<'_>, lead: &LeadRecord) -> Result<(), AppError> {
        progress.enter(PipelineStep::ConsultarMeta).await?;
        let raw = self.source.fetch_lead(&lead.leadgen_id).await?;
        let graph: GraphLead = serde_json::from_value(raw.clone()).map_err(|e| {
            UpstreamError::InvalidResponse { service: "graph_api", message: e.to_string() }
        })?;

        let meta = MetaSnapshot {
            raw,
            campaign_name: graph.campaign_name,
            ad_name: graph.ad_name,
            ad_id: graph.ad_id,
            form_id: graph.form_id,
        };
        self.store.save_meta(lead.id, &meta).await
    }

    async fn clean(&self, progress: &mut Progress<'_>, lead: &LeadRecord) -> Result<CleanedLead, AppError> {
        let step = PipelineStep::LimpiarDatos;
        let result = async {
            progress.enter(step).await?;
            let raw = lead
                .facebook_raw_data
                .clone()
                .ok_or_else(|| AppError::InconsistentLead("lead sem facebook_raw_data".into()))?;
            let graph: GraphLead = serde_json::from_value(raw)
                .map_err(|e| AppError::InconsistentLead(format!("facebook_raw_data inválido: {e}")))?;

            let country_code = self
                .settings
                .value(ConfigKey::DefaultCountryCode)
                .await?
                .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.to_string());
            let cleaned = LeadCleaner::new(country_code).clean(&graph);
            let value = serde_json::to_value(&cleaned).map_err(anyhow::Error::from)?;
            self.store.save_cleaned(lead.id, &value).await?;
            Ok::<_, AppError>(cleaned)
        }
        .await;
        self.checked(lead.id, step, result).await
    }

    async fn enrich_and_sync(
        &self,
        progress: &mut Progress<'_>,
        lead_id: Uuid,
        cleaned: &CleanedLead,
    ) -> Result<LeadRecord, AppError> {
        let enriched = self.enrich(progress, lead_id, cleaned).await?;
        let lead = self.load(lead_id).await?;
        self.classify_and_sync(progress, &lead, &enriched).await
    }

    async fn enrich(
        &self,
        progress: &mut Progress<'_>,
        lead_id: Uuid,
        cleaned: &CleanedLead,
    ) -> Result<Value, AppError> {
        let step = PipelineStep::EnriquecerIa;
        let result = async {
            progress.enter(step).await?;
            let enrichment = self.enricher.enrich(cleaned).await?;
            self.store
                .save_enrichment(lead_id, &enrichment.data, enrichment.summary.as_deref(), Utc::now())
                .await?;
            if let Some(intent) = &enrichment.intent {
                tracing::info!(lead_id = %lead_id, intent = %intent, "🤖 Lead enriquecido");
            }
            Ok::<_, AppError>(enrichment.data)
        }
        .await;
        self.checked(lead_id, step, result).await
    }

    async fn classify_and_sync(
        &self,
        progress: &mut Progress<'_>,
        lead: &LeadRecord,
        enriched: &Value,
    ) -> Result<LeadRecord, AppError> {
        let step = PipelineStep::Clasificar;
        let result = async {
            progress.enter(step).await?;
            let classification =
                classify_lead(&self.settings, lead.campaign_name.as_deref(), lead.form_id.as_deref()).await?;
            self.store
                .save_classification(
                    lead.id,
                    classification.campaign_type,
                    classification.record_type_id.as_deref(),
                )
                .await?;
            let data: CleanedLead = serde_json::from_value(enriched.clone())
                .map_err(|e| AppError::InconsistentLead(format!("ai_enriched_data inválido: {e}")))?;
            Ok::<(Classification, CleanedLead), AppError>((classification, data))
        }
        .await;
        let (classification, data) = self.checked(lead.id, step, result).await?;

        let lead = self.load(lead.id).await?;
        let ids = self.sync_salesforce(progress, &lead, &data, &classification).await?;
        self.finish(&lead, &ids.opportunity_id).await
    }

    async fn sync_salesforce(
        &self,
        progress: &mut Progress<'_>,
        lead: &LeadRecord,
        data: &CleanedLead,
        classification: &Classification,
    ) -> Result<SalesforceIds, AppError> {
        match self.salesforce.sync(progress, lead, data, classification).await {
            Ok(ids) => Ok(ids),
            Err(SyncFailure { step, error }) => self.checked(lead.id, step, Err(error)).await,
        }
    }

    async fn finish(&self, lead: &LeadRecord, opportunity_id: &str) -> Result<LeadRecord, AppError> {
        let completed_at = Utc::now();
        let elapsed_ms = (completed_at - lead.received_at).num_milliseconds().max(0);
        let seconds = Decimal::new(elapsed_ms, 3);
        self.store.complete(lead.id, opportunity_id, completed_at, seconds).await?;
        tracing::info!(lead_id = %lead.id, opportunity_id = %opportunity_id, seconds = %seconds, "✅ Lead completado");
        self.load(lead.id).await
    }

    // --- SUPORTE ---

    async fn load(&self, lead_id: Uuid) -> Result<LeadRecord, AppError> {
        self.store.find(lead_id).await?.ok_or(AppError::LeadNotFound)
    }

    /// Ponto de entrada de uma execução. Se o status atual não permite
    /// avançar até a etapa (erro, completado, etapa posterior), faz o reset explícito.
    async fn reenter(&self, lead: &LeadRecord, step: PipelineStep) -> Result<Progress<'_>, AppError> {
        let target = step.status();
        let status = if lead.processing_status.check_transition(target).is_ok() {
            lead.processing_status
        } else {
            tracing::info!(lead_id = %lead.id, from = %lead.processing_status, step = %step, "🔁 Reprocessando lead");
            self.store.reset_for_reentry(lead.id, step).await?;
            target
        };
        Ok(Progress { store: self.store.as_ref(), lead_id: lead.id, status })
    }

    /// Grava a falha da etapa; transições inválidas não mexem no lead.
    async fn checked<T>(&self, lead_id: Uuid, step: PipelineStep, result: Result<T, AppError>) -> Result<T, AppError> {
        match result {
            Ok(value) => Ok(value),
            Err(e @ AppError::InvalidTransition(_)) => Err(e),
            Err(e) => Err(self.fail(lead_id, step, e).await),
        }
    }

    async fn fail(&self, lead_id: Uuid, step: PipelineStep, error: AppError) -> AppError {
        let failure = PipelineFailure::new(lead_id, step, &error);
        tracing::error!(lead_id = %lead_id, step = %step, "❌ Falha na etapa: {}", failure.message);
        if let Err(e) = self.store.mark_failed(lead_id, step, &failure.message).await {
            tracing::error!(lead_id = %lead_id, "Não foi possível gravar a falha: {}", e);
        }
        AppError::Pipeline(failure)
    }
}

#[async_trait]
impl LeadProcessor for LeadPipeline {
    async fn resume(&self, lead_id: Uuid) -> Result<LeadRecord, AppError> {
        LeadPipeline::resume(self, lead_id).await
    }
}

fn cleaned_data(lead: &LeadRecord) -> Result<CleanedLead, AppError> {
    let value = lead
        .facebook_cleaned_data
        .clone()
        .ok_or_else(|| AppError::Conflict("O lead ainda não tem dados limpos".into()))?;
    serde_json::from_value(value)
        .map_err(|e| AppError::InconsistentLead(format!("facebook_cleaned_data inválido: {e}")))
}

fn enriched_data(lead: &LeadRecord) -> Result<Value, AppError> {
    lead.ai_enriched_data
        .clone()
        .ok_or_else(|| AppError::Conflict("O lead ainda não foi enriquecido pela IA".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lead::CampaignType;
    use crate::models::salesforce::SalesforceErrorKind;
    use crate::services::{crypto::test_cipher, owner_lottery::OwnerLottery, salesforce_errors};
    use crate::testing::{FakeCrm, FakeEnricher, FakeLeadSource, MemoryConfigStore, MemoryLeadStore};
    use serde_json::json;

    struct Harness {
        pipeline: LeadPipeline,
        store: Arc<MemoryLeadStore>,
        crm: Arc<FakeCrm>,
        source: Arc<FakeLeadSource>,
        enricher: Arc<FakeEnricher>,
        settings: ModuleSettings,
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryLeadStore::default());
        let settings = ModuleSettings::new(Arc::new(MemoryConfigStore::default()), test_cipher());
        settings.set("salesforce_owner_group_id", "00G1").await.unwrap();
        settings.set("internal_campaigns", r#"["Torre Norte"]"#).await.unwrap();

        let source = Arc::new(FakeLeadSource::default());
        source.insert(
            "123",
            json!({
                "id": "123",
                "form_id": "F1",
                "campaign_name": "Random Campaign",
                "ad_name": "Anuncio 1",
                "field_data": [
                    {"name": "full_name", "values": ["Ana Pérez"]},
                    {"name": "email", "values": ["Ana@Example.com"]},
                    {"name": "phone_number", "values": ["3001234567"]}
                ]
            }),
        );
        let enricher = Arc::new(FakeEnricher::default());
        let crm = Arc::new(FakeCrm::with_members(&["005A", "005B"]));
        let salesforce = SalesforceSync::new(crm.clone(), Arc::new(OwnerLottery::seeded(7)), settings.clone());
        let pipeline =
            LeadPipeline::new(store.clone(), settings.clone(), source.clone(), enricher.clone(), salesforce);
        Harness { pipeline, store, crm, source, enricher, settings }
    }

    fn change(leadgen_id: &str, form_id: &str) -> LeadgenChange {
        LeadgenChange {
            leadgen_id: leadgen_id.into(),
            page_id: Some("P1".into()),
            form_id: Some(form_id.into()),
            ad_id: None,
            created_time: None,
        }
    }

    #[tokio::test]
    async fn webhook_lead_runs_to_completion() {
        let h = harness().await;
        let outcome = h.pipeline.ingest(&change("123", "F1")).await.unwrap();
        let IngestOutcome::Processed(lead) = outcome else {
            panic!("esperava lead processado, veio {outcome:?}");
        };

        assert_eq!(lead.campaign_type, Some(CampaignType::Agency));
        assert_eq!(lead.processing_status, ProcessingStatus::Completado);
        assert!(lead.salesforce_opportunity_id.is_some());
        assert!(lead.completed_at.is_some());
        assert!(lead.processing_time_seconds.is_some());
        assert_eq!(lead.campaign_name.as_deref(), Some("Random Campaign"));
        assert_eq!(lead.facebook_cleaned_data.as_ref().unwrap()["email"], "ana@example.com");

        // Sempre para frente
        let history = h.store.status_history(lead.id);
        assert_eq!(history.first(), Some(&ProcessingStatus::Recibido));
        assert_eq!(history.last(), Some(&ProcessingStatus::Completado));
        for pair in history.windows(2) {
            assert!(pair[0].check_transition(pair[1]).is_ok(), "{history:?}");
        }

        // Conta e oportunidade com o mesmo dono sorteado
        let owner = lead.salesforce_owner_id.clone().unwrap();
        assert_eq!(h.crm.account_owner(), Some(owner.clone()));
        assert_eq!(h.crm.last_opportunity().unwrap().owner_id, owner);
    }

    #[tokio::test]
    async fn blocked_form_and_duplicates_are_skipped() {
        let h = harness().await;
        h.settings.set("blocked_form_ids", r#"["F9"]"#).await.unwrap();
        assert!(matches!(
            h.pipeline.ingest(&change("555", "F9")).await.unwrap(),
            IngestOutcome::SkippedBlocked
        ));

        h.pipeline.ingest(&change("123", "F1")).await.unwrap();
        assert!(matches!(
            h.pipeline.ingest(&change("123", "F1")).await.unwrap(),
            IngestOutcome::SkippedDuplicate
        ));
    }

    #[tokio::test]
    async fn step_failure_is_recorded_without_retry() {
        let h = harness().await;
        h.enricher.fail_with("modelo indisponível");

        let outcome = h.pipeline.ingest(&change("123", "F1")).await.unwrap();
        let IngestOutcome::Failed(failure) = outcome else {
            panic!("esperava falha, veio {outcome:?}");
        };
        assert_eq!(failure.step, PipelineStep::EnriquecerIa);

        let lead = h.store.get(failure.lead_id).unwrap();
        assert_eq!(lead.processing_status, ProcessingStatus::Error);
        assert_eq!(lead.error_step.as_deref(), Some("enriquecer_ia"));
        assert!(lead.error_message.unwrap().contains("modelo indisponível"));
        assert!(lead.facebook_cleaned_data.is_some());
        assert_eq!(h.enricher.calls(), 1);
        assert_eq!(h.crm.account_calls(), 0);
    }

    #[tokio::test]
    async fn resume_reenters_at_missing_step() {
        let h = harness().await;
        h.enricher.fail_with("timeout");
        let IngestOutcome::Failed(failure) = h.pipeline.ingest(&change("123", "F1")).await.unwrap() else {
            panic!("esperava falha");
        };

        h.enricher.recover();
        let lead = h.pipeline.resume(failure.lead_id).await.unwrap();
        assert_eq!(lead.processing_status, ProcessingStatus::Completado);
        assert!(lead.error_message.is_none());
        // Graph API consultado só na primeira vez
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test]
    async fn salesforce_failure_carries_classified_error() {
        let h = harness().await;
        h.crm.fail_opportunity_with(salesforce_errors::classify(
            400,
            r#"[{"message":"invalid cross reference id","errorCode":"INVALID_CROSS_REFERENCE_KEY","fields":["OwnerId"]}]"#,
        ));

        let IngestOutcome::Failed(failure) = h.pipeline.ingest(&change("123", "F1")).await.unwrap() else {
            panic!("esperava falha");
        };
        assert_eq!(failure.step, PipelineStep::CrearOportunidad);
        let classified = failure.salesforce.expect("erro classificado");
        assert_eq!(classified.kind, SalesforceErrorKind::InvalidCrossReference);

        // A conta já ficou gravada
        let lead = h.store.get(failure.lead_id).unwrap();
        assert!(lead.salesforce_account_id.is_some());
        assert_eq!(lead.processing_status, ProcessingStatus::Error);
    }

    #[tokio::test]
    async fn manual_steps_check_prerequisites() {
        let h = harness().await;
        let Some(lead) = h.store.insert_received(&NewLead {
            leadgen_id: "123".into(),
            page_id: None,
            form_id: Some("F1".into()),
            ad_id: None,
        })
        .await
        .unwrap() else {
            panic!("lead não criado");
        };

        assert!(matches!(
            h.pipeline.reprocess_from_cleaned(lead.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            h.pipeline.process_salesforce(lead.id).await,
            Err(AppError::Conflict(_))
        ));

        let lead = h.pipeline.consult_meta(lead.id).await.unwrap();
        assert!(lead.facebook_cleaned_data.is_some());
        assert_eq!(lead.processing_status, ProcessingStatus::LimpiandoDatos);

        let lead = h.pipeline.reprocess_from_cleaned(lead.id).await.unwrap();
        assert!(lead.ai_enriched_data.is_some());
        assert_eq!(lead.ai_summary.as_deref(), Some("Lead interesado"));

        let lead = h.pipeline.process_salesforce(lead.id).await.unwrap();
        assert_eq!(lead.processing_status, ProcessingStatus::Completado);
    }

    #[tokio::test]
    async fn failed_rerun_drops_later_data_and_resumes() {
        let h = harness().await;
        let IngestOutcome::Processed(lead) = h.pipeline.ingest(&change("123", "F1")).await.unwrap() else {
            panic!("esperava lead processado");
        };
        assert_eq!(lead.processing_status, ProcessingStatus::Completado);

        h.enricher.fail_with("modelo indisponível");
        assert!(matches!(
            h.pipeline.reprocess_from_cleaned(lead.id).await,
            Err(AppError::Pipeline(_))
        ));

        // Nada do Salesforce sobra num lead que voltou para antes da sincronização
        let failed = h.store.get(lead.id).unwrap();
        assert_eq!(failed.processing_status, ProcessingStatus::Error);
        assert!(failed.facebook_cleaned_data.is_some());
        assert!(failed.ai_enriched_data.is_none());
        assert!(failed.campaign_type.is_none());
        assert!(failed.salesforce_account_id.is_none());
        assert!(failed.salesforce_opportunity_id.is_none());
        assert_eq!(
            LeadStage::from_data(&failed).unwrap().next_step(),
            Some(PipelineStep::EnriquecerIa)
        );

        h.enricher.recover();
        let resumed = h.pipeline.resume(lead.id).await.unwrap();
        assert_eq!(resumed.processing_status, ProcessingStatus::Completado);
        assert!(resumed.salesforce_opportunity_id.is_some());
        assert_eq!(h.enricher.calls(), 3);
    }

    #[tokio::test]
    async fn backward_transition_in_sync_leaves_lead_untouched() {
        let h = harness().await;
        let IngestOutcome::Processed(lead) = h.pipeline.ingest(&change("123", "F1")).await.unwrap() else {
            panic!("esperava lead processado");
        };
        let data = cleaned_data(&lead).unwrap();
        let classification = Classification { campaign_type: CampaignType::Agency, record_type_id: None };

        // Execução que já está em `completado` não pode voltar para `creando_cuenta`
        let mut progress =
            Progress { store: h.store.as_ref(), lead_id: lead.id, status: ProcessingStatus::Completado };
        let result = h.pipeline.sync_salesforce(&mut progress, &lead, &data, &classification).await;
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));

        let after = h.store.get(lead.id).unwrap();
        assert_eq!(after.processing_status, ProcessingStatus::Completado);
        assert!(after.error_step.is_none());
        assert_eq!(h.crm.account_calls(), 1);
    }

    #[tokio::test]
    async fn inconsistent_rows_are_not_resumed() {
        let h = harness().await;
        let mut lead = crate::models::lead::blank_record("777");
        lead.ai_enriched_data = Some(json!({}));
        h.store.put(lead.clone());

        assert!(matches!(
            h.pipeline.resume(lead.id).await,
            Err(AppError::InconsistentLead(_))
        ));
    }
}
