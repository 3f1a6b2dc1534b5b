// src/models/lead.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::db_utils::impl_text_column;

// --- ENUMS ---

/// Status do pipeline, gravado como TEXT em `processing_status`.
/// A ordem das variantes é a ordem do pipeline; `Error` fica fora da sequência.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Recibido,
    ConsultandoFacebook,
    LimpiandoDatos,
    EnriqueciendoIa,
    Clasificando,
    CreandoCuenta,
    CreandoOportunidad,
    Completado,
    Error,
}

impl ProcessingStatus {
    pub const SEQUENCE: [ProcessingStatus; 8] = [
        ProcessingStatus::Recibido,
        ProcessingStatus::ConsultandoFacebook,
        ProcessingStatus::LimpiandoDatos,
        ProcessingStatus::EnriqueciendoIa,
        ProcessingStatus::Clasificando,
        ProcessingStatus::CreandoCuenta,
        ProcessingStatus::CreandoOportunidad,
        ProcessingStatus::Completado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Recibido => "recibido",
            ProcessingStatus::ConsultandoFacebook => "consultando_facebook",
            ProcessingStatus::LimpiandoDatos => "limpiando_datos",
            ProcessingStatus::EnriqueciendoIa => "enriqueciendo_ia",
            ProcessingStatus::Clasificando => "clasificando",
            ProcessingStatus::CreandoCuenta => "creando_cuenta",
            ProcessingStatus::CreandoOportunidad => "creando_oportunidad",
            ProcessingStatus::Completado => "completado",
            ProcessingStatus::Error => "error",
        }
    }

    // Posição na sequência; `Error` não tem posição.
    fn rank(&self) -> Option<usize> {
        Self::SEQUENCE.iter().position(|s| s == self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completado)
    }

    /// Verifica se `self -> next` é permitido sem um reset explícito.
    /// Só avança (ou regrava o mesmo status), ou salta para `error`.
    pub fn check_transition(self, next: ProcessingStatus) -> Result<(), StatusTransitionError> {
        if next == ProcessingStatus::Error {
            return Ok(());
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) if to >= from => Ok(()),
            _ => Err(StatusTransitionError { from: self, to: next }),
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("valor desconhecido: {0}")]
pub struct UnknownVariant(pub String);

impl FromStr for ProcessingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SEQUENCE
            .iter()
            .chain(std::iter::once(&ProcessingStatus::Error))
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl_text_column!(ProcessingStatus);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("transição de status não permitida: {from} -> {to}")]
pub struct StatusTransitionError {
    pub from: ProcessingStatus,
    pub to: ProcessingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    Internal,
    Agency,
}

impl CampaignType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignType::Internal => "internal",
            CampaignType::Agency => "agency",
        }
    }
}

impl FromStr for CampaignType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(CampaignType::Internal),
            "agency" => Ok(CampaignType::Agency),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl_text_column!(CampaignType);

/// Etapas do pipeline, na ordem de execução. Cada uma grava seu próprio status "em andamento".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    ConsultarMeta,
    LimpiarDatos,
    EnriquecerIa,
    Clasificar,
    CrearCuenta,
    CrearOportunidad,
}

impl PipelineStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::ConsultarMeta => "consultar_meta",
            PipelineStep::LimpiarDatos => "limpiar_datos",
            PipelineStep::EnriquecerIa => "enriquecer_ia",
            PipelineStep::Clasificar => "clasificar",
            PipelineStep::CrearCuenta => "crear_cuenta",
            PipelineStep::CrearOportunidad => "crear_oportunidad",
        }
    }

    pub fn status(&self) -> ProcessingStatus {
        match self {
            PipelineStep::ConsultarMeta => ProcessingStatus::ConsultandoFacebook,
            PipelineStep::LimpiarDatos => ProcessingStatus::LimpiandoDatos,
            PipelineStep::EnriquecerIa => ProcessingStatus::EnriqueciendoIa,
            PipelineStep::Clasificar => ProcessingStatus::Clasificando,
            PipelineStep::CrearCuenta => ProcessingStatus::CreandoCuenta,
            PipelineStep::CrearOportunidad => ProcessingStatus::CreandoOportunidad,
        }
    }

    /// Índice na ordem de execução (0 = consultar_meta).
    pub fn position(&self) -> i32 {
        *self as i32
    }

    // Texto livre para `current_step`
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStep::ConsultarMeta => "Consultando lead en Graph API",
            PipelineStep::LimpiarDatos => "Limpiando datos del formulario",
            PipelineStep::EnriquecerIa => "Enriqueciendo datos con IA",
            PipelineStep::Clasificar => "Clasificando campaña",
            PipelineStep::CrearCuenta => "Creando cuenta en Salesforce",
            PipelineStep::CrearOportunidad => "Creando oportunidad en Salesforce",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- REGISTRO DO LEAD (linha de log_leads_suvi) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub id: Uuid,
    #[schema(example = "123")]
    pub leadgen_id: String,
    pub page_id: Option<String>,
    pub form_id: Option<String>,
    pub ad_id: Option<String>,

    #[schema(example = "Lanzamiento Torre Norte")]
    pub campaign_name: Option<String>,
    pub ad_name: Option<String>,
    pub campaign_type: Option<CampaignType>,

    pub processing_status: ProcessingStatus,
    pub current_step: Option<String>,
    pub error_message: Option<String>,
    pub error_step: Option<String>,

    #[schema(value_type = Option<Object>)]
    pub facebook_raw_data: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub facebook_cleaned_data: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub ai_enriched_data: Option<Value>,
    pub ai_summary: Option<String>,
    pub ai_processed_at: Option<DateTime<Utc>>,

    pub salesforce_account_id: Option<String>,
    pub salesforce_account_name: Option<String>,
    pub salesforce_opportunity_id: Option<String>,
    pub salesforce_owner_id: Option<String>,
    pub opportunity_type_id: Option<String>,

    pub received_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<f64>, example = 12.5)]
    pub processing_time_seconds: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

/// Dados mínimos para criar um lead a partir do webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub leadgen_id: String,
    pub page_id: Option<String>,
    pub form_id: Option<String>,
    pub ad_id: Option<String>,
}

/// O que a etapa de consulta ao Graph API grava no lead.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaSnapshot {
    pub raw: Value,
    pub campaign_name: Option<String>,
    pub ad_name: Option<String>,
    pub ad_id: Option<String>,
    pub form_id: Option<String>,
}

// --- DADOS LIMPOS ---

/// Resultado da etapa de limpeza (`facebook_cleaned_data`).
/// Campos não reconhecidos do formulário ficam em `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanedLead {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub project: Option<String>,
    pub campaign_name: Option<String>,
    pub form_id: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Ids resultantes da sincronização com o Salesforce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesforceIds {
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub opportunity_id: String,
    pub owner_id: Option<String>,
}

// --- ESTÁGIO (união etiquetada derivada das colunas) ---

/// Visão tipada de "até onde o lead chegou", derivada das colunas JSON.
/// Linhas com dados fora de ordem (ex.: enriquecido sem limpo) não viram estágio.
#[derive(Debug, Clone, PartialEq)]
pub enum LeadStage {
    Received,
    MetaFetched { raw: Value },
    Cleaned { cleaned: CleanedLead },
    Enriched { enriched: Value },
    Classified { campaign_type: CampaignType },
    Synced { ids: SalesforceIds },
    Failed { step: String, message: String },
}

impl LeadStage {
    /// Estágio visível: `Failed` quando o status é `error`, senão o estágio pelos dados.
    pub fn from_record(record: &LeadRecord) -> Result<Self, String> {
        if record.processing_status == ProcessingStatus::Error {
            // Mesmo com erro, dados fora de ordem continuam sendo inconsistência
            Self::from_data(record)?;
            return Ok(LeadStage::Failed {
                step: record.error_step.clone().unwrap_or_else(|| "desconocido".into()),
                message: record.error_message.clone().unwrap_or_default(),
            });
        }
        Self::from_data(record)
    }

    /// Estágio alcançado só pelos dados gravados, ignorando o status.
    pub fn from_data(record: &LeadRecord) -> Result<Self, String> {
        let has_raw = record.facebook_raw_data.is_some();
        let has_cleaned = record.facebook_cleaned_data.is_some();
        let has_enriched = record.ai_enriched_data.is_some();
        let has_type = record.campaign_type.is_some();
        let has_opportunity = record.salesforce_opportunity_id.is_some();

        if has_cleaned && !has_raw {
            return Err("facebook_cleaned_data sin facebook_raw_data".into());
        }
        if has_enriched && !has_cleaned {
            return Err("ai_enriched_data sin facebook_cleaned_data".into());
        }
        if has_type && !has_enriched {
            return Err("campaign_type sin ai_enriched_data".into());
        }
        if has_opportunity && !has_type {
            return Err("salesforce_opportunity_id sin campaign_type".into());
        }

        if let Some(opportunity_id) = &record.salesforce_opportunity_id {
            return Ok(LeadStage::Synced {
                ids: SalesforceIds {
                    account_id: record.salesforce_account_id.clone(),
                    account_name: record.salesforce_account_name.clone(),
                    opportunity_id: opportunity_id.clone(),
                    owner_id: record.salesforce_owner_id.clone(),
                },
            });
        }
        if let Some(campaign_type) = record.campaign_type {
            return Ok(LeadStage::Classified { campaign_type });
        }
        if let Some(enriched) = &record.ai_enriched_data {
            return Ok(LeadStage::Enriched { enriched: enriched.clone() });
        }
        if let Some(cleaned) = &record.facebook_cleaned_data {
            let cleaned: CleanedLead = serde_json::from_value(cleaned.clone())
                .map_err(|e| format!("facebook_cleaned_data inválido: {e}"))?;
            return Ok(LeadStage::Cleaned { cleaned });
        }
        if let Some(raw) = &record.facebook_raw_data {
            return Ok(LeadStage::MetaFetched { raw: raw.clone() });
        }
        Ok(LeadStage::Received)
    }

    /// Próxima etapa a executar a partir deste estágio.
    pub fn next_step(&self) -> Option<PipelineStep> {
        match self {
            LeadStage::Received => Some(PipelineStep::ConsultarMeta),
            LeadStage::MetaFetched { .. } => Some(PipelineStep::LimpiarDatos),
            LeadStage::Cleaned { .. } => Some(PipelineStep::EnriquecerIa),
            LeadStage::Enriched { .. } => Some(PipelineStep::Clasificar),
            LeadStage::Classified { .. } => Some(PipelineStep::CrearCuenta),
            LeadStage::Synced { .. } => None,
            LeadStage::Failed { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LeadStage::Received => "received",
            LeadStage::MetaFetched { .. } => "meta_fetched",
            LeadStage::Cleaned { .. } => "cleaned",
            LeadStage::Enriched { .. } => "enriched",
            LeadStage::Classified { .. } => "classified",
            LeadStage::Synced { .. } => "synced",
            LeadStage::Failed { .. } => "failed",
        }
    }
}

// --- RESPOSTAS ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: LeadRecord,
    #[schema(example = "enriched")]
    pub stage: Option<String>,
    pub next_step: Option<PipelineStep>,
    pub inconsistency: Option<String>,
}

impl LeadDetail {
    pub fn from_record(lead: LeadRecord) -> Self {
        let (stage, next_step, inconsistency) = match LeadStage::from_record(&lead) {
            Ok(stage) => {
                let next = LeadStage::from_data(&lead).ok().and_then(|s| s.next_step());
                (Some(stage.name().to_string()), next, None)
            }
            Err(reason) => (None, None, Some(reason)),
        };
        Self { lead, stage, next_step, inconsistency }
    }
}

/// Lead ainda não `completado`, com a etapa onde o lote deve reentrar.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncompleteLead {
    pub id: Uuid,
    pub leadgen_id: String,
    pub campaign_name: Option<String>,
    pub processing_status: ProcessingStatus,
    pub error_step: Option<String>,
    pub error_message: Option<String>,
    pub next_step: Option<PipelineStep>,
    pub received_at: DateTime<Utc>,
}

impl From<&LeadRecord> for IncompleteLead {
    fn from(lead: &LeadRecord) -> Self {
        Self {
            id: lead.id,
            leadgen_id: lead.leadgen_id.clone(),
            campaign_name: lead.campaign_name.clone(),
            processing_status: lead.processing_status,
            error_step: lead.error_step.clone(),
            error_message: lead.error_message.clone(),
            next_step: LeadStage::from_data(lead).ok().and_then(|s| s.next_step()),
            received_at: lead.received_at,
        }
    }
}

#[cfg(test)]
pub(crate) fn blank_record(leadgen_id: &str) -> LeadRecord {
    let now = Utc::now();
    LeadRecord {
        id: Uuid::new_v4(),
        leadgen_id: leadgen_id.to_string(),
        page_id: None,
        form_id: None,
        ad_id: None,
        campaign_name: None,
        ad_name: None,
        campaign_type: None,
        processing_status: ProcessingStatus::Recibido,
        current_step: None,
        error_message: None,
        error_step: None,
        facebook_raw_data: None,
        facebook_cleaned_data: None,
        ai_enriched_data: None,
        ai_summary: None,
        ai_processed_at: None,
        salesforce_account_id: None,
        salesforce_account_name: None,
        salesforce_opportunity_id: None,
        salesforce_owner_id: None,
        opportunity_type_id: None,
        received_at: now,
        completed_at: None,
        processing_time_seconds: None,
        updated_at: now,
    }
}
