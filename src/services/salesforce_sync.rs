// src/services/salesforce_sync.rs

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    common::error::AppError,
    models::{
        lead::{CleanedLead, LeadRecord, PipelineStep, SalesforceIds},
        module_config::ConfigKey,
    },
    services::{
        campaign_classifier::Classification,
        lead_cleaner::external_account_key,
        lead_pipeline::Progress,
        module_settings::ModuleSettings,
        owner_lottery::OwnerLottery,
        salesforce_client::{AccountPayload, CrmSync, OpportunityPayload},
    },
};

// Prazo padrão de fechamento de uma oportunidade nova
const CLOSE_DATE_DAYS: i64 = 30;

/// Falha da sincronização com a etapa onde aconteceu.
#[derive(Debug)]
pub struct SyncFailure {
    pub step: PipelineStep,
    pub error: AppError,
}

impl SyncFailure {
    fn at(step: PipelineStep) -> impl FnOnce(AppError) -> SyncFailure {
        move |error| SyncFailure { step, error }
    }
}

/// Conta -> ruleta -> dono da conta -> oportunidade com o mesmo dono.
pub struct SalesforceSync {
    crm: Arc<dyn CrmSync>,
    lottery: Arc<OwnerLottery>,
    settings: ModuleSettings,
}

impl SalesforceSync {
    pub fn new(crm: Arc<dyn CrmSync>, lottery: Arc<OwnerLottery>, settings: ModuleSettings) -> Self {
        Self { crm, lottery, settings }
    }

    pub async fn sync(
        &self,
        progress: &mut Progress<'_>,
        lead: &LeadRecord,
        data: &CleanedLead,
        classification: &Classification,
    ) -> Result<SalesforceIds, SyncFailure> {
        // --- CONTA ---
        let step = PipelineStep::CrearCuenta;
        progress.enter(step).await.map_err(SyncFailure::at(step))?;

        let external_id = external_account_key(data)
            .ok_or_else(|| AppError::InvalidInput("lead sem e-mail nem telefone para a conta".into()))
            .map_err(SyncFailure::at(step))?;
        let name = data.full_name.clone().unwrap_or_else(|| external_id.clone());
        let account = self
            .crm
            .upsert_account(&AccountPayload {
                external_id,
                name,
                phone: data.phone.clone(),
                city: data.city.clone(),
                description: lead.ai_summary.clone(),
            })
            .await
            .map_err(SyncFailure::at(step))?;

        let owner_id = self.pick_owner().await.map_err(SyncFailure::at(step))?;
        self.crm
            .assign_account_owner(&account.id, &owner_id)
            .await
            .map_err(SyncFailure::at(step))?;
        progress
            .store()
            .save_account(lead.id, &account.id, &account.name, &owner_id)
            .await
            .map_err(SyncFailure::at(step))?;
        tracing::info!(lead_id = %lead.id, owner_id = %owner_id, "🎰 Dono sorteado para a conta");

        // --- OPORTUNIDADE ---
        let step = PipelineStep::CrearOportunidad;
        progress.enter(step).await.map_err(SyncFailure::at(step))?;

        let label = data
            .project
            .clone()
            .or_else(|| lead.campaign_name.clone())
            .unwrap_or_else(|| "Facebook".to_string());
        let opportunity_id = self
            .crm
            .upsert_opportunity(&OpportunityPayload {
                account_id: account.id.clone(),
                owner_id: owner_id.clone(),
                name: format!("{label} - {}", account.name),
                project: data.project.clone(),
                campaign_name: lead.campaign_name.clone(),
                record_type_id: classification.record_type_id.clone(),
                description: lead.ai_summary.clone(),
                close_date: (Utc::now() + Duration::days(CLOSE_DATE_DAYS)).date_naive(),
            })
            .await
            .map_err(SyncFailure::at(step))?;

        Ok(SalesforceIds {
            account_id: Some(account.id),
            account_name: Some(account.name),
            opportunity_id,
            owner_id: Some(owner_id),
        })
    }

    async fn pick_owner(&self) -> Result<String, AppError> {
        let group_id = self.settings.require(ConfigKey::SalesforceOwnerGroupId).await?;
        let members = self.crm.group_member_ids(&group_id).await?;
        self.lottery.pick(&members)
    }
}
