// src/testing.rs
// Dublês em memória dos repositórios, só para os testes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    routes,
    db::{AgentStore, ConfigStore, LeadStore},
    models::{
        agent::{Agent, AgentProfileUpdate, TokenField},
        lead::{
            blank_record, CampaignType, CleanedLead, LeadRecord, MetaSnapshot, NewLead, PipelineStep,
            ProcessingStatus,
        },
        module_config::ConfigEntry,
        salesforce::ClassifiedSalesforceError,
    },
    services::{
        agent_service::{sample_agent, AgentService},
        ai_client::{Enrichment, LeadEnricher},
        batch_driver::{BatchController, BatchDriver},
        crypto::test_cipher,
        graph_client::LeadSource,
        http::{HttpClient, UpstreamError},
        lead_pipeline::LeadPipeline,
        module_settings::ModuleSettings,
        owner_lottery::OwnerLottery,
        salesforce_client::{AccountPayload, AccountRef, CrmSync, OpportunityPayload},
        salesforce_oauth::SalesforceOAuth,
        salesforce_sync::SalesforceSync,
    },
};

// --- CONFIG ---

#[derive(Default)]
pub struct MemoryConfigStore {
    entries: Mutex<HashMap<String, ConfigEntry>>,
}

impl MemoryConfigStore {
    pub fn raw(&self, key: &str) -> Option<ConfigEntry> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>, AppError> {
        Ok(self.raw(key))
    }

    async fn list(&self) -> Result<Vec<ConfigEntry>, AppError> {
        let mut entries: Vec<ConfigEntry> = self.entries.lock().unwrap().values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn upsert(
        &self,
        key: &str,
        value: &str,
        is_sensitive: bool,
    ) -> Result<ConfigEntry, AppError> {
        let entry = ConfigEntry {
            key: key.to_string(),
            value: value.to_string(),
            is_sensitive,
            updated_at: Utc::now(),
        };
        self.entries.lock().unwrap().insert(key.to_string(), entry.clone());
        Ok(entry)
    }
}

// --- LEADS ---

#[derive(Default)]
pub struct MemoryLeadStore {
    leads: Mutex<Vec<LeadRecord>>,
    // Histórico de status gravados, por lead
    history: Mutex<HashMap<Uuid, Vec<ProcessingStatus>>>,
}

impl MemoryLeadStore {
    pub fn get(&self, id: Uuid) -> Option<LeadRecord> {
        self.leads.lock().unwrap().iter().find(|l| l.id == id).cloned()
    }

    pub fn put(&self, lead: LeadRecord) {
        let mut leads = self.leads.lock().unwrap();
        leads.retain(|l| l.id != lead.id);
        leads.push(lead);
    }

    pub fn by_leadgen_id(&self, leadgen_id: &str) -> Option<LeadRecord> {
        self.leads.lock().unwrap().iter().find(|l| l.leadgen_id == leadgen_id).cloned()
    }

    pub fn status_history(&self, id: Uuid) -> Vec<ProcessingStatus> {
        self.history.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut LeadRecord)) -> Result<(), AppError> {
        let mut leads = self.leads.lock().unwrap();
        let lead = leads.iter_mut().find(|l| l.id == id).ok_or(AppError::LeadNotFound)?;
        f(lead);
        lead.updated_at = Utc::now();
        Ok(())
    }

    fn record_status(&self, id: Uuid, status: ProcessingStatus) {
        self.history.lock().unwrap().entry(id).or_default().push(status);
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn insert_received(&self, lead: &NewLead) -> Result<Option<LeadRecord>, AppError> {
        let mut leads = self.leads.lock().unwrap();
        if leads.iter().any(|l| l.leadgen_id == lead.leadgen_id) {
            return Ok(None);
        }
        let mut record = blank_record(&lead.leadgen_id);
        record.page_id = lead.page_id.clone();
        record.form_id = lead.form_id.clone();
        record.ad_id = lead.ad_id.clone();
        leads.push(record.clone());
        drop(leads);
        self.record_status(record.id, ProcessingStatus::Recibido);
        Ok(Some(record))
    }

    async fn find(&self, id: Uuid) -> Result<Option<LeadRecord>, AppError> {
        Ok(self.get(id))
    }

    async fn list(
        &self,
        status: Option<ProcessingStatus>,
        limit: i64,
    ) -> Result<Vec<LeadRecord>, AppError> {
        let leads = self.leads.lock().unwrap();
        Ok(leads
            .iter()
            .filter(|l| status.is_none_or(|s| l.processing_status == s))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_incomplete(&self, limit: i64) -> Result<Vec<LeadRecord>, AppError> {
        let mut leads: Vec<LeadRecord> = self
            .leads
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.processing_status != ProcessingStatus::Completado)
            .cloned()
            .collect();
        leads.sort_by_key(|l| l.received_at);
        leads.truncate(limit as usize);
        Ok(leads)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        current_step: &str,
    ) -> Result<(), AppError> {
        self.update(id, |l| {
            l.processing_status = status;
            l.current_step = Some(current_step.to_string());
        })?;
        self.record_status(id, status);
        Ok(())
    }

    async fn reset_for_reentry(&self, id: Uuid, step: PipelineStep) -> Result<(), AppError> {
        let status = step.status();
        self.update(id, |l| {
            l.processing_status = status;
            l.current_step = Some(step.label().to_string());
            if step <= PipelineStep::ConsultarMeta {
                l.facebook_raw_data = None;
            }
            if step <= PipelineStep::LimpiarDatos {
                l.facebook_cleaned_data = None;
            }
            if step <= PipelineStep::EnriquecerIa {
                l.ai_enriched_data = None;
                l.ai_summary = None;
                l.ai_processed_at = None;
            }
            if step <= PipelineStep::Clasificar {
                l.campaign_type = None;
                l.opportunity_type_id = None;
            }
            if step <= PipelineStep::CrearCuenta {
                l.salesforce_account_id = None;
                l.salesforce_account_name = None;
                l.salesforce_owner_id = None;
            }
            l.salesforce_opportunity_id = None;
            l.error_message = None;
            l.error_step = None;
            l.completed_at = None;
            l.processing_time_seconds = None;
        })?;
        self.record_status(id, status);
        Ok(())
    }

    async fn save_meta(&self, id: Uuid, meta: &MetaSnapshot) -> Result<(), AppError> {
        self.update(id, |l| {
            l.facebook_raw_data = Some(meta.raw.clone());
            if meta.campaign_name.is_some() {
                l.campaign_name = meta.campaign_name.clone();
            }
            if meta.ad_name.is_some() {
                l.ad_name = meta.ad_name.clone();
            }
            if meta.ad_id.is_some() {
                l.ad_id = meta.ad_id.clone();
            }
            if meta.form_id.is_some() {
                l.form_id = meta.form_id.clone();
            }
        })
    }

    async fn save_cleaned(&self, id: Uuid, cleaned: &Value) -> Result<(), AppError> {
        self.update(id, |l| l.facebook_cleaned_data = Some(cleaned.clone()))
    }

    async fn save_enrichment(
        &self,
        id: Uuid,
        enriched: &Value,
        summary: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.update(id, |l| {
            l.ai_enriched_data = Some(enriched.clone());
            l.ai_summary = summary.map(str::to_string);
            l.ai_processed_at = Some(processed_at);
        })
    }

    async fn save_classification(
        &self,
        id: Uuid,
        campaign_type: CampaignType,
        opportunity_type_id: Option<&str>,
    ) -> Result<(), AppError> {
        self.update(id, |l| {
            l.campaign_type = Some(campaign_type);
            l.opportunity_type_id = opportunity_type_id.map(str::to_string);
        })
    }

    async fn save_account(
        &self,
        id: Uuid,
        account_id: &str,
        account_name: &str,
        owner_id: &str,
    ) -> Result<(), AppError> {
        self.update(id, |l| {
            l.salesforce_account_id = Some(account_id.to_string());
            l.salesforce_account_name = Some(account_name.to_string());
            l.salesforce_owner_id = Some(owner_id.to_string());
        })
    }

    async fn complete(
        &self,
        id: Uuid,
        opportunity_id: &str,
        completed_at: DateTime<Utc>,
        processing_time_seconds: Decimal,
    ) -> Result<(), AppError> {
        self.update(id, |l| {
            l.salesforce_opportunity_id = Some(opportunity_id.to_string());
            l.processing_status = ProcessingStatus::Completado;
            l.current_step = Some("Completado".into());
            l.error_message = None;
            l.error_step = None;
            l.completed_at = Some(completed_at);
            l.processing_time_seconds = Some(processing_time_seconds);
        })?;
        self.record_status(id, ProcessingStatus::Completado);
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        step: PipelineStep,
        message: &str,
    ) -> Result<(), AppError> {
        self.update(id, |l| {
            l.processing_status = ProcessingStatus::Error;
            l.error_step = Some(step.as_str().to_string());
            l.error_message = Some(message.to_string());
        })?;
        self.record_status(id, ProcessingStatus::Error);
        Ok(())
    }
}

// --- AGENTES ---

#[derive(Default)]
pub struct MemoryAgentStore {
    agents: Mutex<Vec<Agent>>,
    pub secret_writes: Mutex<usize>,
}

impl MemoryAgentStore {
    pub fn with_agent(agent: Agent) -> Self {
        let store = Self::default();
        store.agents.lock().unwrap().push(agent);
        store
    }

    pub fn get(&self, id: Uuid) -> Option<Agent> {
        self.agents.lock().unwrap().iter().find(|a| a.id == id).cloned()
    }

    pub fn writes(&self) -> usize {
        *self.secret_writes.lock().unwrap()
    }
}

#[async_trait]
impl AgentStore for MemoryAgentStore {
    async fn find(&self, id: Uuid) -> Result<Option<Agent>, AppError> {
        Ok(self.get(id))
    }

    async fn list(&self) -> Result<Vec<Agent>, AppError> {
        Ok(self.agents.lock().unwrap().clone())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &AgentProfileUpdate,
    ) -> Result<Option<Agent>, AppError> {
        let mut agents = self.agents.lock().unwrap();
        let Some(agent) = agents.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            agent.name = name.clone();
        }
        if let Some(description) = &update.description {
            agent.description = Some(description.clone());
        }
        if let Some(indexes) = &update.search_indexes {
            agent.search_indexes = indexes.clone();
        }
        if let Some(workflows) = &update.workflow_ids {
            agent.workflow_ids = workflows.clone();
        }
        if let Some(active) = update.is_active {
            agent.is_active = active;
        }
        if let Some(phone) = &update.whatsapp_phone_number_id {
            agent.whatsapp_phone_number_id = Some(phone.clone());
        }
        if let Some(account) = &update.whatsapp_business_account_id {
            agent.whatsapp_business_account_id = Some(account.clone());
        }
        agent.updated_at = Utc::now();
        Ok(Some(agent.clone()))
    }

    async fn update_secrets(
        &self,
        id: Uuid,
        secrets: &[(TokenField, String)],
    ) -> Result<(), AppError> {
        if secrets.is_empty() {
            return Ok(());
        }
        let mut agents = self.agents.lock().unwrap();
        let agent = agents.iter_mut().find(|a| a.id == id).ok_or(AppError::AgentNotFound)?;
        for (field, value) in secrets {
            let slot = match field {
                TokenField::AccessToken => &mut agent.whatsapp_access_token,
                TokenField::WebhookVerifyToken => &mut agent.whatsapp_webhook_verify_token,
                TokenField::AppSecret => &mut agent.whatsapp_app_secret,
            };
            *slot = Some(value.clone());
        }
        *self.secret_writes.lock().unwrap() += 1;
        Ok(())
    }
}

// --- GRAPH API ---

#[derive(Default)]
pub struct FakeLeadSource {
    leads: Mutex<HashMap<String, Value>>,
    calls: AtomicUsize,
}

impl FakeLeadSource {
    pub fn insert(&self, leadgen_id: &str, raw: Value) {
        self.leads.lock().unwrap().insert(leadgen_id.to_string(), raw);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeadSource for FakeLeadSource {
    async fn fetch_lead(&self, leadgen_id: &str) -> Result<Value, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.leads.lock().unwrap().get(leadgen_id).cloned().ok_or_else(|| {
            UpstreamError::Status {
                service: "graph_api",
                status: 404,
                body: format!("lead {leadgen_id} não existe"),
            }
            .into()
        })
    }
}

// --- IA ---

#[derive(Default)]
pub struct FakeEnricher {
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeEnricher {
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeadEnricher for FakeEnricher {
    async fn enrich(&self, cleaned: &CleanedLead) -> Result<Enrichment, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(UpstreamError::Status { service: "ai", status: 503, body: message }.into());
        }
        Enrichment::merge(cleaned, &json!({"resumen": "Lead interesado", "intencion": "media"}))
    }
}

// --- SALESFORCE ---

#[derive(Default)]
pub struct FakeCrm {
    members: Vec<String>,
    account_calls: AtomicUsize,
    account_owner: Mutex<Option<String>>,
    opportunities: Mutex<Vec<OpportunityPayload>>,
    opportunity_failure: Mutex<Option<ClassifiedSalesforceError>>,
}

impl FakeCrm {
    pub fn with_members(members: &[&str]) -> Self {
        Self { members: members.iter().map(|m| m.to_string()).collect(), ..Default::default() }
    }

    pub fn fail_opportunity_with(&self, error: ClassifiedSalesforceError) {
        *self.opportunity_failure.lock().unwrap() = Some(error);
    }

    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    pub fn account_owner(&self) -> Option<String> {
        self.account_owner.lock().unwrap().clone()
    }

    pub fn last_opportunity(&self) -> Option<OpportunityPayload> {
        self.opportunities.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CrmSync for FakeCrm {
    async fn upsert_account(&self, account: &AccountPayload) -> Result<AccountRef, AppError> {
        let n = self.account_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccountRef { id: format!("001FAKE{n}"), name: account.name.clone() })
    }

    async fn group_member_ids(&self, _group_id: &str) -> Result<Vec<String>, AppError> {
        Ok(self.members.clone())
    }

    async fn assign_account_owner(&self, _account_id: &str, owner_id: &str) -> Result<(), AppError> {
        *self.account_owner.lock().unwrap() = Some(owner_id.to_string());
        Ok(())
    }

    async fn upsert_opportunity(&self, opportunity: &OpportunityPayload) -> Result<String, AppError> {
        if let Some(error) = self.opportunity_failure.lock().unwrap().clone() {
            return Err(UpstreamError::Salesforce(error).into());
        }
        let mut opportunities = self.opportunities.lock().unwrap();
        opportunities.push(opportunity.clone());
        Ok(format!("006FAKE{}", opportunities.len()))
    }
}

// --- APP COMPLETO (rotas) ---

/// Estado da aplicação montado só com dublês em memória.
pub struct TestApp {
    pub state: AppState,
    pub leads: Arc<MemoryLeadStore>,
    pub agents: Arc<MemoryAgentStore>,
    pub agent_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        let cipher = test_cipher();
        let settings = ModuleSettings::new(Arc::new(MemoryConfigStore::default()), cipher.clone());
        settings.set("salesforce_owner_group_id", "00G1").await.unwrap();

        let source = Arc::new(FakeLeadSource::default());
        source.insert(
            "123",
            json!({
                "id": "123",
                "form_id": "F1",
                "campaign_name": "Random Campaign",
                "field_data": [
                    {"name": "full_name", "values": ["Ana Pérez"]},
                    {"name": "email", "values": ["ana@example.com"]}
                ]
            }),
        );

        let leads = Arc::new(MemoryLeadStore::default());
        let http = HttpClient::new(Duration::from_secs(1)).unwrap();
        let oauth = Arc::new(SalesforceOAuth::new(
            http,
            settings.clone(),
            "https://login.example.com",
            "http://localhost:3000",
        ));
        let salesforce = SalesforceSync::new(
            Arc::new(FakeCrm::with_members(&["005A", "005B"])),
            Arc::new(OwnerLottery::seeded(3)),
            settings.clone(),
        );
        let pipeline = Arc::new(LeadPipeline::new(
            leads.clone(),
            settings.clone(),
            source,
            Arc::new(FakeEnricher::default()),
            salesforce,
        ));
        let batch = Arc::new(BatchController::new(
            leads.clone(),
            BatchDriver::new(pipeline.clone(), Duration::ZERO),
        ));

        let agent = sample_agent(&cipher);
        let agent_id = agent.id;
        let agents = Arc::new(MemoryAgentStore::with_agent(agent));

        let state = AppState {
            settings,
            lead_store: leads.clone(),
            pipeline,
            batch,
            agent_service: AgentService::new(agents.clone(), cipher),
            oauth,
        };
        Self { state, leads, agents, agent_id }
    }

    pub fn router(&self) -> Router {
        routes::app(self.state.clone())
    }
}
