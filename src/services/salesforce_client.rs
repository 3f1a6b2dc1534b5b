// src/services/salesforce_client.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::{
    common::{db_utils::soql_escape, error::AppError},
    models::salesforce::{GroupMemberRecord, IdRecord, QueryResponse, SObjectCreated},
    services::{
        http::{HttpClient, UpstreamError},
        salesforce_errors,
        salesforce_oauth::{SalesforceOAuth, SalesforceSession},
    },
};

const SERVICE: &str = "salesforce";
const API_VERSION: &str = "v59.0";

/// Campo externo (único) da conta: e-mail saneado do lead.
pub const ACCOUNT_EXTERNAL_ID_FIELD: &str = "Email_Externo__c";
pub const OPPORTUNITY_PROJECT_FIELD: &str = "Proyecto__c";
pub const OPPORTUNITY_CAMPAIGN_FIELD: &str = "Campana_Facebook__c";
const OPPORTUNITY_STAGE: &str = "Prospección";
const LEAD_SOURCE: &str = "Facebook Ads";

// Prefixo dos Ids de usuário (GroupMember também traz subgrupos)
const USER_ID_PREFIX: &str = "005";

#[derive(Debug, Clone, PartialEq)]
pub struct AccountPayload {
    pub external_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
}

impl AccountPayload {
    fn fields(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("Name".into(), json!(self.name));
        insert_opt(&mut fields, "Phone", &self.phone);
        insert_opt(&mut fields, "BillingCity", &self.city);
        insert_opt(&mut fields, "Description", &self.description);
        Value::Object(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityPayload {
    pub account_id: String,
    pub owner_id: String,
    pub name: String,
    pub project: Option<String>,
    pub campaign_name: Option<String>,
    pub record_type_id: Option<String>,
    pub description: Option<String>,
    pub close_date: NaiveDate,
}

impl OpportunityPayload {
    fn fields(&self, include_record_type: bool, for_create: bool) -> Value {
        let mut fields = Map::new();
        fields.insert("OwnerId".into(), json!(self.owner_id));
        insert_opt(&mut fields, "Description", &self.description);
        insert_opt(&mut fields, OPPORTUNITY_CAMPAIGN_FIELD, &self.campaign_name);
        if include_record_type {
            insert_opt(&mut fields, "RecordTypeId", &self.record_type_id);
        }
        if for_create {
            fields.insert("Name".into(), json!(self.name));
            fields.insert("AccountId".into(), json!(self.account_id));
            fields.insert("StageName".into(), json!(OPPORTUNITY_STAGE));
            fields.insert("CloseDate".into(), json!(self.close_date.format("%Y-%m-%d").to_string()));
            fields.insert("LeadSource".into(), json!(LEAD_SOURCE));
            insert_opt(&mut fields, OPPORTUNITY_PROJECT_FIELD, &self.project);
        }
        Value::Object(fields)
    }
}

fn insert_opt(fields: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), json!(value));
    }
}

/// Operações do CRM usadas pela sincronização do lead.
#[async_trait]
pub trait CrmSync: Send + Sync {
    async fn upsert_account(&self, account: &AccountPayload) -> Result<AccountRef, AppError>;

    /// Ids de usuário membros do grupo (subgrupos são descartados).
    async fn group_member_ids(&self, group_id: &str) -> Result<Vec<String>, AppError>;

    async fn assign_account_owner(&self, account_id: &str, owner_id: &str) -> Result<(), AppError>;

    /// Atualiza a oportunidade do mês (mesma conta e projeto) ou cria uma nova.
    async fn upsert_opportunity(&self, opportunity: &OpportunityPayload) -> Result<String, AppError>;
}

pub struct SalesforceClient {
    http: HttpClient,
    oauth: Arc<SalesforceOAuth>,
}

impl SalesforceClient {
    pub fn new(http: HttpClient, oauth: Arc<SalesforceOAuth>) -> Self {
        Self { http, oauth }
    }

    fn url(session: &SalesforceSession, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = Url::parse(&session.instance_url)
            .map_err(|e| anyhow::anyhow!("instance_url inválida: {e}"))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("instance_url não aceita caminho"))?
            .pop_if_empty()
            .extend(["services", "data", API_VERSION])
            .extend(segments);
        Ok(url)
    }

    /// Executa com a sessão atual; em 401 renova o token uma vez e repete.
    async fn call<F>(&self, build: F) -> Result<Response, AppError>
    where
        F: Fn(&SalesforceSession) -> Result<RequestBuilder, AppError> + Send + Sync,
    {
        let session = self.oauth.session().await?;
        let response = self.http.send(SERVICE, build(&session)?.bearer_auth(&session.access_token)).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("⚠️ Sessão do Salesforce expirada, renovando token");
            let session = self.oauth.refresh().await?;
            self.http.send(SERVICE, build(&session)?.bearer_auth(&session.access_token)).await?
        } else {
            response
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let classified = salesforce_errors::classify(status.as_u16(), &body);
        tracing::debug!(code = %classified.code, status = status.as_u16(), "Erro do Salesforce");
        Err(UpstreamError::from(classified).into())
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
        response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::InvalidResponse { service: SERVICE, message: e.to_string() }.into())
    }

    async fn query<T: DeserializeOwned>(&self, soql: &str) -> Result<Vec<T>, AppError> {
        let response = self
            .call(|s| Ok(self.http.inner().get(Self::url(s, &["query"])?).query(&[("q", soql)])))
            .await?;
        let result: QueryResponse<T> = Self::json(response).await?;
        Ok(result.records)
    }

    async fn write_opportunity(
        &self,
        existing_id: Option<&str>,
        opportunity: &OpportunityPayload,
        include_record_type: bool,
    ) -> Result<String, AppError> {
        let fields = opportunity.fields(include_record_type, existing_id.is_none());
        match existing_id {
            Some(id) => {
                self.call(|s| {
                    Ok(self.http.inner().patch(Self::url(s, &["sobjects", "Opportunity", id])?).json(&fields))
                })
                .await?;
                Ok(id.to_string())
            }
            None => {
                let response = self
                    .call(|s| {
                        Ok(self.http.inner().post(Self::url(s, &["sobjects", "Opportunity"])?).json(&fields))
                    })
                    .await?;
                let created: SObjectCreated = Self::json(response).await?;
                Ok(created.id)
            }
        }
    }

    async fn find_month_opportunity(
        &self,
        opportunity: &OpportunityPayload,
    ) -> Result<Option<String>, AppError> {
        let project_filter = match &opportunity.project {
            Some(project) => format!("{OPPORTUNITY_PROJECT_FIELD} = '{}'", soql_escape(project)),
            None => format!("{OPPORTUNITY_PROJECT_FIELD} = null"),
        };
        let soql = format!(
            "SELECT Id FROM Opportunity WHERE AccountId = '{}' AND {} AND CreatedDate = THIS_MONTH \
             ORDER BY CreatedDate DESC LIMIT 1",
            soql_escape(&opportunity.account_id),
            project_filter
        );
        let records: Vec<IdRecord> = self.query(&soql).await?;
        Ok(records.into_iter().next().map(|r| r.id))
    }
}

#[async_trait]
impl CrmSync for SalesforceClient {
    async fn upsert_account(&self, account: &AccountPayload) -> Result<AccountRef, AppError> {
        let fields = account.fields();
        let segments = ["sobjects", "Account", ACCOUNT_EXTERNAL_ID_FIELD, account.external_id.as_str()];

        let response = self
            .call(|s| Ok(self.http.inner().patch(Self::url(s, &segments)?).json(&fields)))
            .await?;

        // 201 devolve o Id; 204 (conta existente) vem sem corpo
        let body = response.text().await.unwrap_or_default();
        let id = match serde_json::from_str::<SObjectCreated>(&body) {
            Ok(created) => created.id,
            Err(_) => {
                let response = self
                    .call(|s| Ok(self.http.inner().get(Self::url(s, &segments)?).query(&[("fields", "Id")])))
                    .await?;
                let record: IdRecord = Self::json(response).await?;
                record.id
            }
        };

        tracing::info!(account_id = %id, "🏢 Conta upsertada no Salesforce");
        Ok(AccountRef { id, name: account.name.clone() })
    }

    async fn group_member_ids(&self, group_id: &str) -> Result<Vec<String>, AppError> {
        let soql = format!(
            "SELECT UserOrGroupId FROM GroupMember WHERE GroupId = '{}'",
            soql_escape(group_id)
        );
        let records: Vec<GroupMemberRecord> = self.query(&soql).await?;
        Ok(records
            .into_iter()
            .map(|r| r.user_or_group_id)
            .filter(|id| id.starts_with(USER_ID_PREFIX))
            .collect())
    }

    async fn assign_account_owner(&self, account_id: &str, owner_id: &str) -> Result<(), AppError> {
        let body = json!({ "OwnerId": owner_id });
        self.call(|s| {
            Ok(self.http.inner().patch(Self::url(s, &["sobjects", "Account", account_id])?).json(&body))
        })
        .await?;
        Ok(())
    }

    async fn upsert_opportunity(&self, opportunity: &OpportunityPayload) -> Result<String, AppError> {
        let existing = self.find_month_opportunity(opportunity).await?;

        match self.write_opportunity(existing.as_deref(), opportunity, true).await {
            Err(AppError::Upstream(UpstreamError::Salesforce(err)))
                if err.ignorable && opportunity.record_type_id.is_some() =>
            {
                // Record type rejeitado: o Salesforce aplica o padrão do perfil
                tracing::warn!(
                    record_type = ?opportunity.record_type_id,
                    "⚠️ Record type inválido, repetindo sem RecordTypeId: {}",
                    err.message
                );
                self.write_opportunity(existing.as_deref(), opportunity, false).await
            }
            other => other,
        }
    }
}
