// src/services/agent_service.rs

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::AgentStore,
    models::agent::{
        Agent, AgentProfileUpdate, AgentView, TokenField, UpdateAgentRequest, UpdateAgentResponse,
    },
    services::{
        crypto::{fingerprint, mask, SecretCipher, MASK_MARKER},
        token_guard::{evaluate, RejectReason, TokenUpdateOutcome},
    },
};

// Prefixo do hash mostrado no log de auditoria
const AUDIT_FINGERPRINT_LEN: usize = 12;

#[derive(Clone)]
pub struct AgentService {
    store: Arc<dyn AgentStore>,
    cipher: SecretCipher,
}

impl AgentService {
    pub fn new(store: Arc<dyn AgentStore>, cipher: SecretCipher) -> Self {
        Self { store, cipher }
    }

    pub async fn list(&self) -> Result<Vec<AgentView>, AppError> {
        let agents = self.store.list().await?;
        Ok(agents.iter().map(|a| self.view(a)).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<AgentView, AppError> {
        let agent = self.find(id).await?;
        Ok(self.view(&agent))
    }

    /// Atualiza o perfil e, passando pelo guard, as credenciais do WhatsApp.
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateAgentRequest,
    ) -> Result<UpdateAgentResponse, AppError> {
        request.validate()?;
        let agent = self.find(id).await?;

        let mut token_updates = Vec::with_capacity(TokenField::ALL.len());
        let mut secrets = Vec::new();
        for field in TokenField::ALL {
            let outcome = evaluate(
                field,
                request.token_value(field),
                request.update_tokens,
                field.stored(&agent),
                &self.cipher,
            )?;

            match &outcome {
                TokenUpdateOutcome::Rejected(RejectReason::FlagNotSet) => {
                    tracing::info!(agent_id = %id, field = field.column(), "Token enviado sem updateTokens, ignorado");
                }
                TokenUpdateOutcome::Rejected(reason) => {
                    tracing::warn!(agent_id = %id, field = field.column(), "⚠️ Token rejeitado: {}", reason);
                }
                TokenUpdateOutcome::Updated(ciphertext) => secrets.push((field, ciphertext.clone())),
                TokenUpdateOutcome::Unchanged => {}
            }
            token_updates.push(outcome.view(field));
        }

        if !secrets.is_empty() {
            self.audit(&agent, &secrets);
            self.store.update_secrets(id, &secrets).await?;
        }

        let profile = AgentProfileUpdate::from(&request);
        if profile != AgentProfileUpdate::default() {
            self.store.update_profile(id, &profile).await?.ok_or(AppError::AgentNotFound)?;
        }

        let agent = self.find(id).await?;
        Ok(UpdateAgentResponse { agent: self.view(&agent), token_updates })
    }

    async fn find(&self, id: Uuid) -> Result<Agent, AppError> {
        self.store.find(id).await?.ok_or(AppError::AgentNotFound)
    }

    // Snapshot em memória do antes/depois, só com hashes
    fn audit(&self, agent: &Agent, secrets: &[(TokenField, String)]) {
        let short = |plain: &str| fingerprint(plain)[..AUDIT_FINGERPRINT_LEN].to_string();
        for (field, ciphertext) in secrets {
            let before = field
                .stored(agent)
                .and_then(|stored| self.cipher.decrypt(stored).ok())
                .map(|plain| short(&plain))
                .unwrap_or_else(|| "-".into());
            let after = self.cipher.decrypt(ciphertext).map(|plain| short(&plain)).unwrap_or_default();
            tracing::info!(
                agent_id = %agent.id,
                field = field.column(),
                before = %before,
                after = %after,
                "🔐 Credencial do WhatsApp substituída"
            );
        }
    }

    fn view(&self, agent: &Agent) -> AgentView {
        let masked = |field: TokenField| {
            field.stored(agent).map(|stored| match self.cipher.decrypt(stored) {
                Ok(plain) => mask(&plain),
                Err(_) => MASK_MARKER.to_string(),
            })
        };
        AgentView {
            id: agent.id,
            client_id: agent.client_id,
            name: agent.name.clone(),
            description: agent.description.clone(),
            search_indexes: agent.search_indexes.clone(),
            workflow_ids: agent.workflow_ids.clone(),
            whatsapp_phone_number_id: agent.whatsapp_phone_number_id.clone(),
            whatsapp_business_account_id: agent.whatsapp_business_account_id.clone(),
            whatsapp_access_token: masked(TokenField::AccessToken),
            whatsapp_webhook_verify_token: masked(TokenField::WebhookVerifyToken),
            whatsapp_app_secret: masked(TokenField::AppSecret),
            has_access_token: agent.whatsapp_access_token.is_some(),
            has_webhook_verify_token: agent.whatsapp_webhook_verify_token.is_some(),
            has_app_secret: agent.whatsapp_app_secret.is_some(),
            is_active: agent.is_active,
            created_at: agent.created_at,
            updated_at: agent.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_agent(cipher: &SecretCipher) -> Agent {
    use chrono::Utc;
    Agent {
        id: Uuid::new_v4(),
        client_id: Uuid::new_v4(),
        name: "Asistente Ventas".into(),
        description: None,
        search_indexes: vec!["proyectos".into()],
        workflow_ids: vec!["wf-1".into()],
        whatsapp_phone_number_id: Some("1098".into()),
        whatsapp_business_account_id: None,
        whatsapp_access_token: Some(cipher.encrypt(&format!("EAAG{}", "a".repeat(60))).unwrap()),
        whatsapp_webhook_verify_token: Some(cipher.encrypt("verify-123").unwrap()),
        whatsapp_app_secret: None,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
