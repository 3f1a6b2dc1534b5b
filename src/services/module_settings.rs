// src/services/module_settings.rs

use std::sync::Arc;

use crate::{
    common::error::AppError,
    db::ConfigStore,
    models::module_config::{ConfigEntry, ConfigEntryView, ConfigKey, FormBlockAction},
    services::{
        crypto::{mask, SecretCipher, MASK_MARKER},
        http::UpstreamError,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Saved,
    // Valor mascarado vindo do painel: não sobrescreve o segredo
    IgnoredMasked,
}

/// Acesso tipado à configuração do módulo (`modulos_suvi_12_config`).
/// Lido a cada etapa que precisa de credencial; nada fica em cache.
#[derive(Clone)]
pub struct ModuleSettings {
    store: Arc<dyn ConfigStore>,
    cipher: SecretCipher,
}

impl ModuleSettings {
    pub fn new(store: Arc<dyn ConfigStore>, cipher: SecretCipher) -> Self {
        Self { store, cipher }
    }

    /// Valor em texto puro (decifrado se necessário). Vazio conta como ausente.
    pub async fn value(&self, key: ConfigKey) -> Result<Option<String>, AppError> {
        let Some(entry) = self.store.get(key.as_str()).await? else {
            return Ok(None);
        };
        let value = self.decode(&entry)?;
        Ok(Some(value).filter(|v| !v.trim().is_empty()))
    }

    pub async fn require(&self, key: ConfigKey) -> Result<String, AppError> {
        self.value(key)
            .await?
            .ok_or_else(|| UpstreamError::MissingCredential(key.as_str()).into())
    }

    /// Lista guardada como array JSON. Aceita também valores separados por vírgula.
    pub async fn list(&self, key: ConfigKey) -> Result<Vec<String>, AppError> {
        let Some(raw) = self.value(key).await? else {
            return Ok(Vec::new());
        };
        Ok(parse_list(&raw).unwrap_or_else(|| {
            raw.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        }))
    }

    /// Grava uma chave vinda do painel. Segredos são cifrados; máscaras são ignoradas.
    pub async fn set(&self, key: &str, value: &str) -> Result<SetOutcome, AppError> {
        let known = ConfigKey::parse(key);

        match known {
            Some(k) if k.is_sensitive() => {
                let trimmed = value.trim();
                if trimmed.is_empty() || trimmed.ends_with(MASK_MARKER) {
                    tracing::info!(key, "Valor mascarado/vazio ignorado para chave sensível");
                    return Ok(SetOutcome::IgnoredMasked);
                }
                self.set_secret(k, trimmed).await?;
            }
            Some(k) if k.is_json_list() => {
                let items = parse_list(value).ok_or_else(|| {
                    AppError::InvalidInput(format!("'{key}' deve ser um array JSON de textos"))
                })?;
                self.save_list(k, &items).await?;
            }
            _ => {
                self.store.upsert(key, value.trim(), false).await?;
            }
        }

        Ok(SetOutcome::Saved)
    }

    /// Grava um segredo sem passar pela checagem de máscara (OAuth, por exemplo).
    pub async fn set_secret(&self, key: ConfigKey, plaintext: &str) -> Result<(), AppError> {
        let encrypted = self.cipher.ensure_encrypted(plaintext)?;
        self.store.upsert(key.as_str(), &encrypted, true).await?;
        Ok(())
    }

    pub async fn set_plain(&self, key: ConfigKey, value: &str) -> Result<(), AppError> {
        self.store.upsert(key.as_str(), value, key.is_sensitive()).await?;
        Ok(())
    }

    async fn save_list(&self, key: ConfigKey, items: &[String]) -> Result<(), AppError> {
        let json = serde_json::to_string(items).map_err(anyhow::Error::from)?;
        self.store.upsert(key.as_str(), &json, false).await?;
        Ok(())
    }

    /// Todas as entradas, com os segredos mascarados.
    pub async fn masked_entries(&self) -> Result<Vec<ConfigEntryView>, AppError> {
        let entries = self.store.list().await?;
        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            let value = if entry.is_sensitive {
                // Valor que não decifra (chave trocada) aparece só como máscara
                match self.cipher.decrypt(&entry.value) {
                    Ok(plain) => mask(&plain),
                    Err(e) => {
                        tracing::warn!(key = %entry.key, "⚠️ Segredo não decifra: {}", e);
                        MASK_MARKER.to_string()
                    }
                }
            } else {
                entry.value.clone()
            };
            views.push(ConfigEntryView {
                key: entry.key,
                value,
                is_sensitive: entry.is_sensitive,
                updated_at: entry.updated_at,
            });
        }
        Ok(views)
    }

    // --- FORMULÁRIOS BLOQUEADOS ---

    pub async fn blocked_form_ids(&self) -> Result<Vec<String>, AppError> {
        self.list(ConfigKey::BlockedFormIds).await
    }

    pub async fn is_form_blocked(&self, form_id: &str) -> Result<bool, AppError> {
        let form_id = form_id.trim();
        Ok(self.blocked_form_ids().await?.iter().any(|id| id == form_id))
    }

    pub async fn update_blocked_form(
        &self,
        form_id: &str,
        action: FormBlockAction,
    ) -> Result<Vec<String>, AppError> {
        let form_id = form_id.trim().to_string();
        let mut blocked = self.blocked_form_ids().await?;
        match action {
            FormBlockAction::Block => {
                if !blocked.contains(&form_id) {
                    blocked.push(form_id);
                }
            }
            FormBlockAction::Unblock => blocked.retain(|id| *id != form_id),
        }
        self.save_list(ConfigKey::BlockedFormIds, &blocked).await?;
        Ok(blocked)
    }

    fn decode(&self, entry: &ConfigEntry) -> Result<String, AppError> {
        if entry.is_sensitive || SecretCipher::is_encrypted(&entry.value) {
            return Ok(self.cipher.decrypt(&entry.value)?);
        }
        Ok(entry.value.clone())
    }
}

fn parse_list(raw: &str) -> Option<Vec<String>> {
    let items: Vec<String> = serde_json::from_str(raw).ok()?;
    Some(
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    )
}
