// src/db/config_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{common::error::AppError, models::module_config::ConfigEntry};

/// Armazenamento chave/valor da configuração do módulo.
/// Não cifra nada: quem grava já manda o valor pronto (ver `ModuleSettings`).
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>, AppError>;

    async fn list(&self) -> Result<Vec<ConfigEntry>, AppError>;

    async fn upsert(
        &self,
        key: &str,
        value: &str,
        is_sensitive: bool,
    ) -> Result<ConfigEntry, AppError>;
}

#[derive(Clone)]
pub struct ConfigRepository {
    pool: PgPool,
}

impl ConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigStore for ConfigRepository {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>, AppError> {
        let entry = sqlx::query_as::<_, ConfigEntry>(
            "SELECT key, value, is_sensitive, updated_at FROM modulos_suvi_12_config WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn list(&self) -> Result<Vec<ConfigEntry>, AppError> {
        let entries = sqlx::query_as::<_, ConfigEntry>(
            "SELECT key, value, is_sensitive, updated_at FROM modulos_suvi_12_config ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn upsert(
        &self,
        key: &str,
        value: &str,
        is_sensitive: bool,
    ) -> Result<ConfigEntry, AppError> {
        // UPSERT (Insert or Update)
        let entry = sqlx::query_as::<_, ConfigEntry>(
            r#"
            INSERT INTO modulos_suvi_12_config (key, value, is_sensitive)
            VALUES ($1, $2, $3)
            ON CONFLICT (key)
            DO UPDATE SET
                value = EXCLUDED.value,
                is_sensitive = EXCLUDED.is_sensitive,
                updated_at = NOW()
            RETURNING key, value, is_sensitive, updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(is_sensitive)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }
}
