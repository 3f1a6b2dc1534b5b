// src/db/agent_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::agent::{Agent, AgentProfileUpdate, TokenField},
};

#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Agent>, AppError>;

    async fn list(&self) -> Result<Vec<Agent>, AppError>;

    /// Atualiza os campos não sensíveis. `None` mantém o valor atual.
    async fn update_profile(
        &self,
        id: Uuid,
        update: &AgentProfileUpdate,
    ) -> Result<Option<Agent>, AppError>;

    /// Grava apenas os segredos já cifrados que passaram pelo guard.
    async fn update_secrets(
        &self,
        id: Uuid,
        secrets: &[(TokenField, String)],
    ) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct AgentRepository {
    pool: PgPool,
}

impl AgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentStore for AgentRepository {
    async fn find(&self, id: Uuid) -> Result<Option<Agent>, AppError> {
        let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(agent)
    }

    async fn list(&self) -> Result<Vec<Agent>, AppError> {
        let agents = sqlx::query_as::<_, Agent>("SELECT * FROM agents ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(agents)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &AgentProfileUpdate,
    ) -> Result<Option<Agent>, AppError> {
        let agent = sqlx::query_as::<_, Agent>(
            r#"
            UPDATE agents SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                search_indexes = COALESCE($4, search_indexes),
                workflow_ids = COALESCE($5, workflow_ids),
                is_active = COALESCE($6, is_active),
                whatsapp_phone_number_id = COALESCE($7, whatsapp_phone_number_id),
                whatsapp_business_account_id = COALESCE($8, whatsapp_business_account_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.name.clone())
        .bind(update.description.clone())
        .bind(update.search_indexes.clone())
        .bind(update.workflow_ids.clone())
        .bind(update.is_active)
        .bind(update.whatsapp_phone_number_id.clone())
        .bind(update.whatsapp_business_account_id.clone())
        .fetch_optional(&self.pool)
        .await?;
        Ok(agent)
    }

    async fn update_secrets(
        &self,
        id: Uuid,
        secrets: &[(TokenField, String)],
    ) -> Result<(), AppError> {
        if secrets.is_empty() {
            return Ok(());
        }

        // Os nomes de coluna vêm de `TokenField::column` (lista fechada)
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE agents SET updated_at = NOW()");
        for (field, value) in secrets {
            builder.push(", ");
            builder.push(field.column());
            builder.push(" = ");
            builder.push_bind(value.clone());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::AgentNotFound);
        }
        Ok(())
    }
}
