// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{AgentRepository, ConfigRepository, LeadRepository, LeadStore},
    services::{
        agent_service::AgentService,
        ai_client::AiClient,
        batch_driver::{BatchController, BatchDriver, PACING_DELAY},
        crypto::SecretCipher,
        graph_client::GraphClient,
        http::HttpClient,
        lead_pipeline::LeadPipeline,
        module_settings::ModuleSettings,
        owner_lottery::OwnerLottery,
        salesforce_client::SalesforceClient,
        salesforce_oauth::SalesforceOAuth,
        salesforce_sync::SalesforceSync,
    },
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuração do processo, lida das variáveis de ambiente (.env incluso).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    // Chave mestra AES-256 em base64
    pub encryption_key: String,
    pub bind_addr: String,
    pub public_base_url: String,
    pub graph_api_base_url: String,
    pub ai_api_base_url: String,
    pub salesforce_login_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let bind_addr = env_or("BIND_ADDR", "0.0.0.0:3000");
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            encryption_key: env::var("CONFIG_ENCRYPTION_KEY")
                .context("CONFIG_ENCRYPTION_KEY deve ser definida")?,
            public_base_url: env_or("PUBLIC_BASE_URL", &format!("http://{bind_addr}")),
            bind_addr,
            graph_api_base_url: env_or("GRAPH_API_BASE_URL", "https://graph.facebook.com/v19.0"),
            ai_api_base_url: env_or("AI_API_BASE_URL", "https://api.openai.com/v1"),
            salesforce_login_url: env_or("SALESFORCE_LOGIN_URL", "https://login.salesforce.com"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

pub async fn connect_db(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await?;

    tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
    Ok(db_pool)
}

#[derive(Clone)]
pub struct AppState {
    pub settings: ModuleSettings,
    pub lead_store: Arc<dyn LeadStore>,
    pub pipeline: Arc<LeadPipeline>,
    pub batch: Arc<BatchController>,
    pub agent_service: AgentService,
    pub oauth: Arc<SalesforceOAuth>,
}

impl AppState {
    pub fn new(config: &AppConfig, db_pool: PgPool) -> anyhow::Result<Self> {
        let cipher = SecretCipher::from_encoded_key(&config.encryption_key)
            .context("CONFIG_ENCRYPTION_KEY inválida")?;
        let http = HttpClient::new(HTTP_TIMEOUT)?;

        // --- Monta o gráfico de dependências ---
        let settings =
            ModuleSettings::new(Arc::new(ConfigRepository::new(db_pool.clone())), cipher.clone());
        let lead_store: Arc<dyn LeadStore> = Arc::new(LeadRepository::new(db_pool.clone()));

        let oauth = Arc::new(SalesforceOAuth::new(
            http.clone(),
            settings.clone(),
            config.salesforce_login_url.as_str(),
            &config.public_base_url,
        ));
        let salesforce = SalesforceSync::new(
            Arc::new(SalesforceClient::new(http.clone(), oauth.clone())),
            Arc::new(OwnerLottery::from_entropy()),
            settings.clone(),
        );
        let pipeline = Arc::new(LeadPipeline::new(
            lead_store.clone(),
            settings.clone(),
            Arc::new(GraphClient::new(http.clone(), settings.clone(), config.graph_api_base_url.as_str())),
            Arc::new(AiClient::new(http, settings.clone(), config.ai_api_base_url.as_str())),
            salesforce,
        ));
        let batch = Arc::new(BatchController::new(
            lead_store.clone(),
            BatchDriver::new(pipeline.clone(), PACING_DELAY),
        ));
        let agent_service = AgentService::new(Arc::new(AgentRepository::new(db_pool)), cipher);

        Ok(Self { settings, lead_store, pipeline, batch, agent_service, oauth })
    }
}
