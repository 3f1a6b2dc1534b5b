// src/services/ai_client.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    common::error::AppError,
    models::{lead::CleanedLead, module_config::ConfigKey},
    services::{
        http::{HttpClient, UpstreamError},
        module_settings::ModuleSettings,
    },
};

const SERVICE: &str = "ai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = r#"Eres un asistente comercial inmobiliario. Recibes los datos de un lead
de un formulario de Facebook en JSON. Devuelve SOLO un objeto JSON con:
- los mismos campos corregidos cuando sea evidente (nombres, ciudad, proyecto),
- "resumen": resumen breve del interés del lead en español,
- "intencion": "alta", "media" o "baja".
No inventes datos que no estén en el formulario."#;

// Campos texto de `CleanedLead`
const TEXT_FIELDS: [&str; 9] = [
    "full_name",
    "first_name",
    "last_name",
    "email",
    "phone",
    "city",
    "project",
    "campaign_name",
    "form_id",
];

// --- PAYLOADS (formato compatível com OpenAI) ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

// --- RESULTADO ---

/// Dados do lead depois da IA, prontos para `ai_enriched_data`.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub data: Value,
    pub summary: Option<String>,
    pub intent: Option<String>,
}

impl Enrichment {
    /// Sobrepõe os campos do modelo aos dados limpos.
    /// Campos limpos só somem se o modelo devolver outro valor não nulo.
    pub fn merge(cleaned: &CleanedLead, model_output: &Value) -> Result<Self, AppError> {
        let mut data = match serde_json::to_value(cleaned).map_err(anyhow::Error::from)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let Some(fields) = model_output.as_object() else {
            return Err(UpstreamError::InvalidResponse {
                service: SERVICE,
                message: "a resposta do modelo não é um objeto JSON".into(),
            }
            .into());
        };
        for (key, value) in fields {
            if value.is_null() {
                continue;
            }
            if !TEXT_FIELDS.contains(&key.as_str()) {
                data.insert(key.clone(), value.clone());
                continue;
            }
            // Campos tipados de `CleanedLead` só aceitam texto
            match value {
                Value::String(_) => {
                    data.insert(key.clone(), value.clone());
                }
                Value::Number(n) => {
                    data.insert(key.clone(), Value::String(n.to_string()));
                }
                Value::Bool(b) => {
                    data.insert(key.clone(), Value::String(b.to_string()));
                }
                _ => {
                    tracing::warn!(field = %key, "⚠️ Valor da IA ignorado: tipo não textual");
                }
            }
        }

        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| fields.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            summary: text(&["resumen", "summary"]),
            intent: text(&["intencion", "intent"]),
            data: Value::Object(data),
        })
    }
}

/// Etapa de enriquecimento (modelo de linguagem em produção).
#[async_trait]
pub trait LeadEnricher: Send + Sync {
    async fn enrich(&self, cleaned: &CleanedLead) -> Result<Enrichment, AppError>;
}

pub struct AiClient {
    http: HttpClient,
    settings: ModuleSettings,
    base_url: String,
}

impl AiClient {
    pub fn new(http: HttpClient, settings: ModuleSettings, base_url: impl Into<String>) -> Self {
        Self { http, settings, base_url: base_url.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl LeadEnricher for AiClient {
    async fn enrich(&self, cleaned: &CleanedLead) -> Result<Enrichment, AppError> {
        let api_key = self.settings.require(ConfigKey::AiApiKey).await?;
        let model = self
            .settings
            .value(ConfigKey::AiModel)
            .await?
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let lead_json = serde_json::to_string(cleaned).map_err(anyhow::Error::from)?;
        let body = ChatRequest {
            model: &model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: lead_json },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.2,
        };

        tracing::debug!(model = %model, "🤖 Enviando lead para enriquecimento");
        let request = self
            .http
            .inner()
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body);
        let response: ChatResponse = self.http.send_json(SERVICE, request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| UpstreamError::InvalidResponse {
                service: SERVICE,
                message: "resposta sem conteúdo".into(),
            })?;

        let output: Value = serde_json::from_str(content.trim()).map_err(|e| {
            UpstreamError::InvalidResponse { service: SERVICE, message: e.to_string() }
        })?;

        Enrichment::merge(cleaned, &output)
    }
}
