// src/services/graph_client.rs

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    common::error::AppError,
    models::module_config::ConfigKey,
    services::{
        http::{HttpClient, UpstreamError},
        module_settings::ModuleSettings,
    },
};

const SERVICE: &str = "graph_api";

const LEAD_FIELDS: &str =
    "id,created_time,field_data,ad_id,ad_name,adset_name,campaign_id,campaign_name,form_id,platform";

/// Origem dos dados completos de um lead (Graph API em produção).
#[async_trait]
pub trait LeadSource: Send + Sync {
    async fn fetch_lead(&self, leadgen_id: &str) -> Result<Value, AppError>;
}

pub struct GraphClient {
    http: HttpClient,
    settings: ModuleSettings,
    base_url: String,
}

impl GraphClient {
    pub fn new(http: HttpClient, settings: ModuleSettings, base_url: impl Into<String>) -> Self {
        Self { http, settings, base_url: base_url.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl LeadSource for GraphClient {
    async fn fetch_lead(&self, leadgen_id: &str) -> Result<Value, AppError> {
        // Token lido a cada chamada: o painel pode trocá-lo a qualquer momento
        let token = self.settings.require(ConfigKey::FacebookAccessToken).await?;

        let request = self
            .http
            .inner()
            .get(format!("{}/{}", self.base_url, leadgen_id))
            .query(&[("fields", LEAD_FIELDS), ("access_token", token.as_str())]);

        match self.http.send_json::<Value>(SERVICE, request).await {
            Ok(raw) => Ok(raw),
            Err(UpstreamError::Status { service, status, body }) => {
                Err(UpstreamError::Status { service, status, body: graph_error_message(&body) }
                    .into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// `{"error": {"message": "...", "code": 100}}` -> só a mensagem
fn graph_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::crypto::test_cipher;
    use crate::testing::MemoryConfigStore;
    use serde_json::json;
    use std::{sync::Arc, time::Duration};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer, token: Option<&str>) -> GraphClient {
        let settings = ModuleSettings::new(Arc::new(MemoryConfigStore::default()), test_cipher());
        if let Some(token) = token {
            settings.set_secret(ConfigKey::FacebookAccessToken, token).await.unwrap();
        }
        let http = HttpClient::new(Duration::from_secs(5)).unwrap();
        GraphClient::new(http, settings, format!("{}/v19.0/", server.uri()))
    }

    #[tokio::test]
    async fn fetches_lead_with_stored_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v19.0/123"))
            .and(query_param("access_token", "EAAGtoken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "123",
                "form_id": "F1",
                "campaign_name": "Random Campaign",
                "field_data": [{"name": "email", "values": ["a@b.co"]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let raw = client(&server, Some("EAAGtoken")).await.fetch_lead("123").await.unwrap();
        assert_eq!(raw["campaign_name"], "Random Campaign");
    }

    #[tokio::test]
    async fn graph_error_keeps_only_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v19.0/999"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Unsupported get request", "code": 100}
            })))
            .mount(&server)
            .await;

        let err = client(&server, Some("EAAGtoken")).await.fetch_lead("999").await.unwrap_err();
        match err {
            AppError::Upstream(UpstreamError::Status { status, body, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "Unsupported get request");
            }
            other => panic!("erro inesperado: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_token_never_calls_graph() {
        let server = MockServer::start().await;
        let err = client(&server, None).await.fetch_lead("123").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Upstream(UpstreamError::MissingCredential("facebook_access_token"))
        ));
    }
}
