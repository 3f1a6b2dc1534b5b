// src/services/salesforce_oauth.rs

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::Url;

use crate::{
    common::error::AppError,
    models::{
        module_config::ConfigKey,
        salesforce::{OAuthStatus, OAuthTokenResponse},
    },
    services::{
        http::{HttpClient, UpstreamError},
        module_settings::ModuleSettings,
        salesforce_errors,
    },
};

const SERVICE: &str = "salesforce_oauth";
const MAX_PENDING_STATES: usize = 32;

/// Credenciais em uso para o REST do Salesforce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesforceSession {
    pub access_token: String,
    pub instance_url: String,
}

/// Fluxo web-server OAuth 2.0 do Salesforce. Tokens ficam na config do módulo.
pub struct SalesforceOAuth {
    http: HttpClient,
    settings: ModuleSettings,
    login_url: String,
    redirect_uri: String,
    // `state` emitidos e ainda não usados
    pending_states: Mutex<Vec<String>>,
}

impl SalesforceOAuth {
    pub fn new(
        http: HttpClient,
        settings: ModuleSettings,
        login_url: impl Into<String>,
        public_base_url: &str,
    ) -> Self {
        Self {
            http,
            settings,
            login_url: login_url.into().trim_end_matches('/').to_string(),
            redirect_uri: format!(
                "{}/api/oauth/salesforce/callback",
                public_base_url.trim_end_matches('/')
            ),
            pending_states: Mutex::new(Vec::new()),
        }
    }

    /// URL de login do Salesforce com um `state` novo.
    pub async fn authorize_url(&self) -> Result<String, AppError> {
        let client_id = self.settings.require(ConfigKey::SalesforceClientId).await?;
        let state: String =
            rand::thread_rng().sample_iter(&Alphanumeric).take(24).map(char::from).collect();
        self.remember_state(&state)?;

        let url = Url::parse_with_params(
            &format!("{}/services/oauth2/authorize", self.login_url),
            &[
                ("response_type", "code"),
                ("client_id", client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| anyhow::anyhow!("URL de login inválida: {e}"))?;
        Ok(url.to_string())
    }

    pub fn consume_state(&self, state: &str) -> Result<bool, AppError> {
        let mut pending = self.lock_states()?;
        let before = pending.len();
        pending.retain(|s| s != state);
        Ok(pending.len() != before)
    }

    /// Troca o `code` do callback pelos tokens e grava tudo na config.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthStatus, AppError> {
        let client_id = self.settings.require(ConfigKey::SalesforceClientId).await?;
        let client_secret = self.settings.require(ConfigKey::SalesforceClientSecret).await?;

        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;

        self.store(&token).await?;
        tracing::info!(instance_url = %token.instance_url, "🔗 Salesforce conectado via OAuth");
        self.status().await
    }

    /// Renova o access token com o refresh token guardado.
    pub async fn refresh(&self) -> Result<SalesforceSession, AppError> {
        let client_id = self.settings.require(ConfigKey::SalesforceClientId).await?;
        let client_secret = self.settings.require(ConfigKey::SalesforceClientSecret).await?;
        let refresh_token = self.settings.require(ConfigKey::SalesforceRefreshToken).await?;

        let token = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .await?;

        self.store(&token).await?;
        tracing::info!("🔄 Token do Salesforce renovado");
        Ok(SalesforceSession { access_token: token.access_token, instance_url: token.instance_url })
    }

    pub async fn session(&self) -> Result<SalesforceSession, AppError> {
        Ok(SalesforceSession {
            access_token: self.settings.require(ConfigKey::SalesforceAccessToken).await?,
            instance_url: self
                .settings
                .require(ConfigKey::SalesforceInstanceUrl)
                .await?
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub async fn status(&self) -> Result<OAuthStatus, AppError> {
        let access_token = self.settings.value(ConfigKey::SalesforceAccessToken).await?;
        let instance_url = self.settings.value(ConfigKey::SalesforceInstanceUrl).await?;
        let refresh_token = self.settings.value(ConfigKey::SalesforceRefreshToken).await?;
        let issued_at = self
            .settings
            .value(ConfigKey::SalesforceTokenIssuedAt)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        Ok(OAuthStatus {
            connected: access_token.is_some() && instance_url.is_some(),
            instance_url,
            issued_at,
            has_refresh_token: refresh_token.is_some(),
        })
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<OAuthTokenResponse, AppError> {
        let request = self
            .http
            .inner()
            .post(format!("{}/services/oauth2/token", self.login_url))
            .form(form);
        let response = self.http.send(SERVICE, request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::from(salesforce_errors::classify(status.as_u16(), &body)).into());
        }
        response
            .json::<OAuthTokenResponse>()
            .await
            .map_err(|e| UpstreamError::InvalidResponse { service: SERVICE, message: e.to_string() }.into())
    }

    async fn store(&self, token: &OAuthTokenResponse) -> Result<(), AppError> {
        self.settings.set_secret(ConfigKey::SalesforceAccessToken, &token.access_token).await?;
        // O refresh não devolve refresh_token: mantém o atual
        if let Some(refresh_token) = &token.refresh_token {
            self.settings.set_secret(ConfigKey::SalesforceRefreshToken, refresh_token).await?;
        }
        self.settings.set_plain(ConfigKey::SalesforceInstanceUrl, &token.instance_url).await?;
        let issued_at = token
            .issued_at
            .clone()
            .unwrap_or_else(|| Utc::now().timestamp_millis().to_string());
        self.settings.set_plain(ConfigKey::SalesforceTokenIssuedAt, &issued_at).await?;
        Ok(())
    }

    fn remember_state(&self, state: &str) -> Result<(), AppError> {
        let mut pending = self.lock_states()?;
        if pending.len() >= MAX_PENDING_STATES {
            pending.remove(0);
        }
        pending.push(state.to_string());
        Ok(())
    }

    fn lock_states(&self) -> Result<std::sync::MutexGuard<'_, Vec<String>>, AppError> {
        self.pending_states
            .lock()
            .map_err(|_| anyhow::anyhow!("lista de states OAuth envenenada").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::crypto::{test_cipher, SecretCipher};
    use crate::testing::MemoryConfigStore;
    use serde_json::json;
    use std::{sync::Arc, time::Duration};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn oauth(server: &MockServer) -> (SalesforceOAuth, Arc<MemoryConfigStore>) {
        let store = Arc::new(MemoryConfigStore::default());
        let settings = ModuleSettings::new(store.clone(), test_cipher());
        settings.set_secret(ConfigKey::SalesforceClientId, "client-id").await.unwrap();
        settings.set_secret(ConfigKey::SalesforceClientSecret, "client-secret").await.unwrap();
        let http = HttpClient::new(Duration::from_secs(5)).unwrap();
        let oauth = SalesforceOAuth::new(http, settings, server.uri(), "https://api.suvi.test/");
        (oauth, store)
    }

    #[tokio::test]
    async fn authorize_url_carries_client_and_state() {
        let server = MockServer::start().await;
        let (oauth, _) = oauth(&server).await;
        let url = Url::parse(&oauth.authorize_url().await.unwrap()).unwrap();

        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["redirect_uri"], "https://api.suvi.test/api/oauth/salesforce/callback");
        assert!(oauth.consume_state(&params["state"]).unwrap());
        assert!(!oauth.consume_state(&params["state"]).unwrap());
    }

    #[tokio::test]
    async fn exchange_code_stores_encrypted_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "00Dxx!access",
                "refresh_token": "5Aep-refresh",
                "instance_url": "https://suvi.my.salesforce.com",
                "issued_at": "1735689600000"
            })))
            .mount(&server)
            .await;

        let (oauth, store) = oauth(&server).await;
        let status = oauth.exchange_code("abc").await.unwrap();
        assert!(status.connected);
        assert!(status.has_refresh_token);
        assert_eq!(status.instance_url.as_deref(), Some("https://suvi.my.salesforce.com"));
        assert!(status.issued_at.is_some());

        let raw = store.raw("salesforce_access_token").unwrap();
        assert!(SecretCipher::is_encrypted(&raw.value));
    }

    #[tokio::test]
    async fn refresh_keeps_existing_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "00Dxx!novo",
                "instance_url": "https://suvi.my.salesforce.com"
            })))
            .mount(&server)
            .await;

        let (oauth, _) = oauth(&server).await;
        oauth.settings.set_secret(ConfigKey::SalesforceRefreshToken, "5Aep-refresh").await.unwrap();

        let session = oauth.refresh().await.unwrap();
        assert_eq!(session.access_token, "00Dxx!novo");
        assert_eq!(oauth.session().await.unwrap(), session);
        assert!(oauth.status().await.unwrap().has_refresh_token);
    }

    #[tokio::test]
    async fn rejected_grant_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "authentication failure"
            })))
            .mount(&server)
            .await;

        let (oauth, _) = oauth(&server).await;
        let err = oauth.exchange_code("velho").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(UpstreamError::Salesforce(_))));
    }
}
