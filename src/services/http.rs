// src/services/http.rs

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::salesforce::ClassifiedSalesforceError;

/// Erros das chamadas a serviços externos (Graph API, IA, Salesforce).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service}: falha na requisição: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} respondeu {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service}: resposta inválida: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("credencial não configurada: {0}")]
    MissingCredential(&'static str),

    #[error(transparent)]
    Salesforce(#[from] ClassifiedSalesforceError),
}

/// Wrapper fino sobre o `reqwest::Client` compartilhado.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Envia sem olhar o status (quem chama decide o que é erro).
    pub async fn send(
        &self,
        service: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, UpstreamError> {
        request
            .send()
            .await
            .map_err(|source| UpstreamError::Request { service, source })
    }

    /// Envia, exige 2xx e decodifica o JSON.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        request: RequestBuilder,
    ) -> Result<T, UpstreamError> {
        let response = self.send(service, request).await?;
        let response = ensure_success(service, response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::InvalidResponse { service, message: e.to_string() })
    }
}

/// Converte respostas não-2xx em `UpstreamError::Status` com o corpo.
pub async fn ensure_success(
    service: &'static str,
    response: Response,
) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(service, status = status.as_u16(), "resposta de erro recebida");
    Err(UpstreamError::Status { service, status: status.as_u16(), body })
}
