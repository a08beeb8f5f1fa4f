//! Hosted embedding providers (spec §4.2): thin `reqwest` clients against a
//! configurable endpoint. Both providers speak the same minimal JSON contract
//! (`{"input": "..."}` -> `{"embedding": [f32; N]}`); primary and secondary
//! differ only in which endpoint/config key they read, so the chain can fail
//! over between two independently-configured deployments of the same API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::error::{Error, Result};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

struct HostedProvider {
    name: &'static str,
    endpoint: String,
    api_key: Option<String>,
    dimension: usize,
    client: reqwest::Client,
}

impl HostedProvider {
    async fn embed_via_http(&self, text: &str) -> Result<Vec<f32>> {
        let mut request = self.client.post(&self.endpoint).json(&EmbedRequest { input: text });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::ProviderUnavailable(format!(
                "{} returned status {}",
                self.name,
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;
        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for HostedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_via_http(text).await
    }
}

/// The primary hosted provider (`config.hosted_primary_endpoint`), sending
/// `config.hosted_primary_api_key` as a bearer token when configured.
pub fn hosted_primary(endpoint: String, api_key: Option<String>, dimension: usize) -> Box<dyn EmbeddingProvider> {
    Box::new(HostedProvider {
        name: "hosted_primary",
        endpoint,
        api_key,
        dimension,
        client: reqwest::Client::new(),
    })
}

/// The secondary hosted provider (`config.hosted_secondary_endpoint`), tried
/// after the primary fails (spec §4.2 fallback chain), sending
/// `config.hosted_secondary_api_key` as a bearer token when configured.
pub fn hosted_secondary(endpoint: String, api_key: Option<String>, dimension: usize) -> Box<dyn EmbeddingProvider> {
    Box::new(HostedProvider {
        name: "hosted_secondary",
        endpoint,
        api_key,
        dimension,
        client: reqwest::Client::new(),
    })
}
