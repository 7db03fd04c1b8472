//! services/gemini_service.rs
//! Cliente de generación de texto (Gemini `generateContent`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ServiceError;

const SERVICE_NAME: &str = "Gemini";
/// La clave viaja en este header; en la URL terminaría en los mensajes de error.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Completado de texto de un solo turno.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_content(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Texto concatenado del primer candidato.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("No se pudo construir el cliente HTTP de Gemini")?;

        if api_key.is_none() {
            log::warn!("GEMINI_API_KEY no definido: toda personalización fallará y se usarán los textos originales");
        }

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_content(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::external(SERVICE_NAME, "Gemini API key not configured"))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        log::debug!(
            "(generate_content) modelo={} prompt={} chars",
            self.model,
            prompt.len()
        );

        let resp = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::external(SERVICE_NAME, format!("Request falló: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalService {
                service: SERVICE_NAME,
                status: status.as_u16(),
                message: format!("HTTP {}: {}", status, raw.replace(api_key, "[redacted]")),
            }
            .into());
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::external(SERVICE_NAME, format!("Respuesta inválida: {}", e.without_url())))?;

        parsed
            .text()
            .ok_or_else(|| anyhow::Error::from(ServiceError::external(SERVICE_NAME, "Respuesta sin candidatos")))
    }
}
