//! services/braze_service.rs
//! Cliente HTTP de Braze y la variante sandbox que simula las escrituras.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    models::{
        braze_model::{
            BrazeErrorResponse, ContentBlockResponse, CreateContentBlockRequest,
            CreateEmailTemplateRequest, DeleteCanvasScheduleRequest, EmailTemplateResponse,
            ScheduleCanvasRequest, ScheduleCanvasResponse,
        },
        canvas_model::CanvasDetails,
    },
};

const SERVICE_NAME: &str = "Braze";
/// Latencia simulada por el sandbox en cada escritura
const SANDBOX_LATENCY: Duration = Duration::from_millis(100);

/// Operaciones de la plataforma de engagement que usa el orquestador.
#[async_trait]
pub trait EngagementPlatform: Send + Sync {
    async fn get_canvas_details(&self, canvas_id: &str) -> Result<CanvasDetails>;

    async fn create_content_block(
        &self,
        req: CreateContentBlockRequest,
    ) -> Result<ContentBlockResponse>;

    async fn create_email_template(
        &self,
        req: CreateEmailTemplateRequest,
    ) -> Result<EmailTemplateResponse>;

    async fn schedule_triggered_canvas(
        &self,
        req: ScheduleCanvasRequest,
    ) -> Result<ScheduleCanvasResponse>;

    async fn delete_scheduled_canvas(&self, req: DeleteCanvasScheduleRequest) -> Result<()>;
}

#[derive(Clone)]
pub struct BrazeClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl BrazeClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("campaign_orchestrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("No se pudo construir el cliente HTTP de Braze")?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        log::debug!("(braze) POST {}", path);
        let resp = self
            .http_client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::external(SERVICE_NAME, format!("POST {} falló: {}", path, e)))?;

        decode_response(path, resp).await
    }
}

/// Convierte la respuesta en `T` o en un `ServiceError::ExternalService` con el
/// status y el mensaje que haya mandado Braze.
async fn decode_response<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<BrazeErrorResponse>(&raw)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("Braze API request failed ({})", status));
        log::error!("(braze) {} respondió {}: {}", path, status, message);
        return Err(ServiceError::ExternalService {
            service: SERVICE_NAME,
            status: status.as_u16(),
            message,
        }
        .into());
    }

    resp.json::<T>().await.map_err(|e| {
        anyhow::Error::from(ServiceError::external(
            SERVICE_NAME,
            format!("Respuesta inválida de {}: {}", path, e),
        ))
    })
}

#[async_trait]
impl EngagementPlatform for BrazeClient {
    async fn get_canvas_details(&self, canvas_id: &str) -> Result<CanvasDetails> {
        let path = "/canvas/details";
        log::debug!("(braze) GET {} canvas_id={}", path, canvas_id);
        let resp = self
            .http_client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .query(&[("canvas_id", canvas_id)])
            .send()
            .await
            .map_err(|e| ServiceError::external(SERVICE_NAME, format!("GET {} falló: {}", path, e)))?;

        decode_response(path, resp).await
    }

    async fn create_content_block(
        &self,
        req: CreateContentBlockRequest,
    ) -> Result<ContentBlockResponse> {
        self.post_json("/content_blocks/create", &req).await
    }

    async fn create_email_template(
        &self,
        req: CreateEmailTemplateRequest,
    ) -> Result<EmailTemplateResponse> {
        self.post_json("/templates/email/create", &req).await
    }

    async fn schedule_triggered_canvas(
        &self,
        req: ScheduleCanvasRequest,
    ) -> Result<ScheduleCanvasResponse> {
        self.post_json("/canvas/trigger/schedule/create", &req).await
    }

    async fn delete_scheduled_canvas(&self, req: DeleteCanvasScheduleRequest) -> Result<()> {
        let _: serde_json::Value = self
            .post_json("/canvas/trigger/schedule/delete", &req)
            .await?;
        Ok(())
    }
}

/// Lee canvases de Braze de verdad pero simula todas las escrituras.
/// Se elige explícitamente al arrancar (BRAZE_SANDBOX_WRITES=true).
#[derive(Clone)]
pub struct SandboxPlatform {
    reads: Arc<dyn EngagementPlatform>,
}

impl SandboxPlatform {
    pub fn new(reads: Arc<dyn EngagementPlatform>) -> Self {
        Self { reads }
    }

    fn short_id(prefix: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("{}_{}", prefix, &id[..8])
    }
}

#[async_trait]
impl EngagementPlatform for SandboxPlatform {
    async fn get_canvas_details(&self, canvas_id: &str) -> Result<CanvasDetails> {
        self.reads.get_canvas_details(canvas_id).await
    }

    async fn create_content_block(
        &self,
        req: CreateContentBlockRequest,
    ) -> Result<ContentBlockResponse> {
        tokio::time::sleep(SANDBOX_LATENCY).await;
        log::info!("[SANDBOX] Content block creado: {}", req.name);
        Ok(ContentBlockResponse {
            content_block_id: Self::short_id("cb"),
        })
    }

    async fn create_email_template(
        &self,
        req: CreateEmailTemplateRequest,
    ) -> Result<EmailTemplateResponse> {
        tokio::time::sleep(SANDBOX_LATENCY).await;
        log::info!("[SANDBOX] Email template creado: {}", req.template_name);
        Ok(EmailTemplateResponse {
            email_template_id: Self::short_id("tpl"),
            template_name: Some(req.template_name),
        })
    }

    async fn schedule_triggered_canvas(
        &self,
        req: ScheduleCanvasRequest,
    ) -> Result<ScheduleCanvasResponse> {
        tokio::time::sleep(SANDBOX_LATENCY).await;
        log::info!(
            "[SANDBOX] Canvas {} programado para {}",
            req.canvas_id,
            req.schedule.time
        );
        Ok(ScheduleCanvasResponse {
            dispatch_id: Some(Self::short_id("dispatch")),
            schedule_id: Self::short_id("schedule"),
        })
    }

    async fn delete_scheduled_canvas(&self, req: DeleteCanvasScheduleRequest) -> Result<()> {
        tokio::time::sleep(SANDBOX_LATENCY).await;
        log::info!("[SANDBOX] Schedule {} cancelado", req.schedule_id);
        Ok(())
    }
}
