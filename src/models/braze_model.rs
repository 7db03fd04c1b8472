//! models/braze_model.rs
//! Requests/responses de la API REST de Braze que usa el orquestador.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct CreateContentBlockRequest {
    pub name: String,
    pub content: String,
    pub description: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlockResponse {
    pub content_block_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateEmailTemplateRequest {
    pub template_name: String,
    pub subject: String,
    pub body: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailTemplateResponse {
    pub email_template_id: String,
    #[serde(default)]
    pub template_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CanvasScheduleTime {
    /// ISO-8601
    pub time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleCanvasRequest {
    pub canvas_id: String,
    pub schedule: CanvasScheduleTime,
    pub canvas_entry_properties: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleCanvasResponse {
    #[serde(default)]
    pub dispatch_id: Option<String>,
    pub schedule_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteCanvasScheduleRequest {
    pub canvas_id: String,
    pub schedule_id: String,
}

/// Cuerpo de error que devuelve Braze en respuestas no-2xx.
#[derive(Debug, Clone, Deserialize)]
pub struct BrazeErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
}
