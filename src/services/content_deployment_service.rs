//! services/content_deployment_service.rs
//! Sube mensajes personalizados a Braze como content blocks reutilizables.

use chrono::Utc;
use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::{
    models::{
        automation_model::{
            BatchDeploymentResult, BatchItemError, ContentBlockDeployment, DeploymentStatus,
            PersonalizedMessageDeployment,
        },
        braze_model::CreateContentBlockRequest,
    },
    services::{braze_service::EngagementPlatform, ledger_service::DeploymentLedger, pacing::RequestPacer},
};

/// Braze acepta hasta 50KB; dejamos margen.
pub const MAX_CONTENT_CHARS: usize = 40_000;
pub const TRUNCATION_MARKER: &str = "<!-- truncated -->";
pub const MAX_BLOCK_NAME_LEN: usize = 100;

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("regex válida"))
}

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9_]").expect("regex válida"))
}

/// minúsculas, espacios -> '_', fuera todo lo que no sea [a-z0-9_], máximo 100.
pub fn sanitize_block_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let underscored = whitespace().replace_all(&lowered, "_");
    let cleaned = disallowed_chars().replace_all(&underscored, "");
    cleaned.chars().take(MAX_BLOCK_NAME_LEN).collect()
}

/// Nombre determinista del content block para una combinación canvas/step/canal/campo/segmento.
pub fn content_block_name(
    canvas_id: &str,
    step_id: &str,
    channel: &str,
    field: &str,
    segment: &str,
) -> String {
    let segment = sanitize_block_name(segment);
    sanitize_block_name(&format!(
        "{}_{}_{}_{}_{}",
        canvas_id, step_id, channel, field, segment
    ))
}

/// Tag Liquid con el que Braze inserta el content block.
pub fn liquid_tag(block_name: &str) -> String {
    format!("{{% content_blocks('{}') %}}", block_name)
}

/// Corta a `MAX_CONTENT_CHARS` caracteres y añade el marcador.
pub fn truncate_content(content: &str) -> String {
    match content.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((cut, _)) => format!("{}{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

#[derive(Clone)]
pub struct ContentDeploymentService {
    platform: Arc<dyn EngagementPlatform>,
    ledger: DeploymentLedger,
    pacer: RequestPacer,
}

impl ContentDeploymentService {
    pub fn new(
        platform: Arc<dyn EngagementPlatform>,
        ledger: DeploymentLedger,
        pacer: RequestPacer,
    ) -> Self {
        Self {
            platform,
            ledger,
            pacer,
        }
    }

    /// Despliega un content block. Nunca falla: los errores quedan en un registro
    /// con `status = failed`. Siempre se guarda en el ledger.
    pub async fn deploy(
        &self,
        canvas_id: &str,
        step_id: &str,
        segment: &str,
        text: &str,
        channel: &str,
        field: &str,
    ) -> ContentBlockDeployment {
        let block_name = content_block_name(canvas_id, step_id, channel, field, segment);
        let created_at = Utc::now();

        let content = truncate_content(text);
        if content.len() != text.len() {
            log::warn!(
                "(deploy) Contenido de {} truncado a {} caracteres",
                block_name,
                MAX_CONTENT_CHARS
            );
        }

        let outcome = self
            .platform
            .create_content_block(CreateContentBlockRequest {
                name: block_name.clone(),
                content,
                description: format!(
                    "Auto-generated: Canvas {}, Step {}, Segment: {}",
                    canvas_id, step_id, segment
                ),
                content_type: "html".to_string(),
            })
            .await;

        let deployment = match outcome {
            Ok(resp) => {
                log::info!(
                    "(deploy) Content block '{}' creado con id={}",
                    block_name,
                    resp.content_block_id
                );
                ContentBlockDeployment {
                    content_block_id: resp.content_block_id,
                    liquid_tag: liquid_tag(&block_name),
                    content_block_name: block_name,
                    segment: segment.to_string(),
                    canvas_id: canvas_id.to_string(),
                    step_id: step_id.to_string(),
                    channel: channel.to_string(),
                    field: field.to_string(),
                    status: DeploymentStatus::Success,
                    created_at,
                    error: None,
                }
            }
            Err(e) => {
                log::error!("(deploy) Falló el content block '{}': {:#}", block_name, e);
                ContentBlockDeployment {
                    content_block_id: String::new(),
                    content_block_name: block_name,
                    liquid_tag: String::new(),
                    segment: segment.to_string(),
                    canvas_id: canvas_id.to_string(),
                    step_id: step_id.to_string(),
                    channel: channel.to_string(),
                    field: field.to_string(),
                    status: DeploymentStatus::Failed,
                    created_at,
                    error: Some(crate::error::client_message(&e)),
                }
            }
        };

        self.ledger.upsert_content_block(&deployment);
        deployment
    }

    /// Despliega en secuencia con pausa entre llamadas. Las entradas inválidas
    /// van a `errors` (con su índice) y además como registro fallido.
    pub async fn batch_deploy(
        &self,
        requests: &[PersonalizedMessageDeployment],
    ) -> BatchDeploymentResult {
        let mut deployments = Vec::with_capacity(requests.len());
        let mut errors = Vec::new();

        for (index, req) in requests.iter().enumerate() {
            match validate_request(req) {
                Ok(()) => {
                    let deployment = self
                        .deploy(
                            &req.canvas_id,
                            &req.step_id,
                            &req.segment,
                            &req.personalized_message,
                            &req.channel,
                            &req.field,
                        )
                        .await;
                    deployments.push(deployment);
                    self.pacer.between(index, requests.len()).await;
                }
                Err(message) => {
                    log::warn!("(batch_deploy) Entrada {} rechazada: {}", index, message);
                    deployments.push(ContentBlockDeployment {
                        content_block_id: String::new(),
                        content_block_name: String::new(),
                        liquid_tag: String::new(),
                        segment: req.segment.clone(),
                        canvas_id: req.canvas_id.clone(),
                        step_id: req.step_id.clone(),
                        channel: req.channel.clone(),
                        field: req.field.clone(),
                        status: DeploymentStatus::Failed,
                        created_at: Utc::now(),
                        error: Some(message.clone()),
                    });
                    errors.push(BatchItemError {
                        index,
                        error: message,
                    });
                }
            }
        }

        let successful = deployments.iter().filter(|d| d.is_success()).count();
        BatchDeploymentResult {
            total: requests.len(),
            successful,
            failed: deployments.len() - successful,
            deployments,
            errors,
        }
    }
}

fn validate_request(req: &PersonalizedMessageDeployment) -> Result<(), String> {
    let required = [
        ("canvasId", &req.canvas_id),
        ("stepId", &req.step_id),
        ("segment", &req.segment),
        ("channel", &req.channel),
        ("field", &req.field),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(format!("{} is required", name));
        }
    }
    Ok(())
}
