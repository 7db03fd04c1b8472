//! services/email_template_service.rs
//! Crea email templates en Braze que referencian un content block ya desplegado.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{
    models::{
        automation_model::{ContentBlockDeployment, EmailTemplateRef},
        braze_model::CreateEmailTemplateRequest,
    },
    services::{braze_service::EngagementPlatform, pacing::RequestPacer},
};

pub fn template_name(block: &ContentBlockDeployment) -> String {
    format!("template_{}", block.content_block_name)
}

/// Cuerpo del template: sólo la referencia al content block.
pub fn template_body(block: &ContentBlockDeployment) -> String {
    format!("{{{{content_blocks.${{{}}}}}}}", block.content_block_name)
}

#[derive(Clone)]
pub struct EmailTemplateService {
    platform: Arc<dyn EngagementPlatform>,
    pacer: RequestPacer,
}

impl EmailTemplateService {
    pub fn new(platform: Arc<dyn EngagementPlatform>, pacer: RequestPacer) -> Self {
        Self { platform, pacer }
    }

    pub async fn create_from_content_block(
        &self,
        block: &ContentBlockDeployment,
        subject: Option<&str>,
    ) -> Result<EmailTemplateRef> {
        let name = template_name(block);
        let subject = subject
            .map(str::to_string)
            .unwrap_or_else(|| format!("Personalized Message for {}", block.segment));

        let resp = self
            .platform
            .create_email_template(CreateEmailTemplateRequest {
                template_name: name.clone(),
                subject,
                body: template_body(block),
                description: format!("Auto-generated template for {}", block.segment),
            })
            .await
            .with_context(|| format!("No se pudo crear el template {}", name))?;

        log::info!(
            "(create_from_content_block) Template '{}' creado con id={}",
            name,
            resp.email_template_id
        );

        Ok(EmailTemplateRef {
            template_id: resp.email_template_id,
            template_name: resp.template_name.unwrap_or(name),
            segment: block.segment.clone(),
        })
    }

    /// Crea un template por bloque, en secuencia. Los que fallan sólo se loguean.
    pub async fn create_batch(
        &self,
        blocks: &[ContentBlockDeployment],
        subject: Option<&str>,
    ) -> Vec<EmailTemplateRef> {
        let mut templates = Vec::with_capacity(blocks.len());

        for (index, block) in blocks.iter().enumerate() {
            match self.create_from_content_block(block, subject).await {
                Ok(template) => templates.push(template),
                Err(e) => log::error!(
                    "(create_batch) Falló el template para segmento '{}': {:#}",
                    block.segment,
                    e
                ),
            }
            self.pacer.between(index, blocks.len()).await;
        }

        templates
    }
}
