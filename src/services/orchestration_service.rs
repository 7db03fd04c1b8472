//! services/orchestration_service.rs
//! Flujo completo de un canvas: personalizar por segmento -> desplegar content
//! blocks -> programar el envío. Los fallos de cada etapa se registran y el
//! flujo sigue; sólo la lectura del canvas (o una validación) corta la corrida.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    config::app_config::MAX_SCHEDULE_OFFSET_SECS,
    error::{client_message, ServiceError},
    models::{
        automation_model::{
            CampaignSchedule, CampaignTally, ContentBlockDeployment, DeploymentRecord,
            DeploymentRecordStatus, DeploymentSummary, DeploymentTally, EmailTemplateRef,
            MessageToPersonalize, OrchestrationOutcome, OrchestrationPhase, OrchestrationProgress,
            OrchestrationResult, OrchestrationStatus, PersonalizationPreview, PersonalizedMessage,
            PersonalizedMessageDeployment, PreviewStep, RollbackResult, RollbackStatus,
            ScheduleStatus, StageError, StageErrorKind,
        },
        braze_model::{CanvasScheduleTime, DeleteCanvasScheduleRequest, ScheduleCanvasRequest},
        canvas_model::{CanvasDetails, CanvasStep, StepMessage},
    },
    services::{
        braze_service::EngagementPlatform, content_deployment_service::ContentDeploymentService,
        email_template_service::EmailTemplateService, ledger_service::DeploymentLedger,
        personalization_service::PersonalizationService,
    },
};

/// Pasos fijos además de los 3 por segmento: leer canvas y cerrar.
const FIXED_STEPS: usize = 2;
const STEPS_PER_SEGMENT: usize = 3;

#[derive(Clone)]
pub struct OrchestrationService {
    platform: Arc<dyn EngagementPlatform>,
    personalizer: PersonalizationService,
    deployer: ContentDeploymentService,
    templates: EmailTemplateService,
    ledger: DeploymentLedger,
    schedule_offset: chrono::Duration,
}

/// Lo acumulado durante una corrida.
#[derive(Default)]
struct RunState {
    content_blocks: Vec<ContentBlockDeployment>,
    schedules: Vec<CampaignSchedule>,
    errors: Vec<StageError>,
}

impl RunState {
    fn push_error(&mut self, kind: StageErrorKind, message: String, segment: &str) {
        self.errors.push(StageError {
            kind,
            message,
            segment: Some(segment.to_string()),
        });
    }

    fn outcome(&self) -> OrchestrationOutcome {
        let any_block = self.content_blocks.iter().any(|b| b.is_success());
        let any_schedule = self
            .schedules
            .iter()
            .any(|s| s.status == ScheduleStatus::Scheduled);

        if self.errors.is_empty() {
            OrchestrationOutcome::Success
        } else if !any_block && !any_schedule {
            OrchestrationOutcome::Failed
        } else {
            OrchestrationOutcome::Partial
        }
    }
}

/// Publica en el ledger el avance de una corrida.
struct ProgressTracker<'a> {
    ledger: &'a DeploymentLedger,
    id: String,
    canvas_id: String,
    completed: usize,
    total: usize,
}

impl<'a> ProgressTracker<'a> {
    fn new(ledger: &'a DeploymentLedger, id: &str, canvas_id: &str, segments: usize) -> Self {
        Self {
            ledger,
            id: id.to_string(),
            canvas_id: canvas_id.to_string(),
            completed: 0,
            total: FIXED_STEPS + STEPS_PER_SEGMENT * segments,
        }
    }

    fn publish(
        &self,
        phase: OrchestrationPhase,
        step: impl Into<String>,
        results: Option<OrchestrationResult>,
        error: Option<String>,
    ) {
        if phase.is_terminal() {
            log::debug!(
                "(progress) {} cerrada como {:?} ({}/{} pasos)",
                self.id,
                phase,
                self.completed,
                self.total
            );
        }
        self.ledger.save_status(OrchestrationStatus {
            id: self.id.clone(),
            canvas_id: self.canvas_id.clone(),
            status: phase,
            progress: OrchestrationProgress::new(step, self.completed, self.total),
            results,
            error,
        });
    }

    fn enter(&self, phase: OrchestrationPhase, step: impl Into<String>) {
        self.publish(phase, step, None, None);
    }

    fn advance(&mut self) {
        self.completed += 1;
    }
}

impl OrchestrationService {
    pub fn new(
        platform: Arc<dyn EngagementPlatform>,
        personalizer: PersonalizationService,
        deployer: ContentDeploymentService,
        templates: EmailTemplateService,
        ledger: DeploymentLedger,
        schedule_offset: Duration,
    ) -> Self {
        Self {
            platform,
            personalizer,
            deployer,
            templates,
            ledger,
            schedule_offset: bounded_offset(schedule_offset),
        }
    }

    // ========================================================================
    // Flujo principal
    // ========================================================================

    pub async fn personalize_and_deploy_canvas(
        &self,
        canvas_id: &str,
        segments: &[String],
        schedule_time: Option<DateTime<Utc>>,
    ) -> Result<OrchestrationResult> {
        validate_deploy_input(canvas_id, segments)?;

        let orchestration_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let mut tracker =
            ProgressTracker::new(&self.ledger, &orchestration_id, canvas_id, segments.len());
        let mut record = DeploymentRecord {
            id: orchestration_id.clone(),
            canvas_id: canvas_id.to_string(),
            segments: segments.to_vec(),
            content_blocks: Vec::new(),
            campaign_schedules: Vec::new(),
            status: DeploymentRecordStatus::InProgress,
            created_at,
            completed_at: None,
            summary: DeploymentSummary::default(),
        };

        log::info!(
            "(personalize_and_deploy_canvas) Iniciando orquestación {} canvas={} segmentos={:?}",
            orchestration_id,
            canvas_id,
            segments
        );
        self.ledger.save_record(record.clone());
        tracker.enter(OrchestrationPhase::Pending, "Fetching canvas details");

        // 1) Canvas: si falla, la corrida entera falla
        let canvas = match self.platform.get_canvas_details(canvas_id).await {
            Ok(canvas) => canvas,
            Err(e) => {
                let message = client_message(&e);
                log::error!(
                    "(personalize_and_deploy_canvas) No se pudo leer el canvas {}: {:#}",
                    canvas_id,
                    e
                );
                record.status = DeploymentRecordStatus::Failed;
                record.completed_at = Some(Utc::now());
                self.ledger.save_record(record);
                tracker.publish(
                    OrchestrationPhase::Failed,
                    "Fetching canvas details",
                    None,
                    Some(message),
                );
                return Err(e.context(format!("No se pudo obtener el canvas {}", canvas_id)));
            }
        };
        tracker.advance();

        // 2) Cada segmento, en orden y por separado
        let schedule_time = schedule_time.unwrap_or_else(|| {
            let now = Utc::now();
            now.checked_add_signed(self.schedule_offset).unwrap_or(now)
        });
        let mut run = RunState::default();
        for segment in segments {
            self.process_segment(
                &orchestration_id,
                canvas_id,
                &canvas,
                segment,
                schedule_time,
                &mut tracker,
                &mut run,
            )
            .await;

            record.content_blocks = run.content_blocks.clone();
            record.campaign_schedules = run.schedules.clone();
            record.summary = DeploymentSummary::tally(&run.content_blocks, &run.schedules);
            self.ledger.save_record(record.clone());
        }

        // 3) Cierre
        let completed_at = Utc::now();
        let outcome = run.outcome();
        let result = build_result(
            &orchestration_id,
            canvas_id,
            &canvas.name,
            segments,
            outcome,
            run,
            created_at,
            completed_at,
        );

        record.status = match outcome {
            OrchestrationOutcome::Success => DeploymentRecordStatus::Completed,
            OrchestrationOutcome::Partial => DeploymentRecordStatus::Partial,
            OrchestrationOutcome::Failed => DeploymentRecordStatus::Failed,
        };
        record.completed_at = Some(completed_at);
        self.ledger.save_record(record);

        tracker.advance();
        let phase = match outcome {
            OrchestrationOutcome::Failed => OrchestrationPhase::Failed,
            _ => OrchestrationPhase::Completed,
        };
        tracker.publish(phase, "Done", Some(result.clone()), None);

        log::info!(
            "(personalize_and_deploy_canvas) Orquestación {} terminó {:?} en {}ms: bloques {}/{}, campañas {}/{}, errores {}",
            orchestration_id,
            result.status,
            result.duration,
            result.deployment.successful_blocks,
            result.deployment.total_content_blocks,
            result.campaigns.successful,
            result.campaigns.total_scheduled,
            result.errors.len()
        );

        Ok(result)
    }

    /// Igual que `personalize_and_deploy_canvas`, pero en una tarea propia: si el
    /// llamador se cae (cliente o proxy cortan la conexión) la corrida sigue hasta
    /// un estado final y queda disponible para status y rollback.
    pub async fn run_detached(
        &self,
        canvas_id: String,
        segments: Vec<String>,
        schedule_time: Option<DateTime<Utc>>,
    ) -> Result<OrchestrationResult> {
        let service = self.clone();
        let run = actix_web::rt::spawn(async move {
            service
                .personalize_and_deploy_canvas(&canvas_id, &segments, schedule_time)
                .await
        });

        run.await
            .context("La tarea de orquestación terminó de forma inesperada")?
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_segment(
        &self,
        orchestration_id: &str,
        canvas_id: &str,
        canvas: &CanvasDetails,
        segment: &str,
        schedule_time: DateTime<Utc>,
        tracker: &mut ProgressTracker<'_>,
        run: &mut RunState,
    ) {
        // a/b) Personalizar paso a paso
        tracker.enter(
            OrchestrationPhase::Personalizing,
            format!("Personalizing messages for segment {}", segment),
        );
        let mut to_deploy = Vec::new();
        for step in &canvas.steps {
            let messages = step.extract_messages();
            if messages.is_empty() {
                continue;
            }

            let texts = match self.personalize_step(step, &messages, segment).await {
                Ok(texts) => texts,
                Err(e) => {
                    log::warn!(
                        "(process_segment) Personalización falló en step {} segmento '{}', se usan originales: {:#}",
                        step.id,
                        segment,
                        e
                    );
                    run.push_error(
                        StageErrorKind::Personalization,
                        format!("Step {}: {}", step.id, client_message(&e)),
                        segment,
                    );
                    messages.iter().map(|m| m.content.clone()).collect()
                }
            };

            to_deploy.extend(messages.iter().zip(texts).map(|(msg, text)| {
                PersonalizedMessageDeployment {
                    canvas_id: canvas_id.to_string(),
                    step_id: step.id.clone(),
                    segment: segment.to_string(),
                    channel: msg.channel.clone(),
                    field: msg.field.to_string(),
                    original_message: msg.content.clone(),
                    personalized_message: text,
                }
            }));
        }
        tracker.advance();

        // c) Desplegar content blocks
        tracker.enter(
            OrchestrationPhase::Deploying,
            format!("Deploying {} content blocks for segment {}", to_deploy.len(), segment),
        );
        let batch = self.deployer.batch_deploy(&to_deploy).await;
        for failed in batch.deployments.iter().filter(|d| !d.is_success()) {
            run.push_error(
                StageErrorKind::Deployment,
                format!(
                    "Content block {} (step {}, {} {}) failed: {}",
                    failed.content_block_name,
                    failed.step_id,
                    failed.channel,
                    failed.field,
                    failed.error.as_deref().unwrap_or("unknown error")
                ),
                segment,
            );
        }
        let segment_blocks = batch.deployments;
        tracker.advance();

        // d) Programar envío
        tracker.enter(
            OrchestrationPhase::Scheduling,
            format!("Scheduling canvas for segment {}", segment),
        );
        let schedule = if batch.failed > 0 {
            log::warn!(
                "(process_segment) Segmento '{}' con {} content blocks fallidos; no se programa",
                segment,
                batch.failed
            );
            failed_schedule(
                canvas_id,
                segment,
                schedule_time,
                format!(
                    "Skipped: {} content block(s) failed to deploy for this segment",
                    batch.failed
                ),
            )
        } else {
            match self
                .schedule_segment(orchestration_id, canvas_id, segment, schedule_time, &segment_blocks)
                .await
            {
                Ok(schedule) => schedule,
                Err(e) => {
                    let message = client_message(&e);
                    log::error!(
                        "(process_segment) No se pudo programar segmento '{}': {:#}",
                        segment,
                        e
                    );
                    run.push_error(StageErrorKind::Scheduling, message.clone(), segment);
                    failed_schedule(canvas_id, segment, schedule_time, message)
                }
            }
        };
        self.ledger.upsert_schedule(orchestration_id, &schedule);
        run.schedules.push(schedule);
        run.content_blocks.extend(segment_blocks);
        tracker.advance();
    }

    async fn personalize_step(
        &self,
        step: &CanvasStep,
        messages: &[StepMessage],
        segment: &str,
    ) -> Result<Vec<String>> {
        let inputs: Vec<MessageToPersonalize> = messages
            .iter()
            .map(|m| MessageToPersonalize {
                message: m.content.clone(),
                kind: m.channel.clone(),
                subject: m.subject.clone(),
            })
            .collect();

        self.personalizer
            .personalize(&inputs, segment)
            .await
            .with_context(|| format!("Step {} ({})", step.id, step.name))
    }

    async fn schedule_segment(
        &self,
        orchestration_id: &str,
        canvas_id: &str,
        segment: &str,
        schedule_time: DateTime<Utc>,
        blocks: &[ContentBlockDeployment],
    ) -> Result<CampaignSchedule> {
        let block_map: Map<String, Value> = blocks
            .iter()
            .map(|b| {
                (
                    format!("{}_{}_{}", b.step_id, b.channel, b.field),
                    Value::String(b.content_block_name.clone()),
                )
            })
            .collect();

        let mut entry_properties = Map::new();
        entry_properties.insert("segment".to_string(), json!(segment));
        entry_properties.insert("orchestration_id".to_string(), json!(orchestration_id));
        entry_properties.insert("content_blocks".to_string(), Value::Object(block_map));

        let resp = self
            .platform
            .schedule_triggered_canvas(ScheduleCanvasRequest {
                canvas_id: canvas_id.to_string(),
                schedule: CanvasScheduleTime {
                    time: schedule_time.to_rfc3339(),
                },
                canvas_entry_properties: entry_properties,
            })
            .await?;

        log::info!(
            "(schedule_segment) Segmento '{}' programado schedule_id={} para {}",
            segment,
            resp.schedule_id,
            schedule_time
        );

        Ok(CampaignSchedule {
            schedule_id: resp.schedule_id,
            dispatch_id: resp.dispatch_id,
            canvas_id: canvas_id.to_string(),
            segment: segment.to_string(),
            schedule_time,
            status: ScheduleStatus::Scheduled,
            error: None,
            created_at: Utc::now(),
        })
    }

    // ========================================================================
    // Preview (sin efectos: no despliega ni programa)
    // ========================================================================

    pub async fn preview_personalization(
        &self,
        canvas_id: &str,
        segment: &str,
    ) -> Result<PersonalizationPreview> {
        if canvas_id.trim().is_empty() {
            return Err(ServiceError::Validation("canvasId is required".to_string()).into());
        }
        if segment.trim().is_empty() {
            return Err(ServiceError::Validation("segment is required".to_string()).into());
        }

        let canvas = self
            .platform
            .get_canvas_details(canvas_id)
            .await
            .with_context(|| format!("No se pudo obtener el canvas {}", canvas_id))?;

        let mut steps = Vec::new();
        for step in &canvas.steps {
            let messages = step.extract_messages();
            if messages.is_empty() {
                continue;
            }

            let (texts, error) = match self.personalize_step(step, &messages, segment).await {
                Ok(texts) => (texts, None),
                Err(e) => {
                    log::warn!(
                        "(preview_personalization) Step {} sin personalizar: {:#}",
                        step.id,
                        e
                    );
                    let originals = messages.iter().map(|m| m.content.clone()).collect();
                    (originals, Some(client_message(&e)))
                }
            };
            let fallback = error.is_some()
                || texts.iter().zip(&messages).all(|(t, m)| *t == m.content);

            steps.push(PreviewStep {
                step_id: step.id.clone(),
                step_name: step.name.clone(),
                messages: messages
                    .iter()
                    .zip(texts)
                    .map(|(msg, text)| PersonalizedMessage {
                        original_message: msg.content.clone(),
                        personalized_message: text,
                        channel: msg.channel.clone(),
                        field: msg.field.to_string(),
                    })
                    .collect(),
                fallback,
                error,
            });
        }

        Ok(PersonalizationPreview {
            canvas_id: canvas_id.to_string(),
            canvas_name: canvas.name,
            segment: segment.to_string(),
            steps,
        })
    }

    // ========================================================================
    // Consultas
    // ========================================================================

    pub fn get_orchestration_status(&self, id: &str) -> Result<OrchestrationStatus> {
        self.ledger
            .status(id)
            .ok_or_else(|| ServiceError::NotFound(format!("Orchestration {} not found", id)).into())
    }

    pub fn get_orchestrations_by_canvas_id(&self, canvas_id: &str) -> Vec<DeploymentRecord> {
        self.ledger.records_by_canvas(canvas_id)
    }

    pub fn get_all_orchestrations(&self) -> Vec<DeploymentRecord> {
        self.ledger.records()
    }

    /// Último despliegue para (canvas, step, segment).
    pub fn get_content_block(
        &self,
        canvas_id: &str,
        step_id: &str,
        segment: &str,
    ) -> Result<ContentBlockDeployment> {
        self.ledger
            .content_block(canvas_id, step_id, segment)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No content block for canvas {}, step {}, segment {}",
                    canvas_id, step_id, segment
                ))
                .into()
            })
    }

    pub fn get_content_blocks(&self, canvas_id: Option<&str>) -> Vec<ContentBlockDeployment> {
        let mut blocks: Vec<ContentBlockDeployment> = self
            .ledger
            .content_blocks()
            .into_iter()
            .filter(|b| canvas_id.map_or(true, |c| b.canvas_id == c))
            .collect();
        blocks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        blocks
    }

    /// Envíos programados o fallidos que siguen en el índice (los cancelados salen).
    pub fn get_schedules(&self) -> Vec<CampaignSchedule> {
        self.ledger.schedules()
    }

    // ========================================================================
    // Rollback: cancela en Braze cada envío programado
    // ========================================================================

    pub async fn rollback_deployment(&self, id: &str) -> Result<RollbackResult> {
        let mut record = self
            .ledger
            .record(id)
            .ok_or_else(|| ServiceError::NotFound(format!("Orchestration {} not found", id)))?;

        if record.status == DeploymentRecordStatus::InProgress {
            return Err(ServiceError::Validation(format!(
                "Orchestration {} is still in progress",
                id
            ))
            .into());
        }

        let mut cancelled = 0;
        let mut failed = 0;
        for schedule in record
            .campaign_schedules
            .iter_mut()
            .filter(|s| s.status == ScheduleStatus::Scheduled && !s.schedule_id.is_empty())
        {
            let req = DeleteCanvasScheduleRequest {
                canvas_id: schedule.canvas_id.clone(),
                schedule_id: schedule.schedule_id.clone(),
            };
            match self.platform.delete_scheduled_canvas(req).await {
                Ok(()) => {
                    schedule.status = ScheduleStatus::Cancelled;
                    self.ledger.remove_schedule(id, &schedule.segment);
                    cancelled += 1;
                }
                Err(e) => {
                    log::error!(
                        "(rollback_deployment) No se pudo cancelar schedule {} (segmento '{}'): {:#}",
                        schedule.schedule_id,
                        schedule.segment,
                        e
                    );
                    failed += 1;
                }
            }
        }

        record.summary = DeploymentSummary::tally(&record.content_blocks, &record.campaign_schedules);
        let status = if failed == 0 {
            record.status = DeploymentRecordStatus::RolledBack;
            RollbackStatus::RolledBack
        } else {
            RollbackStatus::Partial
        };
        self.ledger.save_record(record);

        log::info!(
            "(rollback_deployment) Orquestación {}: {} cancelados, {} fallidos",
            id,
            cancelled,
            failed
        );

        Ok(RollbackResult {
            orchestration_id: id.to_string(),
            cancelled_campaigns: cancelled,
            failed_cancellations: failed,
            status,
            note: format!(
                "Cancelled {} scheduled canvas send(s); {} cancellation(s) failed. Content blocks remain in Braze.",
                cancelled, failed
            ),
        })
    }

    // ========================================================================
    // Email templates a partir de una orquestación
    // ========================================================================

    pub async fn create_email_templates(
        &self,
        id: &str,
        subject: Option<&str>,
    ) -> Result<Vec<EmailTemplateRef>> {
        let record = self
            .ledger
            .record(id)
            .ok_or_else(|| ServiceError::NotFound(format!("Orchestration {} not found", id)))?;

        let email_blocks: Vec<ContentBlockDeployment> = record
            .content_blocks
            .into_iter()
            .filter(|b| b.is_success() && b.channel == "email")
            .collect();

        log::info!(
            "(create_email_templates) Orquestación {}: {} content blocks de email",
            id,
            email_blocks.len()
        );

        Ok(self.templates.create_batch(&email_blocks, subject).await)
    }
}

/// Offset acotado a `MAX_SCHEDULE_OFFSET_SECS` para que sumarlo a "ahora" no desborde.
fn bounded_offset(offset: Duration) -> chrono::Duration {
    let secs = offset.as_secs();
    if secs > MAX_SCHEDULE_OFFSET_SECS {
        log::warn!(
            "(bounded_offset) Offset de {}s fuera de rango; se usa {}s",
            secs,
            MAX_SCHEDULE_OFFSET_SECS
        );
    }
    chrono::Duration::try_seconds(secs.min(MAX_SCHEDULE_OFFSET_SECS) as i64)
        .unwrap_or_else(chrono::Duration::zero)
}

fn validate_deploy_input(canvas_id: &str, segments: &[String]) -> Result<()> {
    if canvas_id.trim().is_empty() {
        return Err(ServiceError::Validation("canvasId is required".to_string()).into());
    }
    if segments.is_empty() {
        return Err(ServiceError::Validation(
            "segments array is required and must not be empty".to_string(),
        )
        .into());
    }
    if segments.iter().any(|s| s.trim().is_empty()) {
        return Err(ServiceError::Validation("segments must not contain empty names".to_string()).into());
    }
    Ok(())
}

fn failed_schedule(
    canvas_id: &str,
    segment: &str,
    schedule_time: DateTime<Utc>,
    error: String,
) -> CampaignSchedule {
    CampaignSchedule {
        schedule_id: String::new(),
        dispatch_id: None,
        canvas_id: canvas_id.to_string(),
        segment: segment.to_string(),
        schedule_time,
        status: ScheduleStatus::Failed,
        error: Some(error),
        created_at: Utc::now(),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_result(
    orchestration_id: &str,
    canvas_id: &str,
    canvas_name: &str,
    segments: &[String],
    status: OrchestrationOutcome,
    run: RunState,
    created_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
) -> OrchestrationResult {
    let summary = DeploymentSummary::tally(&run.content_blocks, &run.schedules);

    OrchestrationResult {
        orchestration_id: orchestration_id.to_string(),
        canvas_id: canvas_id.to_string(),
        canvas_name: canvas_name.to_string(),
        segments: segments.to_vec(),
        status,
        deployment: DeploymentTally {
            total_content_blocks: summary.total_content_blocks,
            successful_blocks: summary.successful_blocks,
            failed_blocks: summary.failed_blocks,
            content_blocks: run.content_blocks,
        },
        campaigns: CampaignTally {
            total_scheduled: summary.total_campaigns,
            successful: summary.scheduled_campaigns,
            failed: summary.failed_campaigns,
            schedules: run.schedules,
        },
        errors: run.errors,
        created_at,
        completed_at,
        duration: (completed_at - created_at).num_milliseconds(),
    }
}
