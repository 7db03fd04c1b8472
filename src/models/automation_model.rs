//! models/automation_model.rs
//! Estructuras del flujo personalizar -> desplegar -> programar.
//! Se serializan en camelCase, que es lo que consume el frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Personalización
// ----------------------------------------------------------------------------

/// Entrada del personalizador: un texto y el canal al que pertenece.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToPersonalize {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedMessage {
    pub original_message: String,
    pub personalized_message: String,
    pub channel: String,
    pub field: String,
}

/// Mensaje ya personalizado, listo para subirse como content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedMessageDeployment {
    pub canvas_id: String,
    pub step_id: String,
    pub segment: String,
    pub channel: String,
    pub field: String,
    pub original_message: String,
    pub personalized_message: String,
}

// ----------------------------------------------------------------------------
// Content blocks
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlockDeployment {
    pub content_block_id: String,
    pub content_block_name: String,
    pub liquid_tag: String,
    pub segment: String,
    pub canvas_id: String,
    pub step_id: String,
    pub channel: String,
    pub field: String,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentBlockDeployment {
    pub fn is_success(&self) -> bool {
        self.status == DeploymentStatus::Success
    }

    /// Clave del ledger: una entrada por (canvas, step, segment).
    pub fn ledger_key(&self) -> String {
        content_block_key(&self.canvas_id, &self.step_id, &self.segment)
    }
}

pub fn content_block_key(canvas_id: &str, step_id: &str, segment: &str) -> String {
    format!("{}_{}_{}", canvas_id, step_id, segment)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemError {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDeploymentResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub deployments: Vec<ContentBlockDeployment>,
    pub errors: Vec<BatchItemError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplateRef {
    pub template_id: String,
    pub template_name: String,
    pub segment: String,
}

// ----------------------------------------------------------------------------
// Programación de envíos
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Scheduled,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSchedule {
    pub schedule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_id: Option<String>,
    pub canvas_id: String,
    pub segment: String,
    pub schedule_time: DateTime<Utc>,
    pub status: ScheduleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ----------------------------------------------------------------------------
// Registro de despliegue y resultado
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentRecordStatus {
    InProgress,
    Completed,
    Failed,
    Partial,
    RolledBack,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    pub total_content_blocks: usize,
    pub successful_blocks: usize,
    pub failed_blocks: usize,
    pub total_campaigns: usize,
    pub scheduled_campaigns: usize,
    pub failed_campaigns: usize,
}

impl DeploymentSummary {
    pub fn tally(blocks: &[ContentBlockDeployment], schedules: &[CampaignSchedule]) -> Self {
        let successful_blocks = blocks.iter().filter(|b| b.is_success()).count();
        let scheduled_campaigns = schedules
            .iter()
            .filter(|s| s.status == ScheduleStatus::Scheduled)
            .count();
        let failed_campaigns = schedules
            .iter()
            .filter(|s| s.status == ScheduleStatus::Failed)
            .count();
        DeploymentSummary {
            total_content_blocks: blocks.len(),
            successful_blocks,
            failed_blocks: blocks.len() - successful_blocks,
            total_campaigns: schedules.len(),
            scheduled_campaigns,
            failed_campaigns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: String,
    pub canvas_id: String,
    pub segments: Vec<String>,
    pub content_blocks: Vec<ContentBlockDeployment>,
    pub campaign_schedules: Vec<CampaignSchedule>,
    pub status: DeploymentRecordStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: DeploymentSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationOutcome {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    Personalization,
    Deployment,
    Scheduling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    #[serde(rename = "type")]
    pub kind: StageErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTally {
    pub total_content_blocks: usize,
    pub successful_blocks: usize,
    pub failed_blocks: usize,
    pub content_blocks: Vec<ContentBlockDeployment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignTally {
    pub total_scheduled: usize,
    pub successful: usize,
    pub failed: usize,
    pub schedules: Vec<CampaignSchedule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResult {
    pub orchestration_id: String,
    pub canvas_id: String,
    pub canvas_name: String,
    pub segments: Vec<String>,
    pub status: OrchestrationOutcome,
    pub deployment: DeploymentTally,
    pub campaigns: CampaignTally,
    pub errors: Vec<StageError>,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Milisegundos
    pub duration: i64,
}

// ----------------------------------------------------------------------------
// Estado consultable
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationPhase {
    Pending,
    Personalizing,
    Deploying,
    Scheduling,
    Completed,
    Failed,
}

impl OrchestrationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestrationPhase::Completed | OrchestrationPhase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationProgress {
    pub current_step: String,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub percentage: u8,
}

impl OrchestrationProgress {
    pub fn new(current_step: impl Into<String>, completed_steps: usize, total_steps: usize) -> Self {
        let percentage = if total_steps == 0 {
            100
        } else {
            (completed_steps.min(total_steps) * 100 / total_steps) as u8
        };
        OrchestrationProgress {
            current_step: current_step.into(),
            completed_steps,
            total_steps,
            percentage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationStatus {
    pub id: String,
    pub canvas_id: String,
    pub status: OrchestrationPhase,
    pub progress: OrchestrationProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<OrchestrationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ----------------------------------------------------------------------------
// Preview y rollback
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizationPreview {
    pub canvas_id: String,
    pub canvas_name: String,
    pub segment: String,
    pub steps: Vec<PreviewStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewStep {
    pub step_id: String,
    pub step_name: String,
    pub messages: Vec<PersonalizedMessage>,
    /// true cuando los textos mostrados son los originales (modelo caído o respuesta descartada).
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    RolledBack,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResult {
    pub orchestration_id: String,
    pub cancelled_campaigns: usize,
    pub failed_cancellations: usize,
    pub status: RollbackStatus,
    pub note: String,
}

// ----------------------------------------------------------------------------
// Bodies de las rutas /automation
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    #[serde(default)]
    pub canvas_id: String,
    #[serde(default)]
    pub segments: Vec<String>,
    pub schedule_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(default)]
    pub canvas_id: String,
    #[serde(default)]
    pub segment: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentsQuery {
    pub canvas_id: Option<String>,
    /// Se ignora si no es un entero válido
    pub limit: Option<String>,
}

impl DeploymentsQuery {
    pub fn limit(&self) -> Option<usize> {
        self.limit.as_deref().and_then(|l| l.trim().parse().ok())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatesRequest {
    pub subject: Option<String>,
}
