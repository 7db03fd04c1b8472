//! handlers/automation_handler.rs
//! Endpoints de /api/automation. Todas las respuestas son `{data}` o `{error}`.

use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;

use crate::{
    error::{client_message, status_for},
    models::automation_model::{DeployRequest, DeploymentsQuery, PreviewRequest, TemplatesRequest},
    services::orchestration_service::OrchestrationService,
};

fn data<T: Serialize>(payload: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "data": payload }))
}

fn error_response(context: &str, e: &anyhow::Error) -> HttpResponse {
    let status = status_for(e);
    if status.is_server_error() {
        log::error!("({}) {:#}", context, e);
    } else {
        log::warn!("({}) {:#}", context, e);
    }
    HttpResponse::build(status).json(json!({ "error": client_message(e) }))
}

/// POST /api/automation/deploy
pub async fn deploy_endpoint(
    orchestrator: web::Data<OrchestrationService>,
    body: web::Json<DeployRequest>,
) -> HttpResponse {
    let req = body.into_inner();
    match orchestrator
        .run_detached(req.canvas_id, req.segments, req.schedule_time)
        .await
    {
        Ok(result) => data(result),
        Err(e) => error_response("deploy_endpoint", &e),
    }
}

/// POST /api/automation/preview
pub async fn preview_endpoint(
    orchestrator: web::Data<OrchestrationService>,
    body: web::Json<PreviewRequest>,
) -> HttpResponse {
    match orchestrator
        .preview_personalization(&body.canvas_id, &body.segment)
        .await
    {
        Ok(preview) => data(preview),
        Err(e) => error_response("preview_endpoint", &e),
    }
}

/// GET /api/automation/status/{orchestration_id}
pub async fn status_endpoint(
    orchestrator: web::Data<OrchestrationService>,
    path: web::Path<String>,
) -> HttpResponse {
    match orchestrator.get_orchestration_status(&path.into_inner()) {
        Ok(status) => data(status),
        Err(e) => error_response("status_endpoint", &e),
    }
}

/// POST /api/automation/rollback/{orchestration_id}
pub async fn rollback_endpoint(
    orchestrator: web::Data<OrchestrationService>,
    path: web::Path<String>,
) -> HttpResponse {
    match orchestrator.rollback_deployment(&path.into_inner()).await {
        Ok(result) => data(result),
        Err(e) => error_response("rollback_endpoint", &e),
    }
}

/// GET /api/automation/deployments?canvasId=&limit=
pub async fn list_deployments_endpoint(
    orchestrator: web::Data<OrchestrationService>,
    query: web::Query<DeploymentsQuery>,
) -> HttpResponse {
    let mut deployments = match query.canvas_id.as_deref() {
        Some(canvas_id) => orchestrator.get_orchestrations_by_canvas_id(canvas_id),
        None => orchestrator.get_all_orchestrations(),
    };
    if let Some(limit) = query.limit() {
        deployments.truncate(limit);
    }
    data(deployments)
}

/// GET /api/automation/content-blocks?canvasId=&limit=
pub async fn list_content_blocks_endpoint(
    orchestrator: web::Data<OrchestrationService>,
    query: web::Query<DeploymentsQuery>,
) -> HttpResponse {
    let mut blocks = orchestrator.get_content_blocks(query.canvas_id.as_deref());
    if let Some(limit) = query.limit() {
        blocks.truncate(limit);
    }
    data(blocks)
}

/// GET /api/automation/content-blocks/{canvas_id}/{step_id}/{segment}
pub async fn content_block_endpoint(
    orchestrator: web::Data<OrchestrationService>,
    path: web::Path<(String, String, String)>,
) -> HttpResponse {
    let (canvas_id, step_id, segment) = path.into_inner();
    match orchestrator.get_content_block(&canvas_id, &step_id, &segment) {
        Ok(block) => data(block),
        Err(e) => error_response("content_block_endpoint", &e),
    }
}

/// GET /api/automation/schedules
pub async fn list_schedules_endpoint(orchestrator: web::Data<OrchestrationService>) -> HttpResponse {
    data(orchestrator.get_schedules())
}

/// POST /api/automation/templates/{orchestration_id}
pub async fn create_templates_endpoint(
    orchestrator: web::Data<OrchestrationService>,
    path: web::Path<String>,
    body: Option<web::Json<TemplatesRequest>>,
) -> HttpResponse {
    let subject = body.and_then(|b| b.into_inner().subject);
    match orchestrator
        .create_email_templates(&path.into_inner(), subject.as_deref())
        .await
    {
        Ok(templates) => data(templates),
        Err(e) => error_response("create_templates_endpoint", &e),
    }
}

/// GET /api/health
pub async fn health_endpoint() -> HttpResponse {
    data(json!({ "status": "ok" }))
}
