//! app.rs
use crate::handlers::automation_handler;
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use serde_json::json;

/// Body JSON mal formado -> 400 `{error}`.
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let message = format!("Invalid JSON body: {}", err);
    actix_web::error::InternalError::from_response(
        err,
        HttpResponse::BadRequest().json(json!({ "error": message })),
    )
    .into()
}

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(2 * 1024 * 1024)
            .error_handler(json_error_handler),
    )
    .service(
        web::scope("/api")
            .route("/health", web::get().to(automation_handler::health_endpoint))
            .service(
                web::scope("/automation")
                    .route("/deploy", web::post().to(automation_handler::deploy_endpoint))
                    .route("/preview", web::post().to(automation_handler::preview_endpoint))
                    .route(
                        "/status/{orchestration_id}",
                        web::get().to(automation_handler::status_endpoint),
                    )
                    .route(
                        "/rollback/{orchestration_id}",
                        web::post().to(automation_handler::rollback_endpoint),
                    )
                    .route(
                        "/deployments",
                        web::get().to(automation_handler::list_deployments_endpoint),
                    )
                    .route(
                        "/content-blocks",
                        web::get().to(automation_handler::list_content_blocks_endpoint),
                    )
                    .route(
                        "/content-blocks/{canvas_id}/{step_id}/{segment}",
                        web::get().to(automation_handler::content_block_endpoint),
                    )
                    .route(
                        "/schedules",
                        web::get().to(automation_handler::list_schedules_endpoint),
                    )
                    .route(
                        "/templates/{orchestration_id}",
                        web::post().to(automation_handler::create_templates_endpoint),
                    ),
            ),
    );
}
