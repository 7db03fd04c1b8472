use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;

use crate::config::app_config::AppConfig;
use crate::logger::init_logger;
use crate::services::braze_service::{BrazeClient, EngagementPlatform, SandboxPlatform};
use crate::services::content_deployment_service::ContentDeploymentService;
use crate::services::email_template_service::EmailTemplateService;
use crate::services::gemini_service::GeminiClient;
use crate::services::ledger_service::DeploymentLedger;
use crate::services::orchestration_service::OrchestrationService;
use crate::services::pacing::RequestPacer;
use crate::services::personalization_service::PersonalizationService;

mod app;
mod config;
mod error;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

/// Arma el grafo de servicios a partir de la configuración.
fn build_orchestrator(cfg: &AppConfig) -> anyhow::Result<OrchestrationService> {
    let braze: Arc<dyn EngagementPlatform> = Arc::new(BrazeClient::new(
        &cfg.braze_rest_endpoint,
        &cfg.braze_api_key,
        cfg.http_timeout,
    )?);

    let (platform, pacer): (Arc<dyn EngagementPlatform>, RequestPacer) = if cfg.braze_sandbox_writes {
        log::warn!("BRAZE_SANDBOX_WRITES activo: las escrituras a Braze se simulan");
        (Arc::new(SandboxPlatform::new(braze)), RequestPacer::disabled())
    } else {
        (braze, RequestPacer::new(cfg.deploy_min_interval))
    };

    let gemini = Arc::new(GeminiClient::new(
        &cfg.gemini_api_base,
        cfg.gemini_api_key.clone(),
        &cfg.gemini_model,
        cfg.http_timeout,
    )?);

    let ledger = DeploymentLedger::in_memory();
    let personalizer = PersonalizationService::new(gemini);
    let deployer = ContentDeploymentService::new(platform.clone(), ledger.clone(), pacer);
    let templates = EmailTemplateService::new(platform.clone(), pacer);

    Ok(OrchestrationService::new(
        platform,
        personalizer,
        deployer,
        templates,
        ledger,
        cfg.schedule_offset,
    ))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let cfg = AppConfig::from_env().expect("Configuración inválida");
    let orchestrator = build_orchestrator(&cfg).expect("No se pudo inicializar el orquestador");

    log::info!(
        "Braze={} sandbox={} gemini_model={} pausa_lotes={:?}",
        cfg.braze_rest_endpoint,
        cfg.braze_sandbox_writes,
        cfg.gemini_model,
        cfg.deploy_min_interval
    );

    // Levantar servidor
    log::info!("Levantando servidor en {}:{}", cfg.host, cfg.port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(orchestrator.clone()))
            .configure(app::init_app)
    })
    .bind((cfg.host.as_str(), cfg.port))?
    .run()
    .await
}
