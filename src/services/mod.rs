//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod braze_service;
pub mod content_deployment_service;
pub mod email_template_service;
pub mod gemini_service;
pub mod ledger_service;
pub mod orchestration_service;
pub mod pacing;
pub mod personalization_service;
