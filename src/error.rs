//! error.rs
//! Errores tipados del servicio. Viajan dentro de `anyhow::Error` y los
//! handlers los recuperan con `downcast_ref` para decidir el código HTTP.

use actix_web::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Falla de Braze, Gemini u otro servicio remoto.
    #[error("{service}: {message}")]
    ExternalService {
        service: &'static str,
        status: u16,
        message: String,
    },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
}

impl ServiceError {
    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        ServiceError::ExternalService {
            service,
            status: 500,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::ExternalService { status, .. } => {
                // Sólo respetamos pistas 4xx/5xx del upstream
                StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// Código HTTP para cualquier error de servicio; 500 si no es un `ServiceError`.
pub fn status_for(err: &anyhow::Error) -> StatusCode {
    err.downcast_ref::<ServiceError>()
        .map(ServiceError::status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Mensaje para el cliente: el del `ServiceError` si existe, si no la cadena completa.
pub fn client_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ServiceError>() {
        Some(e) => e.to_string(),
        None => format!("{:#}", err),
    }
}
