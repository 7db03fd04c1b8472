//! config/app_config.rs
//! Configuración global del servicio, leída de variables de entorno (.env).

use anyhow::{anyhow, Context, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BRAZE_ENDPOINT: &str = "https://rest.fra-01.braze.eu";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
/// 90 días: más allá no tiene sentido programar y chrono desborda mucho antes de u64::MAX.
pub const MAX_SCHEDULE_OFFSET_SECS: u64 = 90 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub braze_api_key: String,
    pub braze_rest_endpoint: String,
    /// Simula escrituras en Braze (content blocks, templates, schedules)
    pub braze_sandbox_writes: bool,
    pub gemini_api_base: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub http_timeout: Duration,
    /// Pausa mínima entre llamadas consecutivas de un lote
    pub deploy_min_interval: Duration,
    /// Offset por defecto para programar envíos ("ahora + offset")
    pub schedule_offset: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la config a partir de cualquier fuente clave -> valor.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let braze_api_key =
            get("BRAZE_API_KEY").ok_or_else(|| anyhow!("No se definió BRAZE_API_KEY"))?;

        let schedule_offset_secs = parse_or(get("SCHEDULE_OFFSET_SECS"), "SCHEDULE_OFFSET_SECS", 300)?;
        if schedule_offset_secs > MAX_SCHEDULE_OFFSET_SECS {
            return Err(anyhow!(
                "SCHEDULE_OFFSET_SECS debe ser <= {} (recibido {})",
                MAX_SCHEDULE_OFFSET_SECS,
                schedule_offset_secs
            ));
        }

        Ok(AppConfig {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("PORT"), "PORT", 3000)?,
            braze_api_key,
            braze_rest_endpoint: get("BRAZE_REST_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_BRAZE_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            braze_sandbox_writes: parse_or(get("BRAZE_SANDBOX_WRITES"), "BRAZE_SANDBOX_WRITES", false)?,
            gemini_api_base: get("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            http_timeout: Duration::from_secs(parse_or(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", 30)?),
            deploy_min_interval: Duration::from_millis(parse_or(
                get("DEPLOY_MIN_INTERVAL_MS"),
                "DEPLOY_MIN_INTERVAL_MS",
                500,
            )?),
            schedule_offset: Duration::from_secs(schedule_offset_secs),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("Valor inválido para {}: {:?}", key, v)),
        None => Ok(default),
    }
}
