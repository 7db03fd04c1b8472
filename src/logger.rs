//! logger.rs
//! Logger global con env_logger.

use std::io::Write;

/// Filtro por defecto: info para el servicio, sólo warnings de las librerías HTTP.
const DEFAULT_FILTER: &str = "info,actix_server=warn,hyper=warn,hyper_util=warn,reqwest=warn";

pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
