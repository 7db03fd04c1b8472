//! handlers/mod.rs
//! Módulo que agrupa los distintos handlers HTTP.

pub mod automation_handler;
