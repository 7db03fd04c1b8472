//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod automation_model;
pub mod braze_model;
pub mod canvas_model;
