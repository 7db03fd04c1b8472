//! tests/mod.rs
//! Pruebas del servicio. No tocan la red: Braze y Gemini se reemplazan por fakes.


mod orchestration_tests;
mod personalization_tests;
