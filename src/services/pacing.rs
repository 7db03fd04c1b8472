//! services/pacing.rs
//! Pausa fija entre llamadas consecutivas de un lote, para respetar los
//! rate limits de Braze.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPacer {
    min_interval: Duration,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        RequestPacer { min_interval }
    }

    /// Sin pausas (tests, modo sandbox).
    pub fn disabled() -> Self {
        RequestPacer {
            min_interval: Duration::ZERO,
        }
    }

    /// Duerme entre el elemento `index` y el siguiente; nunca después del último.
    pub async fn between(&self, index: usize, total: usize) {
        if index + 1 < total && !self.min_interval.is_zero() {
            tokio::time::sleep(self.min_interval).await;
        }
    }
}
