//! services/ledger_service.rs
//! Ledger en memoria de orquestaciones, content blocks y schedules.
//! Vive lo que vive el proceso: al reiniciar se pierde todo.

use dashmap::DashMap;
use std::sync::Arc;

use crate::models::automation_model::{
    content_block_key, CampaignSchedule, ContentBlockDeployment, DeploymentRecord,
    OrchestrationStatus,
};

/// Almacén clave -> valor. Los valores se guardan y se devuelven por copia.
pub trait KeyValueStore<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    fn set(&self, key: String, value: V);
    fn delete(&self, key: &str) -> Option<V>;
    fn list(&self) -> Vec<V>;
}

pub struct InMemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        InMemoryStore {
            entries: DashMap::new(),
        }
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyValueStore<V> for InMemoryStore<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn set(&self, key: String, value: V) {
        self.entries.insert(key, value);
    }

    fn delete(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    fn list(&self) -> Vec<V> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }
}

fn memory_store<V: Clone + Send + Sync + 'static>() -> Arc<dyn KeyValueStore<V>> {
    Arc::new(InMemoryStore::<V>::new())
}

fn schedule_key(orchestration_id: &str, segment: &str) -> String {
    format!("{}_{}", orchestration_id, segment)
}

#[derive(Clone)]
pub struct DeploymentLedger {
    records: Arc<dyn KeyValueStore<DeploymentRecord>>,
    statuses: Arc<dyn KeyValueStore<OrchestrationStatus>>,
    content_blocks: Arc<dyn KeyValueStore<ContentBlockDeployment>>,
    schedules: Arc<dyn KeyValueStore<CampaignSchedule>>,
}

impl DeploymentLedger {
    pub fn in_memory() -> Self {
        DeploymentLedger {
            records: memory_store(),
            statuses: memory_store(),
            content_blocks: memory_store(),
            schedules: memory_store(),
        }
    }

    // --- content blocks -----------------------------------------------------

    /// Reemplaza cualquier despliegue previo con la misma (canvas, step, segment).
    pub fn upsert_content_block(&self, deployment: &ContentBlockDeployment) {
        self.content_blocks
            .set(deployment.ledger_key(), deployment.clone());
    }

    pub fn content_block(
        &self,
        canvas_id: &str,
        step_id: &str,
        segment: &str,
    ) -> Option<ContentBlockDeployment> {
        self.content_blocks
            .get(&content_block_key(canvas_id, step_id, segment))
    }

    pub fn content_blocks(&self) -> Vec<ContentBlockDeployment> {
        self.content_blocks.list()
    }

    // --- schedules ----------------------------------------------------------

    pub fn upsert_schedule(&self, orchestration_id: &str, schedule: &CampaignSchedule) {
        self.schedules
            .set(schedule_key(orchestration_id, &schedule.segment), schedule.clone());
    }

    /// Quita un envío del índice (p. ej. tras cancelarlo en Braze).
    pub fn remove_schedule(&self, orchestration_id: &str, segment: &str) -> Option<CampaignSchedule> {
        self.schedules.delete(&schedule_key(orchestration_id, segment))
    }

    /// Envíos conocidos, ordenados por fecha de envío.
    pub fn schedules(&self) -> Vec<CampaignSchedule> {
        let mut all = self.schedules.list();
        all.sort_by(|a, b| a.schedule_time.cmp(&b.schedule_time));
        all
    }

    // --- orquestaciones -----------------------------------------------------

    pub fn save_record(&self, record: DeploymentRecord) {
        self.records.set(record.id.clone(), record);
    }

    pub fn record(&self, id: &str) -> Option<DeploymentRecord> {
        self.records.get(id)
    }

    /// Todas las orquestaciones, la más reciente primero.
    pub fn records(&self) -> Vec<DeploymentRecord> {
        let mut all = self.records.list();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn records_by_canvas(&self, canvas_id: &str) -> Vec<DeploymentRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.canvas_id == canvas_id)
            .collect()
    }

    pub fn save_status(&self, status: OrchestrationStatus) {
        self.statuses.set(status.id.clone(), status);
    }

    pub fn status(&self, id: &str) -> Option<OrchestrationStatus> {
        self.statuses.get(id)
    }
}
