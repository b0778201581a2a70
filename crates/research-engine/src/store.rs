//! Outbound report persistence

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::ResearchReport;

/// Receives finished reports. The engine never reads them back.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &ResearchReport) -> Result<Uuid, StoreError>;
}

/// Thread-safe in-process store
#[derive(Debug, Clone, Default)]
pub struct InMemoryReportStore {
    reports: Arc<RwLock<HashMap<Uuid, ResearchReport>>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &Uuid) -> Option<ResearchReport> {
        self.reports.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save(&self, report: &ResearchReport) -> Result<Uuid, StoreError> {
        let mut reports = self.reports.write().await;
        reports.insert(report.id, report.clone());
        tracing::debug!(report_id = %report.id, stored = reports.len(), "Report saved");
        Ok(report.id)
    }
}
