use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::app::ports::{DatasetRef, DatasetSource};
use crate::common::error::{BuildError, Result};
use crate::common::types::RawRecord;

/// In-memory dataset adapter for tests and offline demos.
///
/// Datasets not registered, or registered as gated, are reported unavailable.
#[derive(Default)]
pub struct InMemorySource {
    datasets: HashMap<DatasetRef, Vec<RawRecord>>,
    gated: HashSet<DatasetRef>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, dataset: DatasetRef, records: Vec<RawRecord>) -> Self {
        self.datasets.insert(dataset, records);
        self
    }

    pub fn with_gated(mut self, dataset: DatasetRef) -> Self {
        self.gated.insert(dataset);
        self
    }
}

#[async_trait]
impl DatasetSource for InMemorySource {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn fetch_rows(
        &self,
        dataset: &DatasetRef,
        offset: usize,
        length: usize,
    ) -> Result<Vec<RawRecord>> {
        if self.gated.contains(dataset) {
            return Err(BuildError::unavailable(dataset, "access is gated"));
        }
        let records = self
            .datasets
            .get(dataset)
            .ok_or_else(|| BuildError::unavailable(dataset, "not registered"))?;
        Ok(records.iter().skip(offset).take(length).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_gated_and_missing_datasets() {
        let open = DatasetRef::new("org/open", "train");
        let gated = DatasetRef::new("org/gated", "train");
        let source = InMemorySource::new()
            .with_dataset(open.clone(), vec![json!({"a": 1}), json!({"a": 2})])
            .with_gated(gated.clone());

        assert_eq!(source.fetch_rows(&open, 1, 5).await.unwrap(), vec![json!({"a": 2})]);
        assert!(source.fetch_rows(&gated, 0, 5).await.unwrap_err().is_dataset_unavailable());
        assert!(source
            .fetch_rows(&DatasetRef::new("org/other", "train"), 0, 5)
            .await
            .unwrap_err()
            .is_dataset_unavailable());
    }
}
