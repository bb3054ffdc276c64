use async_trait::async_trait;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::app::ports::{DatasetRef, DatasetSource};
use crate::common::error::{BuildError, Result};
use crate::common::types::RawRecord;

/// Dataset adapter over a local mirror of JSON Lines files.
///
/// Layout: `<root>/<owner>__<name>[/<config>]/<split>.jsonl`, one JSON object per
/// line. Blank lines are ignored.
pub struct JsonlSource {
    root: PathBuf,
}

impl JsonlSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, dataset: &DatasetRef) -> PathBuf {
        let mut path = self.root.join(dataset.name.replace('/', "__"));
        if let Some(subset) = dataset.subset() {
            path = path.join(subset);
        }
        path.join(format!("{}.jsonl", dataset.split))
    }
}

#[async_trait]
impl DatasetSource for JsonlSource {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn fetch_rows(
        &self,
        dataset: &DatasetRef,
        offset: usize,
        length: usize,
    ) -> Result<Vec<RawRecord>> {
        let path = self.path_for(dataset);
        let file = File::open(&path).map_err(|e| {
            BuildError::unavailable(dataset, format!("{}: {}", path.display(), e))
        })?;

        let mut records = Vec::with_capacity(length);
        let lines = BufReader::new(file)
            .lines()
            .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
            .skip(offset)
            .take(length);
        for line in lines {
            let line = line?;
            records.push(serde_json::from_str(&line)?);
        }
        debug!(path = %path.display(), "Read {} records at offset {}", records.len(), offset);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_path_layout() {
        let source = JsonlSource::new("/data");
        assert_eq!(
            source.path_for(&DatasetRef::in_data_dir("Anthropic/hh-rlhf", "harmless-base", "train")),
            PathBuf::from("/data/Anthropic__hh-rlhf/harmless-base/train.jsonl")
        );
        assert_eq!(
            source.path_for(&DatasetRef::new("valeriobasile/HatEval", "test")),
            PathBuf::from("/data/valeriobasile__HatEval/test.jsonl")
        );
    }

    #[tokio::test]
    async fn test_pages_through_file() {
        let dir = tempdir().unwrap();
        let dataset = DatasetRef::new("org/set", "train");
        let source = JsonlSource::new(dir.path());
        let path = source.path_for(&dataset);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{\"n\":1}\n\n{\"n\":2}\n{\"n\":3}\n").unwrap();

        let first = source.fetch_rows(&dataset, 0, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1]["n"], 2);

        let rest = source.fetch_rows(&dataset, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["n"], 3);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let source = JsonlSource::new(dir.path());
        let err = source
            .fetch_rows(&DatasetRef::new("org/missing", "train"), 0, 10)
            .await
            .unwrap_err();
        assert!(err.is_dataset_unavailable());
    }
}
