use async_trait::async_trait;
use std::fmt;

use crate::common::error::Result;
use crate::common::types::RawRecord;

/// Names one split of an upstream dataset, optionally within a subset.
///
/// A subset is either a published config or a data directory inside the
/// dataset repository whose files are read directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetRef {
    pub name: String,
    pub config: Option<String>,
    pub data_dir: Option<String>,
    pub split: String,
}

impl DatasetRef {
    pub fn new(name: &str, split: &str) -> Self {
        Self {
            name: name.to_string(),
            config: None,
            data_dir: None,
            split: split.to_string(),
        }
    }

    pub fn with_config(name: &str, config: &str, split: &str) -> Self {
        Self {
            config: Some(config.to_string()),
            ..Self::new(name, split)
        }
    }

    pub fn in_data_dir(name: &str, data_dir: &str, split: &str) -> Self {
        Self {
            data_dir: Some(data_dir.to_string()),
            ..Self::new(name, split)
        }
    }

    /// Subset component shared by configs and data directories
    pub fn subset(&self) -> Option<&str> {
        self.config.as_deref().or(self.data_dir.as_deref())
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.config, &self.data_dir) {
            (Some(config), _) => write!(f, "{}[{}]/{}", self.name, config, self.split),
            (None, Some(dir)) => write!(f, "{}/{}/{}", self.name, dir, self.split),
            (None, None) => write!(f, "{}/{}", self.name, self.split),
        }
    }
}

/// Dataset retrieval port.
///
/// Implementations return records `offset..offset + length` of the split; a page
/// shorter than `length` means the split is exhausted. When a dataset cannot be
/// produced at all they return `BuildError::DatasetUnavailable`.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_rows(
        &self,
        dataset: &DatasetRef,
        offset: usize,
        length: usize,
    ) -> Result<Vec<RawRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_ref_display() {
        assert_eq!(
            DatasetRef::new("allenai/real-toxicity-prompts", "train").to_string(),
            "allenai/real-toxicity-prompts/train"
        );
        assert_eq!(
            DatasetRef::with_config("Anthropic/hh-rlhf", "harmless-base", "train").to_string(),
            "Anthropic/hh-rlhf[harmless-base]/train"
        );
        assert_eq!(
            DatasetRef::in_data_dir("Anthropic/hh-rlhf", "harmless-base", "train").to_string(),
            "Anthropic/hh-rlhf/harmless-base/train"
        );
        assert_ne!(
            DatasetRef::in_data_dir("org/set", "a", "train"),
            DatasetRef::with_config("org/set", "a", "train")
        );
    }
}
