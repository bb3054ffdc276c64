use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The dataset port could not produce records for the named dataset.
    #[error("Dataset unavailable: {dataset}: {reason}")]
    DatasetUnavailable { dataset: String, reason: String },
}

impl BuildError {
    pub fn unavailable(dataset: impl ToString, reason: impl ToString) -> Self {
        BuildError::DatasetUnavailable {
            dataset: dataset.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_dataset_unavailable(&self) -> bool {
        matches!(self, BuildError::DatasetUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
