use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::app::ports::{DatasetRef, DatasetSource};
use crate::common::error::{BuildError, Result};
use crate::common::types::RawRecord;

/// Largest page the rows endpoint serves in one request
pub const MAX_ROWS_PER_REQUEST: usize = 100;

/// Config name the datasets-server gives single-config datasets
const DEFAULT_CONFIG: &str = "default";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Deserialize)]
struct RowsResponse {
    #[serde(default)]
    rows: Vec<RowEntry>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row: RawRecord,
}

#[derive(Debug, Deserialize)]
struct SplitsResponse {
    #[serde(default)]
    splits: Vec<SplitEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SplitEntry {
    pub config: String,
    pub split: String,
}

/// Config publishing `split`: `default` when it has one, else the first listed
pub fn select_config(entries: &[SplitEntry], split: &str) -> Option<String> {
    let mut candidates = entries.iter().filter(|e| e.split == split);
    let first = candidates.next()?;
    if first.config == DEFAULT_CONFIG {
        return Some(first.config.clone());
    }
    Some(
        candidates
            .find(|e| e.config == DEFAULT_CONFIG)
            .unwrap_or(first)
            .config
            .clone(),
    )
}

/// JSON Lines body, gzip-compressed or not; blank lines are skipped
pub fn decode_jsonl(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let text = if bytes.starts_with(&GZIP_MAGIC) {
        let mut text = String::new();
        MultiGzDecoder::new(bytes).read_to_string(&mut text)?;
        text
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(BuildError::from))
        .collect()
}

/// Dataset adapter for the Hugging Face hub.
///
/// Published configs are paged through the datasets-server `/rows` endpoint, with
/// the config looked up via `/splits` when the reference names none. Data
/// directories are not configs there, so `<dir>/<split>.jsonl.gz` is downloaded
/// from the dataset repository once and paged from memory.
pub struct HubRowsClient {
    client: reqwest::Client,
    base_url: String,
    hub_url: String,
    token: Option<String>,
    splits: Mutex<HashMap<String, Vec<SplitEntry>>>,
    files: Mutex<HashMap<DatasetRef, Arc<Vec<RawRecord>>>>,
}

impl HubRowsClient {
    pub fn new(
        base_url: &str,
        hub_url: &str,
        timeout: Duration,
        token: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::from_client(client, base_url, hub_url, token))
    }

    pub fn from_client(
        client: reqwest::Client,
        base_url: &str,
        hub_url: &str,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            hub_url: hub_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            splits: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
        }
    }

    fn rows_url(&self) -> String {
        format!("{}/rows", self.base_url)
    }

    fn splits_url(&self) -> String {
        format!("{}/splits", self.base_url)
    }

    pub fn file_url(&self, dataset: &DatasetRef, data_dir: &str) -> String {
        format!(
            "{}/datasets/{}/resolve/main/{}/{}.jsonl.gz",
            self.hub_url, dataset.name, data_dir, dataset.split
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    /// Send a request; transport failures and non-success statuses both mean the
    /// dataset cannot be produced
    async fn send(
        &self,
        dataset: &DatasetRef,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let resp = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| BuildError::unavailable(dataset, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(BuildError::unavailable(
                dataset,
                format!("status {}: {}", status.as_u16(), snippet),
            ));
        }
        Ok(resp)
    }

    async fn resolve_config(&self, dataset: &DatasetRef) -> Result<String> {
        if let Some(config) = &dataset.config {
            return Ok(config.clone());
        }
        let mut splits = self.splits.lock().await;
        if !splits.contains_key(&dataset.name) {
            let request = self
                .client
                .get(self.splits_url())
                .query(&[("dataset", dataset.name.as_str())]);
            let listing: SplitsResponse = self
                .send(dataset, request)
                .await?
                .json()
                .await
                .map_err(|e| BuildError::unavailable(dataset, e))?;
            splits.insert(dataset.name.clone(), listing.splits);
        }
        let entries = splits.get(&dataset.name).map(Vec::as_slice).unwrap_or(&[]);
        select_config(entries, &dataset.split).ok_or_else(|| {
            BuildError::unavailable(dataset, format!("no config publishes split '{}'", dataset.split))
        })
    }

    async fn fetch_rows_page(
        &self,
        dataset: &DatasetRef,
        offset: usize,
        length: usize,
    ) -> Result<Vec<RawRecord>> {
        let config = self.resolve_config(dataset).await?;
        let query = [
            ("dataset", dataset.name.clone()),
            ("config", config),
            ("split", dataset.split.clone()),
            ("offset", offset.to_string()),
            ("length", length.to_string()),
        ];
        let request = self.client.get(self.rows_url()).query(&query);
        let page: RowsResponse = self
            .send(dataset, request)
            .await?
            .json()
            .await
            .map_err(|e| BuildError::unavailable(dataset, e))?;
        debug!("Fetched {} rows at offset {}", page.rows.len(), offset);
        Ok(page.rows.into_iter().map(|entry| entry.row).collect())
    }

    async fn data_dir_records(
        &self,
        dataset: &DatasetRef,
        data_dir: &str,
    ) -> Result<Arc<Vec<RawRecord>>> {
        let mut files = self.files.lock().await;
        if let Some(records) = files.get(dataset) {
            return Ok(Arc::clone(records));
        }
        let url = self.file_url(dataset, data_dir);
        info!(url = %url, "Downloading dataset file");
        let bytes = self
            .send(dataset, self.client.get(url.as_str()))
            .await?
            .bytes()
            .await
            .map_err(|e| BuildError::unavailable(dataset, e))?;
        let records = Arc::new(
            decode_jsonl(&bytes).map_err(|e| BuildError::unavailable(dataset, e))?,
        );
        files.insert(dataset.clone(), Arc::clone(&records));
        Ok(records)
    }
}

#[async_trait]
impl DatasetSource for HubRowsClient {
    fn name(&self) -> &str {
        "hub"
    }

    #[instrument(skip(self), fields(dataset = %dataset))]
    async fn fetch_rows(
        &self,
        dataset: &DatasetRef,
        offset: usize,
        length: usize,
    ) -> Result<Vec<RawRecord>> {
        match (&dataset.config, &dataset.data_dir) {
            (None, Some(data_dir)) => {
                let records = self.data_dir_records(dataset, data_dir).await?;
                Ok(records.iter().skip(offset).take(length).cloned().collect())
            }
            _ => self.fetch_rows_page(dataset, offset, length).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const HATEXPLAIN_SPLITS: &str = r#"{
        "splits": [
            {"dataset": "Hate-speech-CNERG/hatexplain", "config": "plain_text", "split": "train"},
            {"dataset": "Hate-speech-CNERG/hatexplain", "config": "plain_text", "split": "validation"},
            {"dataset": "Hate-speech-CNERG/hatexplain", "config": "plain_text", "split": "test"}
        ],
        "pending": [],
        "failed": []
    }"#;

    /// Serve canned bodies over plain HTTP; the first route whose key occurs in
    /// the request target wins, anything else is a 404
    async fn serve(routes: Vec<(&'static str, Vec<u8>)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => head.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head).to_string();
                    let target = head.split_whitespace().nth(1).unwrap_or("").to_string();
                    let (status, body) = routes
                        .iter()
                        .find(|(key, _)| target.contains(key))
                        .map(|(_, body)| ("200 OK", body.clone()))
                        .unwrap_or(("404 Not Found", b"not found".to_vec()));
                    let header = format!(
                        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        body.len()
                    );
                    let _ = socket.write_all(header.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    fn local_client(base: &str) -> HubRowsClient {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HubRowsClient::from_client(client, base, base, None)
    }

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_rows_response_shape() {
        let body = r#"{
            "features": [],
            "rows": [
                {"row_idx": 0, "row": {"text": "first", "HS": 1}, "truncated_cells": []},
                {"row_idx": 1, "row": {"text": "second", "HS": 0}, "truncated_cells": []}
            ],
            "num_rows_total": 2
        }"#;
        let page: RowsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[1].row["text"], "second");
    }

    #[test]
    fn test_select_config_from_splits_listing() {
        let listing: SplitsResponse = serde_json::from_str(HATEXPLAIN_SPLITS).unwrap();
        assert_eq!(select_config(&listing.splits, "validation"), Some("plain_text".to_string()));
        assert_eq!(select_config(&listing.splits, "dev"), None);

        let entries = vec![
            SplitEntry { config: "es".into(), split: "train".into() },
            SplitEntry { config: "default".into(), split: "train".into() },
        ];
        assert_eq!(select_config(&entries, "train"), Some("default".to_string()));
    }

    #[test]
    fn test_decode_jsonl_plain_and_gzip() {
        let text = "{\"chosen\": \"Human: hi\"}\n\n{\"chosen\": \"Human: bye\"}\n";
        assert_eq!(decode_jsonl(text.as_bytes()).unwrap().len(), 2);
        let records = decode_jsonl(&gzip(text)).unwrap();
        assert_eq!(records[1]["chosen"], "Human: bye");
    }

    #[test]
    fn test_blank_token_is_dropped() {
        let client = HubRowsClient::new(
            "https://example.org/",
            "https://hub.example.org/",
            Duration::from_secs(5),
            Some("  ".into()),
        )
        .unwrap();
        assert!(client.token.is_none());
        assert_eq!(client.rows_url(), "https://example.org/rows");
        assert_eq!(
            client.file_url(&DatasetRef::in_data_dir("Anthropic/hh-rlhf", "harmless-base", "train"), "harmless-base"),
            "https://hub.example.org/datasets/Anthropic/hh-rlhf/resolve/main/harmless-base/train.jsonl.gz"
        );
    }

    #[tokio::test]
    async fn test_rows_use_config_listed_by_splits() {
        let rows = r#"{"rows": [{"row_idx": 0, "row": {"post_tokens": ["a"]}}]}"#;
        let base = serve(vec![
            ("/splits?dataset=Hate-speech-CNERG%2Fhatexplain", HATEXPLAIN_SPLITS.as_bytes().to_vec()),
            ("config=plain_text&split=train", rows.as_bytes().to_vec()),
        ])
        .await;
        let client = local_client(&base);

        let page = client
            .fetch_rows(&DatasetRef::new("Hate-speech-CNERG/hatexplain", "train"), 0, 100)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["post_tokens"][0], "a");

        let err = client
            .fetch_rows(&DatasetRef::new("Hate-speech-CNERG/hatexplain", "dev"), 0, 100)
            .await
            .unwrap_err();
        assert!(err.is_dataset_unavailable());
    }

    #[tokio::test]
    async fn test_data_dir_is_read_from_repository_file() {
        let body = gzip(
            "{\"chosen\": \"\\n\\nHuman: one\"}\n{\"chosen\": \"\\n\\nHuman: two\"}\n{\"chosen\": \"\\n\\nHuman: three\"}\n",
        );
        let base = serve(vec![(
            "/datasets/Anthropic/hh-rlhf/resolve/main/harmless-base/train.jsonl.gz",
            body,
        )])
        .await;
        let client = local_client(&base);
        let dataset = DatasetRef::in_data_dir("Anthropic/hh-rlhf", "harmless-base", "train");

        let first = client.fetch_rows(&dataset, 0, 2).await.unwrap();
        let rest = client.fetch_rows(&dataset, 2, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["chosen"], "\n\nHuman: three");

        let missing = DatasetRef::in_data_dir("Anthropic/hh-rlhf", "red-team-attempts", "train");
        assert!(client.fetch_rows(&missing, 0, 2).await.unwrap_err().is_dataset_unavailable());
    }

    #[tokio::test]
    async fn test_gated_dataset_is_unavailable() {
        let base = serve(Vec::new()).await;
        let client = local_client(&base);
        let err = client
            .fetch_rows(&DatasetRef::new("valeriobasile/HatEval", "train"), 0, 10)
            .await
            .unwrap_err();
        assert!(err.is_dataset_unavailable());
    }
}
