use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

use crate::app::ports::DatasetRef;
use crate::common::constants::{
    HATEXPLAIN_DATASET, HATEXPLAIN_ID_PREFIX, HATEXPLAIN_SOURCE, HATEXPLAIN_TS_OFFSET,
};
use crate::common::error::Result;
use crate::common::types::{EnforcementRow, PolicyCategory, RawRecord};
use crate::pipeline::banding::Banding;
use crate::pipeline::normalize::{AppealSignal, MapContext, MapperUtils, RowSeed, SourceMapper};
use crate::pipeline::pager::collect_from_splits;

/// HateXplain annotator label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotatorLabel {
    Hatespeech,
    Normal,
    Offensive,
}

impl AnnotatorLabel {
    /// Tally order; on a tie the earliest label wins
    pub const ORDER: [AnnotatorLabel; 3] = [
        AnnotatorLabel::Hatespeech,
        AnnotatorLabel::Normal,
        AnnotatorLabel::Offensive,
    ];

    /// Dataset codes are 0 hatespeech, 1 normal, 2 offensive; names are accepted too
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64()? {
                0 => Some(AnnotatorLabel::Hatespeech),
                1 => Some(AnnotatorLabel::Normal),
                2 => Some(AnnotatorLabel::Offensive),
                _ => None,
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "0" | "hatespeech" => Some(AnnotatorLabel::Hatespeech),
                "1" | "normal" => Some(AnnotatorLabel::Normal),
                "2" | "offensive" => Some(AnnotatorLabel::Offensive),
                _ => None,
            },
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            AnnotatorLabel::Hatespeech => 0,
            AnnotatorLabel::Normal => 1,
            AnnotatorLabel::Offensive => 2,
        }
    }

    pub fn confidence(self) -> f64 {
        match self {
            AnnotatorLabel::Hatespeech => 0.92,
            AnnotatorLabel::Normal => 0.15,
            AnnotatorLabel::Offensive => 0.70,
        }
    }

    pub fn rationale(self) -> &'static str {
        match self {
            AnnotatorLabel::Hatespeech => "hatexplain: hatespeech",
            AnnotatorLabel::Normal => "hatexplain: normal",
            AnnotatorLabel::Offensive => "hatexplain: offensive (borderline)",
        }
    }
}

/// Majority label; ties go to the first label in `AnnotatorLabel::ORDER`, so an
/// empty vote is hatespeech
pub fn majority_label<I>(labels: I) -> AnnotatorLabel
where
    I: IntoIterator<Item = AnnotatorLabel>,
{
    let mut counts = [0usize; 3];
    for label in labels {
        counts[label.index()] += 1;
    }
    let mut best = AnnotatorLabel::ORDER[0];
    for label in AnnotatorLabel::ORDER {
        if counts[label.index()] > counts[best.index()] {
            best = label;
        }
    }
    best
}

/// Annotator labels from either a list of `{label}` objects or a `{label: [...]}`
/// column object; unknown labels are ignored
pub fn annotator_labels(record: &RawRecord) -> Vec<AnnotatorLabel> {
    match record.get("annotators") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|a| a.get("label"))
            .filter_map(AnnotatorLabel::from_value)
            .collect(),
        Some(Value::Object(columns)) => match columns.get("label") {
            Some(Value::Array(labels)) => {
                labels.iter().filter_map(AnnotatorLabel::from_value).collect()
            }
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Post text: tokens joined by spaces, else `text`, else empty
pub fn post_text(record: &RawRecord) -> String {
    let tokens: Vec<&str> = record
        .get("post_tokens")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|t| t.as_str()).collect())
        .unwrap_or_default();
    if !tokens.is_empty() {
        return tokens.join(" ");
    }
    MapperUtils::first_str(record, &["text"]).unwrap_or("").to_string()
}

/// Mapper for HateXplain (train, validation and test splits, in that order)
pub struct HateXplainMapper;

impl HateXplainMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn splits() -> Vec<DatasetRef> {
        ["train", "validation", "test"]
            .iter()
            .map(|split| DatasetRef::new(HATEXPLAIN_DATASET, split))
            .collect()
    }

    /// Map the `index`-th (0-based) record
    pub fn map_record(
        &self,
        index: usize,
        record: &RawRecord,
        bands: &Banding,
        window_days: u32,
    ) -> EnforcementRow {
        let text = post_text(record);
        let majority = majority_label(annotator_labels(record));
        RowSeed {
            id_prefix: HATEXPLAIN_ID_PREFIX,
            seq: index + 1,
            ts_index: HATEXPLAIN_TS_OFFSET + index as u64,
            category: PolicyCategory::HateSpeech,
            confidence: majority.confidence(),
            rationale: majority.rationale().to_string(),
            language: "en".to_string(),
            text: &text,
            appeal: AppealSignal::Simulated {
                dispute: majority != AnnotatorLabel::Hatespeech,
                overturn: majority == AnnotatorLabel::Normal,
            },
        }
        .into_row(bands, window_days)
    }
}

impl Default for HateXplainMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceMapper for HateXplainMapper {
    fn source_id(&self) -> &str {
        HATEXPLAIN_SOURCE
    }

    fn name(&self) -> &str {
        "HateXplain Mapper"
    }

    #[instrument(skip(self, ctx), fields(source = HATEXPLAIN_SOURCE))]
    async fn map(&self, ctx: &MapContext<'_>, max_rows: usize) -> Result<Vec<EnforcementRow>> {
        let records =
            collect_from_splits(ctx.source, &Self::splits(), ctx.page_size, max_rows, &|_| true)
                .await?;
        info!("Mapping {} HateXplain records", records.len());
        Ok(records
            .iter()
            .enumerate()
            .map(|(i, record)| self.map_record(i, record, &ctx.bands, ctx.window_days))
            .collect())
    }
}
