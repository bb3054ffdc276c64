use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::app::ports::DatasetRef;
use crate::common::constants::{
    HATEVAL_DATASET, HATEVAL_ID_PREFIX, HATEVAL_SOURCE, HATEVAL_SUPERSET_DATASET,
    HATEVAL_TS_OFFSET,
};
use crate::common::error::Result;
use crate::common::types::{EnforcementRow, PolicyCategory, RawRecord};
use crate::pipeline::banding::Banding;
use crate::pipeline::normalize::{AppealSignal, MapContext, MapperUtils, RowSeed, SourceMapper};
use crate::pipeline::pager::{collect_from_splits, RecordPager};

/// A HatEval post reduced to what the mapper needs, whichever loader produced it
#[derive(Debug, Clone, PartialEq)]
pub struct HatEvalPost {
    pub text: String,
    pub is_hate_speech: bool,
    pub language: String,
}

impl HatEvalPost {
    pub fn from_primary(record: &RawRecord) -> Self {
        Self {
            text: MapperUtils::first_str(record, &["text", "tweet"])
                .unwrap_or("")
                .to_string(),
            is_hate_speech: hate_speech_flag(record),
            language: MapperUtils::first_str(record, &["lang"])
                .unwrap_or("es")
                .to_string(),
        }
    }

    /// Superset rows are Spanish; callers filter to HatEval-tagged rows first
    pub fn from_superset(record: &RawRecord) -> Self {
        Self {
            text: MapperUtils::first_str(record, &["text"]).unwrap_or("").to_string(),
            is_hate_speech: hate_speech_flag(record),
            language: "es".to_string(),
        }
    }
}

/// `HS` (then `hs`) as a boolean. Missing or unreadable labels count as hate
/// speech.
pub fn hate_speech_flag(record: &RawRecord) -> bool {
    let label = ["HS", "hs"]
        .iter()
        .filter_map(|k| record.get(*k))
        .find(|v| !v.is_null());
    match label {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|i| i != 0)
            .or_else(|| n.as_f64().map(|f| f.trunc() != 0.0))
            .unwrap_or(true),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(|i| i != 0).unwrap_or(true),
        _ => true,
    }
}

/// Rows of the superset that originate from the HatEval corpus
pub fn is_hateval_tagged(record: &RawRecord) -> bool {
    record
        .get("dataset")
        .and_then(|v| v.as_str())
        .map(|s| s.eq_ignore_ascii_case("hateval"))
        .unwrap_or(false)
}

/// One way of obtaining HatEval posts
#[async_trait]
pub trait HatEvalLoader: Send + Sync {
    fn label(&self) -> &'static str;

    async fn load(&self, ctx: &MapContext<'_>, max_rows: usize) -> Result<Vec<HatEvalPost>>;
}

/// The access-gated HatEval release (train then test)
pub struct PrimaryHatEvalLoader;

#[async_trait]
impl HatEvalLoader for PrimaryHatEvalLoader {
    fn label(&self) -> &'static str {
        "primary"
    }

    async fn load(&self, ctx: &MapContext<'_>, max_rows: usize) -> Result<Vec<HatEvalPost>> {
        let splits = [
            DatasetRef::new(HATEVAL_DATASET, "train"),
            DatasetRef::new(HATEVAL_DATASET, "test"),
        ];
        let records =
            collect_from_splits(ctx.source, &splits, ctx.page_size, max_rows, &|_| true).await?;
        Ok(records.iter().map(HatEvalPost::from_primary).collect())
    }
}

/// The open Spanish hate-speech superset, filtered to its HatEval rows
pub struct SupersetHatEvalLoader;

#[async_trait]
impl HatEvalLoader for SupersetHatEvalLoader {
    fn label(&self) -> &'static str {
        "superset"
    }

    async fn load(&self, ctx: &MapContext<'_>, max_rows: usize) -> Result<Vec<HatEvalPost>> {
        let dataset = DatasetRef::new(HATEVAL_SUPERSET_DATASET, "train");
        let mut pager = RecordPager::new(ctx.source, dataset, ctx.page_size);
        let mut records = Vec::new();
        pager.fill(&mut records, max_rows, &is_hateval_tagged).await?;
        Ok(records.iter().map(HatEvalPost::from_superset).collect())
    }
}

/// Mapper for HatEval.
///
/// Uses the primary loader unless the fallback is forced; any primary failure
/// switches to the fallback loader, discarding whatever the primary produced.
pub struct HatEvalMapper {
    force_fallback: bool,
    primary: Box<dyn HatEvalLoader>,
    fallback: Box<dyn HatEvalLoader>,
}

impl HatEvalMapper {
    pub fn new(force_fallback: bool) -> Self {
        Self {
            force_fallback,
            primary: Box::new(PrimaryHatEvalLoader),
            fallback: Box::new(SupersetHatEvalLoader),
        }
    }

    async fn load_posts(
        &self,
        ctx: &MapContext<'_>,
        max_rows: usize,
    ) -> Result<(Vec<HatEvalPost>, &'static str)> {
        if self.force_fallback {
            info!("HatEval fallback forced");
            let posts = self.fallback.load(ctx, max_rows).await?;
            return Ok((posts, self.fallback.label()));
        }
        match self.primary.load(ctx, max_rows).await {
            Ok(posts) => Ok((posts, self.primary.label())),
            Err(e) => {
                warn!("Primary HatEval load failed, switching to fallback: {}", e);
                counter!("enforcement_hateval_fallback_total").increment(1);
                let posts = self.fallback.load(ctx, max_rows).await?;
                Ok((posts, self.fallback.label()))
            }
        }
    }

    /// Map the `seq`-th (1-based) post
    pub fn map_post(
        &self,
        seq: usize,
        post: &HatEvalPost,
        bands: &Banding,
        window_days: u32,
    ) -> EnforcementRow {
        let is_hs = post.is_hate_speech;
        RowSeed {
            id_prefix: HATEVAL_ID_PREFIX,
            seq,
            ts_index: HATEVAL_TS_OFFSET + seq as u64,
            category: PolicyCategory::HateSpeech,
            confidence: if is_hs { 0.9 } else { 0.2 },
            rationale: if is_hs { "hateval: HS" } else { "hateval: non-HS" }.to_string(),
            language: post.language.clone(),
            text: &post.text,
            appeal: AppealSignal::Simulated {
                dispute: !is_hs,
                overturn: !is_hs,
            },
        }
        .into_row(bands, window_days)
    }
}

#[async_trait]
impl SourceMapper for HatEvalMapper {
    fn source_id(&self) -> &str {
        HATEVAL_SOURCE
    }

    fn name(&self) -> &str {
        "HatEval Mapper"
    }

    #[instrument(skip(self, ctx), fields(source = HATEVAL_SOURCE))]
    async fn map(&self, ctx: &MapContext<'_>, max_rows: usize) -> Result<Vec<EnforcementRow>> {
        let (posts, loader) = self.load_posts(ctx, max_rows).await?;
        info!(loader, "Mapping {} HatEval posts", posts.len());
        Ok(posts
            .iter()
            .enumerate()
            .map(|(i, post)| self.map_post(i + 1, post, &ctx.bands, ctx.window_days))
            .collect())
    }
}
