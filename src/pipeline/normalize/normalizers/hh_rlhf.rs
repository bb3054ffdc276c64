use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::{info, instrument};

use crate::app::ports::DatasetRef;
use crate::common::constants::{
    HH_RLHF_DATASET, HH_RLHF_ID_PREFIX, HH_RLHF_SOURCE, HH_RLHF_SUBSET, HH_RLHF_TS_OFFSET,
};
use crate::common::error::Result;
use crate::common::types::{EnforcementRow, PolicyCategory, RawRecord};
use crate::pipeline::banding::Banding;
use crate::pipeline::normalize::{AppealSignal, MapContext, MapperUtils, RowSeed, SourceMapper};
use crate::pipeline::pager::RecordPager;

/// Characters kept from a transcript with no `Human:` turn
const TRANSCRIPT_PREVIEW_CHARS: usize = 280;

/// A category and the case-insensitive patterns that select it
pub struct KeywordRule {
    pub category: PolicyCategory,
    pub patterns: Vec<Regex>,
}

impl KeywordRule {
    fn new(category: PolicyCategory, patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .expect("keyword pattern must compile")
            })
            .collect();
        Self { category, patterns }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

/// Ordered keyword lexicon; the first matching rule wins
pub static KEYWORD_RULES: Lazy<Vec<KeywordRule>> = Lazy::new(|| {
    vec![
        KeywordRule::new(
            PolicyCategory::ViolentHarm,
            &[
                r"\b(kill|stab|shoot|bomb|poison|assault|harm)\b",
                r"\b(make|build)\s+(a\s+)?(bomb|weapon)\b",
            ],
        ),
        KeywordRule::new(
            PolicyCategory::SelfHarm,
            &[r"\b(kill\s+myself|suicide|self[- ]?harm|cutting)\b"],
        ),
        KeywordRule::new(
            PolicyCategory::SexualContent,
            &[r"\b(sex|porn|nude|explicit|adult)\b"],
        ),
        KeywordRule::new(
            PolicyCategory::NonviolentWrongdoing,
            &[r"\b(steal|shoplift|tax\s+evasion|scam|fraud|counterfeit|hack|ddos|phishing)\b"],
        ),
    ]
});

static HUMAN_TURN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Human:\s*(.*)").expect("human turn pattern must compile"));

/// Category of a prompt; unmatched prompts land in the nonviolent bucket
pub fn classify_prompt(text: &str) -> PolicyCategory {
    KEYWORD_RULES
        .iter()
        .find(|rule| rule.matches(text))
        .map(|rule| rule.category)
        .unwrap_or(PolicyCategory::NonviolentWrongdoing)
}

/// More specific categories get higher confidence
pub fn category_confidence(category: PolicyCategory) -> f64 {
    match category {
        PolicyCategory::ViolentHarm => 0.93,
        PolicyCategory::SelfHarm => 0.92,
        PolicyCategory::SexualContent => 0.88,
        PolicyCategory::NonviolentWrongdoing | PolicyCategory::HateSpeech => 0.82,
    }
}

/// Last `Human:` utterance of a dialogue transcript (rest of its line, trimmed).
/// Without one, the first 280 characters of the transcript.
pub fn last_human_utterance(transcript: &str) -> String {
    match HUMAN_TURN.captures_iter(transcript).last() {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        None => transcript.chars().take(TRANSCRIPT_PREVIEW_CHARS).collect(),
    }
}

/// Mapper for the harmless-base subset of HH-RLHF
pub struct HhRlhfMapper;

impl HhRlhfMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn dataset() -> DatasetRef {
        DatasetRef::in_data_dir(HH_RLHF_DATASET, HH_RLHF_SUBSET, "train")
    }

    /// Map the `index`-th (0-based) record
    pub fn map_record(
        &self,
        index: usize,
        record: &RawRecord,
        bands: &Banding,
        window_days: u32,
    ) -> EnforcementRow {
        let transcript = MapperUtils::first_str(record, &["chosen"]).unwrap_or("");
        let text = last_human_utterance(transcript);
        let category = classify_prompt(&text);
        RowSeed {
            id_prefix: HH_RLHF_ID_PREFIX,
            seq: index + 1,
            ts_index: HH_RLHF_TS_OFFSET + index as u64,
            category,
            confidence: category_confidence(category),
            rationale: format!("hh-rlhf: prompt matches {}", category),
            language: "en".to_string(),
            text: &text,
            appeal: AppealSignal::NotSimulated,
        }
        .into_row(bands, window_days)
    }
}

impl Default for HhRlhfMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceMapper for HhRlhfMapper {
    fn source_id(&self) -> &str {
        HH_RLHF_SOURCE
    }

    fn name(&self) -> &str {
        "HH-RLHF Harmless Mapper"
    }

    #[instrument(skip(self, ctx), fields(source = HH_RLHF_SOURCE))]
    async fn map(&self, ctx: &MapContext<'_>, max_rows: usize) -> Result<Vec<EnforcementRow>> {
        let mut records = Vec::new();
        if max_rows > 0 {
            let mut pager = RecordPager::new(ctx.source, Self::dataset(), ctx.page_size);
            pager.fill(&mut records, max_rows, &|_| true).await?;
        }
        info!("Mapping {} HH-RLHF transcripts", records.len());
        Ok(records
            .iter()
            .enumerate()
            .map(|(i, record)| self.map_record(i, record, &ctx.bands, ctx.window_days))
            .collect())
    }
}
