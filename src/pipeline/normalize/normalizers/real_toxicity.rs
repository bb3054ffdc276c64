use async_trait::async_trait;
use tracing::{info, instrument};

use crate::app::ports::DatasetRef;
use crate::common::constants::{
    REAL_TOXICITY_DATASET, REAL_TOXICITY_ID_PREFIX, REAL_TOXICITY_SOURCE, REAL_TOXICITY_TS_OFFSET,
};
use crate::common::error::Result;
use crate::common::types::{EnforcementRow, PolicyCategory, RawRecord};
use crate::pipeline::banding::Banding;
use crate::pipeline::normalize::{AppealSignal, MapContext, MapperUtils, RowSeed, SourceMapper};
use crate::pipeline::pager::RecordPager;

/// Blocked prompts below this toxicity are disputed and overturned
const OVERTURN_TOXICITY: f64 = 0.6;

/// Perspective scores read from one prompt
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ToxicityScores {
    pub toxicity: f64,
    pub identity_attack: f64,
    pub threat: f64,
    pub sexually_explicit: f64,
}

impl ToxicityScores {
    pub fn from_record(scores: &RawRecord) -> Self {
        let toxicity = MapperUtils::metric(scores, "toxicity", 0.0);
        Self {
            // NaN reads as fully toxic
            toxicity: if toxicity.is_nan() { 1.0 } else { toxicity.clamp(0.0, 1.0) },
            identity_attack: MapperUtils::metric(scores, "identity_attack", 0.0),
            threat: MapperUtils::metric(scores, "threat", 0.0),
            sexually_explicit: MapperUtils::metric(scores, "sexually_explicit", 0.0),
        }
    }
}

/// A dominant attribute and the score at which it takes over the category
pub struct AttributeRule {
    pub category: PolicyCategory,
    pub threshold: f64,
    pub rationale: &'static str,
    pub score: fn(&ToxicityScores) -> f64,
}

/// Checked in order; the first attribute at or above its threshold wins
pub const ATTRIBUTE_RULES: [AttributeRule; 3] = [
    AttributeRule {
        category: PolicyCategory::HateSpeech,
        threshold: 0.5,
        rationale: "rtp: identity attack",
        score: |s| s.identity_attack,
    },
    AttributeRule {
        category: PolicyCategory::ViolentHarm,
        threshold: 0.5,
        rationale: "rtp: threat",
        score: |s| s.threat,
    },
    AttributeRule {
        category: PolicyCategory::SexualContent,
        threshold: 0.85,
        rationale: "rtp: sexual explicit",
        score: |s| s.sexually_explicit,
    },
];

/// Category, confidence and rationale for a prompt's scores
pub fn classify_scores(scores: &ToxicityScores) -> (PolicyCategory, f64, &'static str) {
    for rule in &ATTRIBUTE_RULES {
        let attribute = (rule.score)(scores);
        if attribute >= rule.threshold {
            return (rule.category, scores.toxicity.max(attribute), rule.rationale);
        }
    }
    (
        PolicyCategory::NonviolentWrongdoing,
        scores.toxicity * 0.5,
        "rtp: benign/low-tox",
    )
}

/// Prompt text and the object holding its scores. The nested `prompt` object is
/// used when it carries a text; otherwise the record itself.
pub fn prompt_parts(record: &RawRecord) -> (&str, &RawRecord) {
    if let Some(prompt) = record.get("prompt").filter(|p| p.is_object()) {
        if let Some(text) = prompt.get("text").and_then(|t| t.as_str()) {
            return (text, prompt);
        }
    }
    let text = record.get("text").and_then(|t| t.as_str()).unwrap_or("");
    (text, record)
}

/// Mapper for RealToxicityPrompts
pub struct RealToxicityMapper;

impl RealToxicityMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn dataset() -> DatasetRef {
        DatasetRef::new(REAL_TOXICITY_DATASET, "train")
    }

    /// Map the `index`-th (0-based) record
    pub fn map_record(
        &self,
        index: usize,
        record: &RawRecord,
        bands: &Banding,
        window_days: u32,
    ) -> EnforcementRow {
        let (text, scores) = prompt_parts(record);
        let scores = ToxicityScores::from_record(scores);
        let (category, confidence, rationale) = classify_scores(&scores);
        let modest = scores.toxicity < OVERTURN_TOXICITY;
        RowSeed {
            id_prefix: REAL_TOXICITY_ID_PREFIX,
            seq: index + 1,
            ts_index: REAL_TOXICITY_TS_OFFSET + index as u64,
            category,
            confidence,
            rationale: rationale.to_string(),
            language: "en".to_string(),
            text,
            appeal: AppealSignal::Simulated {
                dispute: modest,
                overturn: modest,
            },
        }
        .into_row(bands, window_days)
    }
}

impl Default for RealToxicityMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceMapper for RealToxicityMapper {
    fn source_id(&self) -> &str {
        REAL_TOXICITY_SOURCE
    }

    fn name(&self) -> &str {
        "RealToxicityPrompts Mapper"
    }

    #[instrument(skip(self, ctx), fields(source = REAL_TOXICITY_SOURCE))]
    async fn map(&self, ctx: &MapContext<'_>, max_rows: usize) -> Result<Vec<EnforcementRow>> {
        let mut records = Vec::new();
        if max_rows > 0 {
            let mut pager = RecordPager::new(ctx.source, Self::dataset(), ctx.page_size);
            pager.fill(&mut records, max_rows, &|_| true).await?;
        }
        info!("Mapping {} RealToxicityPrompts records", records.len());
        Ok(records
            .iter()
            .enumerate()
            .map(|(i, record)| self.map_record(i, record, &ctx.bands, ctx.window_days))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{AppealOutcome, Decision, UserResponse};
    use serde_json::json;

    #[test]
    fn test_low_toxicity_prompt_is_benign_allow() {
        let record = json!({
            "filename": "0766186-bc7f2a64cb271f5f56cf6f25570cd9ed.txt",
            "prompt": {"text": "Corruption involving the contractors is", "toxicity": 0.3}
        });
        let row = RealToxicityMapper::new().map_record(0, &record, &Banding::default(), 7);
        assert_eq!(row.id, "rtp_1");
        assert_eq!(row.ts, "2025-08-08T23:54:00Z");
        assert_eq!(row.policy_category, PolicyCategory::NonviolentWrongdoing);
        assert_eq!(row.confidence, 0.15);
        assert_eq!(row.decision, Decision::Allow);
        assert_eq!(row.rationale, "rtp: benign/low-tox");
        assert_eq!(row.slice, "EN");
        assert_eq!(row.appeal_outcome, AppealOutcome::None);
    }

    #[test]
    fn test_attribute_rule_order() {
        let scores = ToxicityScores {
            toxicity: 0.4,
            identity_attack: 0.6,
            threat: 0.9,
            sexually_explicit: 0.95,
        };
        assert_eq!(
            classify_scores(&scores),
            (PolicyCategory::HateSpeech, 0.6, "rtp: identity attack")
        );

        let scores = ToxicityScores { threat: 0.5, ..scores };
        let scores = ToxicityScores { identity_attack: 0.49, ..scores };
        assert_eq!(classify_scores(&scores).0, PolicyCategory::ViolentHarm);

        let scores = ToxicityScores {
            toxicity: 0.9,
            sexually_explicit: 0.85,
            ..Default::default()
        };
        assert_eq!(
            classify_scores(&scores),
            (PolicyCategory::SexualContent, 0.9, "rtp: sexual explicit")
        );

        let scores = ToxicityScores { sexually_explicit: 0.84, ..scores };
        assert_eq!(classify_scores(&scores).0, PolicyCategory::NonviolentWrongdoing);
    }

    #[test]
    fn test_blocked_threat_with_modest_toxicity_is_overturned() {
        let record = json!({"prompt": {"text": "watch out", "toxicity": 0.2, "threat": 0.95}});
        let row = RealToxicityMapper::new().map_record(0, &record, &Banding::default(), 7);
        assert_eq!(row.policy_category, PolicyCategory::ViolentHarm);
        assert_eq!(row.decision, Decision::Block);
        assert_eq!(row.user_response, UserResponse::Dispute);
        assert_eq!(row.appeal_outcome, AppealOutcome::Overturned);
    }

    #[test]
    fn test_blocked_toxic_prompt_is_upheld() {
        let record = json!({"prompt": {"text": "x", "toxicity": 0.97, "identity_attack": 0.8}});
        let row = RealToxicityMapper::new().map_record(0, &record, &Banding::default(), 7);
        assert_eq!(row.confidence, 0.97);
        assert_eq!(row.user_response, UserResponse::None);
        assert_eq!(row.appeal_outcome, AppealOutcome::Upheld);
    }

    #[test]
    fn test_scores_fall_back_to_top_level() {
        let record = json!({"prompt": {"toxicity": 0.99}, "text": "top level", "toxicity": "1.7"});
        let (text, scores) = prompt_parts(&record);
        assert_eq!(text, "top level");
        let scores = ToxicityScores::from_record(scores);
        assert_eq!(scores.toxicity, 1.0);
        assert_eq!(scores.threat, 0.0);

        let nulled = json!({"prompt": null});
        let (text, _) = prompt_parts(&nulled);
        assert_eq!(text, "");
    }

    #[test]
    fn test_nan_toxicity_reads_as_maximal() {
        let record = json!({"prompt": {"text": "odd score", "toxicity": "nan", "threat": "NaN"}});
        let (_, scores) = prompt_parts(&record);
        let scores = ToxicityScores::from_record(scores);
        assert_eq!(scores.toxicity, 1.0);

        let row = RealToxicityMapper::new().map_record(0, &record, &Banding::default(), 7);
        assert_eq!(row.policy_category, PolicyCategory::NonviolentWrongdoing);
        assert_eq!(row.confidence, 0.5);
        assert_eq!(row.decision, Decision::Allow);
        assert_eq!(row.rationale, "rtp: benign/low-tox");
    }
}
