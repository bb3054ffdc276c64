use async_trait::async_trait;

use crate::app::ports::DatasetSource;
use crate::common::error::Result;
use crate::common::types::{
    AppealOutcome, Decision, EnforcementRow, PolicyCategory, RawRecord, UserResponse,
};
use crate::pipeline::banding::Banding;
use crate::pipeline::derivation::{det_ts, est_cost_cents, est_latency_ms, round3};

pub mod normalizers;
pub mod registry;

/// Everything a mapper needs besides its own flags
pub struct MapContext<'a> {
    pub source: &'a dyn DatasetSource,
    pub bands: Banding,
    pub page_size: usize,
    pub window_days: u32,
}

/// Per-source transformation from a dataset's native records to enforcement rows
#[async_trait]
pub trait SourceMapper: Send + Sync {
    /// Stable identifier used in logs and summaries
    fn source_id(&self) -> &str;

    fn name(&self) -> &str;

    /// Emit at most `max_rows` rows, fewer if the dataset runs out first
    async fn map(&self, ctx: &MapContext<'_>, max_rows: usize) -> Result<Vec<EnforcementRow>>;
}

/// How a source decides whether a blocked row gets disputed and overturned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppealSignal {
    /// The source carries no appeal simulation
    NotSimulated,
    Simulated { dispute: bool, overturn: bool },
}

/// Only blocked rows can be disputed or appealed; everything else is none/none
pub fn simulate_appeal(decision: Decision, signal: AppealSignal) -> (UserResponse, AppealOutcome) {
    match (decision, signal) {
        (Decision::Block, AppealSignal::Simulated { dispute, overturn }) => (
            if dispute {
                UserResponse::Dispute
            } else {
                UserResponse::None
            },
            if overturn {
                AppealOutcome::Overturned
            } else {
                AppealOutcome::Upheld
            },
        ),
        _ => (UserResponse::None, AppealOutcome::None),
    }
}

/// Source-specific facts about one record, before banding and ops derivation
#[derive(Debug, Clone)]
pub struct RowSeed<'a> {
    pub id_prefix: &'a str,
    /// 1-based position within the source
    pub seq: usize,
    pub ts_index: u64,
    pub category: PolicyCategory,
    pub confidence: f64,
    pub rationale: String,
    pub language: String,
    pub text: &'a str,
    pub appeal: AppealSignal,
}

impl RowSeed<'_> {
    /// Band the raw confidence, derive ops fields, and assemble the row.
    ///
    /// The decision uses the unrounded confidence; the row reports it rounded to
    /// three decimals. A row can therefore show `0.85` next to `suggest` when the
    /// raw score sits just under the block threshold (0.8496, say).
    pub fn into_row(self, bands: &Banding, window_days: u32) -> EnforcementRow {
        let decision = bands.decide(self.confidence);
        let (user_response, appeal_outcome) = simulate_appeal(decision, self.appeal);
        EnforcementRow {
            id: format!("{}_{}", self.id_prefix, self.seq),
            ts: det_ts(self.ts_index, window_days),
            policy_category: self.category,
            confidence: round3(self.confidence),
            decision,
            rationale: self.rationale,
            slice: self.language.to_uppercase(),
            language: self.language,
            latency_ms: est_latency_ms(self.text),
            cost_cents: est_cost_cents(self.text),
            user_response,
            appeal_outcome,
        }
    }
}

/// Field helpers shared by the mappers
pub struct MapperUtils;

impl MapperUtils {
    /// First non-empty string among `keys`
    pub fn first_str<'r>(record: &'r RawRecord, keys: &[&str]) -> Option<&'r str> {
        keys.iter()
            .filter_map(|k| record.get(*k).and_then(|v| v.as_str()))
            .find(|s| !s.is_empty())
    }

    /// Numeric field, accepting numbers and numeric strings; anything else is `default`
    pub fn metric(record: &RawRecord, key: &str, default: f64) -> f64 {
        match record.get(key) {
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(default),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simulate_appeal_only_for_blocks() {
        let signal = AppealSignal::Simulated { dispute: true, overturn: true };
        assert_eq!(
            simulate_appeal(Decision::Block, signal),
            (UserResponse::Dispute, AppealOutcome::Overturned)
        );
        assert_eq!(
            simulate_appeal(Decision::Suggest, signal),
            (UserResponse::None, AppealOutcome::None)
        );
        assert_eq!(
            simulate_appeal(Decision::Allow, signal),
            (UserResponse::None, AppealOutcome::None)
        );
        assert_eq!(
            simulate_appeal(
                Decision::Block,
                AppealSignal::Simulated { dispute: false, overturn: false }
            ),
            (UserResponse::None, AppealOutcome::Upheld)
        );
        assert_eq!(
            simulate_appeal(Decision::Block, AppealSignal::NotSimulated),
            (UserResponse::None, AppealOutcome::None)
        );
    }

    #[test]
    fn test_row_seed_into_row() {
        let row = RowSeed {
            id_prefix: "he",
            seq: 1,
            ts_index: 3001,
            category: PolicyCategory::HateSpeech,
            confidence: 0.9,
            rationale: "hateval: HS".to_string(),
            language: "es".to_string(),
            text: "uno dos tres",
            appeal: AppealSignal::Simulated { dispute: false, overturn: false },
        }
        .into_row(&Banding::default(), 7);

        assert_eq!(row.id, "he_1");
        assert_eq!(row.ts, "2025-08-07T14:20:00Z");
        assert_eq!(row.slice, "ES");
        assert_eq!(row.language, "es");
        assert_eq!(row.decision, Decision::Block);
        assert_eq!(row.latency_ms, 130);
        assert_eq!(row.cost_cents, 1);
        assert_eq!(row.appeal_outcome, AppealOutcome::Upheld);
    }

    #[test]
    fn test_decision_uses_unrounded_confidence() {
        let row = RowSeed {
            id_prefix: "rtp",
            seq: 1,
            ts_index: 4000,
            category: PolicyCategory::HateSpeech,
            confidence: 0.8496,
            rationale: "rtp: identity attack".to_string(),
            language: "en".to_string(),
            text: "x",
            appeal: AppealSignal::Simulated { dispute: false, overturn: false },
        }
        .into_row(&Banding::default(), 7);

        assert_eq!(row.confidence, 0.85);
        assert_eq!(row.decision, Decision::Suggest);
        assert_eq!(row.appeal_outcome, AppealOutcome::None);
    }

    #[test]
    fn test_metric_parsing() {
        let record = json!({"a": 0.5, "b": "0.25", "c": null, "d": "n/a"});
        assert_eq!(MapperUtils::metric(&record, "a", 0.0), 0.5);
        assert_eq!(MapperUtils::metric(&record, "b", 0.0), 0.25);
        assert_eq!(MapperUtils::metric(&record, "c", 0.0), 0.0);
        assert_eq!(MapperUtils::metric(&record, "d", 0.0), 0.0);
        assert_eq!(MapperUtils::metric(&record, "missing", 0.0), 0.0);
    }

    #[test]
    fn test_first_str_skips_empty() {
        let record = json!({"text": "", "tweet": "hola"});
        assert_eq!(MapperUtils::first_str(&record, &["text", "tweet"]), Some("hola"));
        assert_eq!(MapperUtils::first_str(&record, &["nope"]), None);
    }
}
