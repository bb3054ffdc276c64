//! Run-level KPIs over the emitted rows, the same figures the review dashboard
//! shows for a loaded dataset.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::common::error::Result;
use crate::common::types::{AppealOutcome, Decision, EnforcementRow, PolicyCategory};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionCounts {
    pub allow: usize,
    pub suggest: usize,
    pub block: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub decisions: DecisionCounts,
    pub block_rate: f64,
    /// Overturned appeals over all rows
    pub over_refusal_rate: f64,
    /// Upheld appeals over all appealed rows; 0 when nothing was appealed
    pub appeals_upheld_rate: f64,
    pub p95_latency_ms: u32,
    pub avg_cost_dollars: f64,
    /// Largest gap between per-slice block rates
    pub worst_slice_disparity: f64,
    pub per_source: BTreeMap<String, usize>,
    pub per_category: BTreeMap<String, usize>,
    pub per_slice_block_rate: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_sha256: Option<String>,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Id prefix before the first underscore, e.g. `hx` for `hx_12`
fn id_prefix(id: &str) -> &str {
    id.split('_').next().unwrap_or(id)
}

/// Latency at index `floor(0.95 * (n - 1))` of the sorted values
pub fn p95_latency(rows: &[EnforcementRow]) -> u32 {
    let mut latencies: Vec<u32> = rows.iter().map(|r| r.latency_ms).collect();
    if latencies.is_empty() {
        return 0;
    }
    latencies.sort_unstable();
    let idx = (0.95 * (latencies.len() - 1) as f64).floor() as usize;
    latencies[idx]
}

impl RunSummary {
    pub fn from_rows(rows: &[EnforcementRow]) -> Self {
        let total = rows.len();
        let mut decisions = DecisionCounts::default();
        let mut overturned = 0;
        let mut upheld = 0;
        let mut cost_cents: u64 = 0;
        let mut per_source = BTreeMap::new();
        let mut per_category: BTreeMap<String, usize> = PolicyCategory::ALL
            .iter()
            .map(|c| (c.as_str().to_string(), 0))
            .collect();
        let mut slices: BTreeMap<String, (usize, usize)> = BTreeMap::new();

        for row in rows {
            match row.decision {
                Decision::Allow => decisions.allow += 1,
                Decision::Suggest => decisions.suggest += 1,
                Decision::Block => decisions.block += 1,
            }
            match row.appeal_outcome {
                AppealOutcome::Overturned => overturned += 1,
                AppealOutcome::Upheld => upheld += 1,
                AppealOutcome::None => {}
            }
            cost_cents += u64::from(row.cost_cents);
            *per_source.entry(id_prefix(&row.id).to_string()).or_insert(0) += 1;
            *per_category
                .entry(row.policy_category.as_str().to_string())
                .or_insert(0) += 1;
            let slice = slices.entry(row.slice.clone()).or_insert((0, 0));
            slice.0 += 1;
            if row.decision == Decision::Block {
                slice.1 += 1;
            }
        }

        let per_slice_block_rate: BTreeMap<String, f64> = slices
            .into_iter()
            .map(|(slice, (n, blocks))| (slice, ratio(blocks, n)))
            .collect();
        let worst_slice_disparity = if per_slice_block_rate.is_empty() {
            0.0
        } else {
            let max = per_slice_block_rate.values().cloned().fold(f64::MIN, f64::max);
            let min = per_slice_block_rate.values().cloned().fold(f64::MAX, f64::min);
            max - min
        };

        Self {
            total,
            block_rate: ratio(decisions.block, total),
            over_refusal_rate: ratio(overturned, total),
            appeals_upheld_rate: ratio(upheld, upheld + overturned),
            p95_latency_ms: p95_latency(rows),
            avg_cost_dollars: if total == 0 {
                0.0
            } else {
                cost_cents as f64 / total as f64 / 100.0
            },
            worst_slice_disparity,
            decisions,
            per_source,
            per_category,
            per_slice_block_rate,
            output_sha256: None,
        }
    }

    pub fn with_output_digest(mut self, sha256: impl Into<String>) -> Self {
        self.output_sha256 = Some(sha256.into());
        self
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Console lines in the same register as the pipeline progress output
    pub fn print(&self) {
        println!("📊 Run summary");
        println!(
            "   rows: {} (allow {}, suggest {}, block {})",
            self.total, self.decisions.allow, self.decisions.suggest, self.decisions.block
        );
        println!("   block rate: {:.1}%", self.block_rate * 100.0);
        println!("   over-refusal rate: {:.1}%", self.over_refusal_rate * 100.0);
        println!("   appeals upheld: {:.1}%", self.appeals_upheld_rate * 100.0);
        println!("   p95 latency: {} ms", self.p95_latency_ms);
        println!("   avg cost: ${:.4}", self.avg_cost_dollars);
        println!(
            "   worst slice disparity: {:.1} pts",
            self.worst_slice_disparity * 100.0
        );
        if let Some(digest) = &self.output_sha256 {
            println!("   sha256: {}", digest);
        }
    }
}
