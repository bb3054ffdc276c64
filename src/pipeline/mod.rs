// Enforcement dataset pipeline: fetch, map, band, aggregate, write

pub mod banding;
pub mod derivation;
pub mod normalize;
pub mod output;
pub mod pager;
pub mod summary;

use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{info, instrument};

use crate::app::ports::DatasetSource;
use crate::common::constants::{
    DEFAULT_MAX_ROWS, DEFAULT_PAGE_SIZE, DEFAULT_WINDOW_DAYS, HATEVAL_SOURCE, HATEXPLAIN_SOURCE,
    HH_RLHF_SOURCE, REAL_TOXICITY_SOURCE,
};
use crate::common::error::Result;
use crate::common::types::EnforcementRow;
use banding::Banding;
use normalize::registry::MapperRegistry;
use normalize::MapContext;

/// Per-source row caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowCaps {
    pub hatexplain: usize,
    pub hateval: usize,
    pub hh_rlhf: usize,
    pub real_toxicity: usize,
}

impl RowCaps {
    pub const fn uniform(max_rows: usize) -> Self {
        Self {
            hatexplain: max_rows,
            hateval: max_rows,
            hh_rlhf: max_rows,
            real_toxicity: max_rows,
        }
    }

    /// Cap for a source id; sources outside the standard four get the default
    pub fn for_source(&self, source_id: &str) -> usize {
        match source_id {
            HATEXPLAIN_SOURCE => self.hatexplain,
            HATEVAL_SOURCE => self.hateval,
            HH_RLHF_SOURCE => self.hh_rlhf,
            REAL_TOXICITY_SOURCE => self.real_toxicity,
            _ => DEFAULT_MAX_ROWS,
        }
    }
}

impl Default for RowCaps {
    fn default() -> Self {
        Self::uniform(DEFAULT_MAX_ROWS)
    }
}

/// Rows one mapper contributed
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    pub rows: usize,
    pub duration_secs: f64,
}

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct PipelineResult {
    pub rows: Vec<EnforcementRow>,
    pub sources: Vec<SourceReport>,
    pub duration_secs: f64,
}

/// Runs every registered mapper in order against one dataset source
pub struct Pipeline {
    registry: MapperRegistry,
    caps: RowCaps,
    bands: Banding,
    window_days: u32,
    page_size: usize,
}

impl Pipeline {
    pub fn new(registry: MapperRegistry) -> Self {
        Self {
            registry,
            caps: RowCaps::default(),
            bands: Banding::default(),
            window_days: DEFAULT_WINDOW_DAYS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_caps(mut self, caps: RowCaps) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_bands(mut self, bands: Banding) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_window_days(mut self, window_days: u32) -> Self {
        self.window_days = window_days;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Map every source sequentially and concatenate the rows in registry order.
    ///
    /// Any mapper error aborts the run; HatEval handles its own fallback before
    /// an error gets here.
    #[instrument(skip(self, source), fields(dataset_source = source.name()))]
    pub async fn run(&self, source: &dyn DatasetSource) -> Result<PipelineResult> {
        let t_run = Instant::now();
        let ctx = MapContext {
            source,
            bands: self.bands,
            page_size: self.page_size,
            window_days: self.window_days,
        };

        info!(
            high = self.bands.high,
            medium = self.bands.medium,
            window_days = self.window_days,
            "🚀 Starting enforcement pipeline"
        );

        let mut rows = Vec::new();
        let mut sources = Vec::new();
        for mapper in self.registry.mappers() {
            let source_id = mapper.source_id().to_string();
            let cap = self.caps.for_source(&source_id);
            println!("📡 Mapping {} (max {} rows)...", mapper.name(), cap);

            let t_mapper = Instant::now();
            let mut mapped = mapper.map(&ctx, cap).await?;
            let secs = t_mapper.elapsed().as_secs_f64();

            for row in &mut mapped {
                row.clamp_confidence();
            }
            counter!("enforcement_rows_emitted_total", "source" => source_id.clone())
                .increment(mapped.len() as u64);
            histogram!("enforcement_mapper_duration_seconds", "source" => source_id.clone())
                .record(secs);
            info!(source = %source_id, rows = mapped.len(), "✅ Mapped source");
            println!("   {}: {} rows", mapper.name(), mapped.len());

            sources.push(SourceReport {
                source_id,
                rows: mapped.len(),
                duration_secs: secs,
            });
            rows.append(&mut mapped);
        }

        let duration_secs = t_run.elapsed().as_secs_f64();
        info!(total_rows = rows.len(), duration_secs, "🎉 Pipeline completed");
        Ok(PipelineResult {
            rows,
            sources,
            duration_secs,
        })
    }
}
