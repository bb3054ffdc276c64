use tracing::{debug, warn};

use crate::app::ports::{DatasetRef, DatasetSource};
use crate::common::error::Result;
use crate::common::types::RawRecord;

/// Walks one dataset split page by page through a `DatasetSource`
pub struct RecordPager<'a> {
    source: &'a dyn DatasetSource,
    dataset: DatasetRef,
    offset: usize,
    page_size: usize,
    exhausted: bool,
}

impl<'a> RecordPager<'a> {
    pub fn new(source: &'a dyn DatasetSource, dataset: DatasetRef, page_size: usize) -> Self {
        Self {
            source,
            dataset,
            offset: 0,
            page_size: page_size.max(1),
            exhausted: false,
        }
    }

    /// Next page of records; empty once the split is exhausted
    pub async fn next_page(&mut self) -> Result<Vec<RawRecord>> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let page = self
            .source
            .fetch_rows(&self.dataset, self.offset, self.page_size)
            .await?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        self.offset += page.len();
        Ok(page)
    }

    /// Append records accepted by `keep` until `out` holds `limit` records or the
    /// split runs dry
    pub async fn fill(
        &mut self,
        out: &mut Vec<RawRecord>,
        limit: usize,
        keep: &(dyn Fn(&RawRecord) -> bool + Sync),
    ) -> Result<()> {
        while out.len() < limit {
            let page = self.next_page().await?;
            if page.is_empty() {
                break;
            }
            for record in page {
                if keep(&record) {
                    out.push(record);
                    if out.len() >= limit {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Read up to `limit` records across several splits in order.
///
/// The first split must load; a failure on any later split is logged and that
/// split is treated as absent (some mirrors only publish a single split).
pub async fn collect_from_splits(
    source: &dyn DatasetSource,
    splits: &[DatasetRef],
    page_size: usize,
    limit: usize,
    keep: &(dyn Fn(&RawRecord) -> bool + Sync),
) -> Result<Vec<RawRecord>> {
    let mut records = Vec::new();
    for (position, split) in splits.iter().enumerate() {
        if records.len() >= limit {
            break;
        }
        let mut pager = RecordPager::new(source, split.clone(), page_size);
        match pager.fill(&mut records, limit, keep).await {
            Ok(()) => debug!(dataset = %split, "Collected {} records so far", records.len()),
            Err(e) if position > 0 => {
                warn!(dataset = %split, "Skipping split that failed to load: {}", e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(records)
}
