//! Per-region progress read back from the marker files.

use std::collections::BTreeMap;

use super::item::{ScanError, WorkItem, artifacts_in, region_dirs};
use super::layout::PipelineLayout;
use super::marker;
use super::properties::RegionProperties;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionProgress {
    pub region: String,
    /// Whether the fetch tool completed for this region
    pub fetched: bool,
    /// Artifacts in `fetched/<REGION>/`
    pub artifacts: usize,
    pub sent: usize,
    pub converted: usize,
    /// Sent artifacts outside the region's sub-regions, never converted
    pub filtered: usize,
}

impl RegionProgress {
    fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            fetched: false,
            artifacts: 0,
            sent: 0,
            converted: 0,
            filtered: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.fetched && self.sent == self.artifacts && self.converted + self.filtered == self.sent
    }
}

/// Progress of every region found under the layout, sorted by region name.
pub fn progress(layout: &PipelineLayout, suffix: &str) -> Result<Vec<RegionProgress>, ScanError> {
    let mut regions: BTreeMap<String, RegionProgress> = BTreeMap::new();

    for (region, dir) in region_dirs(&layout.fetched())? {
        let artifacts = artifacts_in(&dir, suffix)?;
        let entry = regions
            .entry(region.clone())
            .or_insert_with(|| RegionProgress::new(&region));
        entry.fetched = marker::is_done(&layout.fetch_item(&region));
        entry.artifacts = artifacts.len();
        entry.sent = artifacts.iter().filter(|p| marker::is_done(p)).count();
    }

    for (region, dir) in region_dirs(&layout.sent())? {
        let artifacts = artifacts_in(&dir, suffix)?;
        let entry = regions
            .entry(region.clone())
            .or_insert_with(|| RegionProgress::new(&region));
        entry.converted = artifacts.iter().filter(|p| marker::is_done(p)).count();

        if let Ok(properties) = RegionProperties::load(&dir) {
            entry.filtered = artifacts
                .into_iter()
                .filter(|p| !marker::is_done(p))
                .map(|p| WorkItem::new(region.as_str(), p))
                .filter(|item| !properties.accepts_code(item.short_code()))
                .count();
        }
    }

    Ok(regions.into_values().collect())
}
