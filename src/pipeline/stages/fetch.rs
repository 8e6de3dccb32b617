//! Fetch stage.
//!
//! Fetches each configured region, in order, into `fetched/<REGION>/`.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use super::{FETCH_STAGE, StageSummary, handle_item_failure, settle};
use crate::config::{ItemFailurePolicy, PipelineSettings};
use crate::pipeline::error::StageError;
use crate::pipeline::layout::PipelineLayout;
use crate::pipeline::marker;
use crate::pipeline::properties::RegionProperties;
use crate::pipeline::signal::StageReporter;
use crate::region::RegionDescriptor;
use crate::tool::{ZoneMode, ZoneRequest, ZoneTool};

pub struct FetchStage<Z> {
    tool: Arc<Z>,
    regions: Vec<RegionDescriptor>,
    layout: PipelineLayout,
    on_item_failure: ItemFailurePolicy,
}

impl<Z: ZoneTool> FetchStage<Z> {
    pub fn new(
        tool: Arc<Z>,
        regions: Vec<RegionDescriptor>,
        layout: PipelineLayout,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            tool,
            regions,
            layout,
            on_item_failure: settings.on_item_failure,
        }
    }

    pub async fn run(self, reporter: StageReporter) -> Result<StageSummary, StageError> {
        let result = self.fetch_all(&reporter).await;
        settle(reporter, result)
    }

    async fn fetch_all(&self, reporter: &StageReporter) -> Result<StageSummary, StageError> {
        let mut parked = BTreeSet::new();

        for region in &self.regions {
            match self.fetch_region(region).await {
                Ok(true) => reporter.item_completed(),
                Ok(false) => {}
                Err(e) => handle_item_failure(
                    self.on_item_failure,
                    &mut parked,
                    &region.name().to_string(),
                    e,
                )?,
            }
        }

        Ok(StageSummary::new(FETCH_STAGE, reporter.completed(), &parked))
    }

    /// Fetch one region. Returns `false` if it was fetched by an earlier run.
    async fn fetch_region(&self, region: &RegionDescriptor) -> Result<bool, StageError> {
        let fetch_item = self.layout.fetch_item(region.name());
        if marker::is_done(&fetch_item) {
            info!(region = region.name(), "Region already fetched, skipping");
            return Ok(false);
        }

        let dir = self.layout.fetched_region(region.name());
        std::fs::create_dir_all(&dir).map_err(|e| StageError::io(&dir, e))?;
        RegionProperties::from(region).store(&dir)?;

        info!(
            region = region.name(),
            version = region.version(),
            "Fetching region"
        );
        let request = ZoneRequest {
            mode: ZoneMode::Fetch,
            region: region.name().to_string(),
            version: region.version().to_string(),
            branch_and_version: region.branch_and_version(),
            output_dir: dir,
        };
        self.tool
            .run(&request)
            .await
            .map_err(|e| StageError::tool(region.name(), e))?;

        marker::mark_done(&fetch_item)
            .map_err(|e| StageError::io(marker::marker_path(&fetch_item), e))?;
        info!(region = region.name(), "Region fetched");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::pipeline::signal::{StagePhase, stage_signal};
    use crate::pipeline::testing::{BRANCH, FakeZoneTool, region};

    fn regions() -> Vec<RegionDescriptor> {
        vec![
            region(&format!("EUR;2.0;{BRANCH}:5;EU_;")),
            region(&format!("RWR;13.10;{BRANCH}:1000000;AS_,EU_;")),
        ]
    }

    fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| {
                let path = e.unwrap().path();
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                (name, std::fs::read(&path).unwrap())
            })
            .collect();
        entries.sort();
        entries
    }

    #[tokio::test]
    async fn test_fetch_writes_properties_artifacts_and_markers() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PipelineLayout::with_default_destination(dir.path().to_path_buf());
        let tool = Arc::new(
            FakeZoneTool::new()
                .with_artifacts("EUR", &["EU_.json"])
                .with_artifacts("RWR", &["AS_.json"]),
        );
        let (reporter, watch) = stage_signal(FETCH_STAGE);

        let stage = FetchStage::new(
            tool.clone(),
            regions(),
            layout.clone(),
            &PipelineSettings::default(),
        );
        let summary = stage.run(reporter).await.unwrap();

        assert_eq!(summary.completed, 2);
        assert_eq!(watch.state().phase, StagePhase::Finished);
        assert_eq!(watch.state().completed, 2);

        let rwr = layout.fetched_region("RWR");
        assert!(rwr.join("AS_.json").exists());
        assert!(rwr.join("$RWR.properties").exists());
        assert!(marker::is_done(&layout.fetch_item("RWR")));
        assert!(marker::is_done(&layout.fetch_item("EUR")));

        let requests = tool.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].region, "EUR");
        assert_eq!(requests[1].mode, ZoneMode::Fetch);
        assert_eq!(requests[1].output_dir, rwr);
        assert_eq!(
            requests[1].branch_and_version,
            format!("{BRANCH}:1000000")
        );
    }

    #[tokio::test]
    async fn test_fetch_skips_marked_region() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PipelineLayout::with_default_destination(dir.path().to_path_buf());
        let region_dir = layout.fetched_region("RWR");
        std::fs::create_dir_all(&region_dir).unwrap();
        std::fs::write(region_dir.join("AS_.json"), "{}").unwrap();
        marker::mark_done(&layout.fetch_item("RWR")).unwrap();
        let before = snapshot(&region_dir);

        let tool = Arc::new(FakeZoneTool::new().with_artifacts("RWR", &["AS_.json"]));
        let (reporter, _watch) = stage_signal(FETCH_STAGE);
        let stage = FetchStage::new(
            tool.clone(),
            vec![region(&format!("RWR;13.10;{BRANCH}:1000000;"))],
            layout,
            &PipelineSettings::default(),
        );
        let summary = stage.run(reporter).await.unwrap();

        assert_eq!(summary.completed, 0);
        assert!(tool.requests().is_empty());
        assert_eq!(snapshot(&region_dir), before);
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PipelineLayout::with_default_destination(dir.path().to_path_buf());
        let tool = Arc::new(FakeZoneTool::new().failing_for("EUR"));
        let (reporter, watch) = stage_signal(FETCH_STAGE);

        let stage = FetchStage::new(
            tool.clone(),
            regions(),
            layout.clone(),
            &PipelineSettings::default(),
        );
        let err = stage.run(reporter).await.unwrap_err();

        assert!(matches!(err, StageError::Tool { .. }));
        assert_eq!(watch.phase(), StagePhase::Failed);
        assert_eq!(tool.requests().len(), 1);
        assert!(!marker::is_done(&layout.fetch_item("EUR")));
    }

    #[tokio::test]
    async fn test_fetch_failure_skip_continues() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PipelineLayout::with_default_destination(dir.path().to_path_buf());
        let tool = Arc::new(FakeZoneTool::new().failing_for("EUR"));
        let settings = PipelineSettings {
            on_item_failure: ItemFailurePolicy::Skip,
            ..PipelineSettings::default()
        };
        let (reporter, watch) = stage_signal(FETCH_STAGE);

        let stage = FetchStage::new(tool.clone(), regions(), layout.clone(), &settings);
        let summary = stage.run(reporter).await.unwrap();

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.parked, vec!["EUR".to_string()]);
        assert_eq!(watch.phase(), StagePhase::Finished);
        assert!(marker::is_done(&layout.fetch_item("RWR")));
        assert!(!marker::is_done(&layout.fetch_item("EUR")));
    }
}
