//! Send stage.
//!
//! Sends fetched artifacts one at a time through a single staging slot and
//! moves each accepted artifact to `sent/<REGION>/`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    FETCH_STAGE, SEND_STAGE, StageSummary, Upstream, blocking, handle_item_failure,
    observe_upstream, settle,
};
use crate::config::{ItemFailurePolicy, PipelineSettings, UpstreamFailurePolicy};
use crate::pipeline::error::StageError;
use crate::pipeline::item::{ItemId, ScanError, WorkItem, pending_items};
use crate::pipeline::layout::PipelineLayout;
use crate::pipeline::marker;
use crate::pipeline::properties::RegionProperties;
use crate::pipeline::signal::{StageReporter, StageWatch};
use crate::pipeline::version;
use crate::tool::{ZoneMode, ZoneRequest, ZoneTool};
use crate::util;

pub struct SendStage<Z> {
    tool: Arc<Z>,
    layout: PipelineLayout,
    upstream: StageWatch,
    suffix: String,
    version_prefix: Option<String>,
    poll: Duration,
    on_item_failure: ItemFailurePolicy,
    on_upstream_failure: UpstreamFailurePolicy,
    parked: BTreeSet<ItemId>,
}

impl<Z: ZoneTool> SendStage<Z> {
    pub fn new(
        tool: Arc<Z>,
        layout: PipelineLayout,
        upstream: StageWatch,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            tool,
            layout,
            upstream,
            suffix: settings.artifact_suffix.clone(),
            version_prefix: settings.version_prefix.clone(),
            poll: settings.send_poll(),
            on_item_failure: settings.on_item_failure,
            on_upstream_failure: settings.on_upstream_failure,
            parked: BTreeSet::new(),
        }
    }

    pub async fn run(mut self, reporter: StageReporter) -> Result<StageSummary, StageError> {
        let result = self.send_all(&reporter).await;
        settle(reporter, result)
    }

    async fn send_all(&mut self, reporter: &StageReporter) -> Result<StageSummary, StageError> {
        loop {
            // Snapshot before scanning: anything fetched before a terminal
            // phase was published is visible to the scan that follows
            let upstream = observe_upstream(&self.upstream, FETCH_STAGE, self.on_upstream_failure)?;

            let next = match self.next_item() {
                Ok(next) => next,
                Err(e) => {
                    warn!(error = %e, "Scan of fetched artifacts failed, retrying");
                    self.upstream.wait(self.poll).await;
                    continue;
                }
            };

            match next {
                Some(item) => match self.send_item(&item).await {
                    Ok(()) => reporter.item_completed(),
                    Err(e) => {
                        handle_item_failure(self.on_item_failure, &mut self.parked, item.id(), e)?
                    }
                },
                None if upstream == Upstream::Settled => break,
                None => {
                    let state = self.upstream.state();
                    debug!(
                        upstream = %state.phase,
                        upstream_completed = state.completed,
                        "Nothing to send yet, waiting"
                    );
                    self.upstream.wait(self.poll).await;
                }
            }
        }

        Ok(StageSummary::new(SEND_STAGE, reporter.completed(), &self.parked))
    }

    /// First unsent artifact of a fully fetched region.
    fn next_item(&self) -> Result<Option<WorkItem>, ScanError> {
        let candidates = pending_items(&self.layout.fetched(), &self.suffix)?;
        Ok(candidates.into_iter().find(|item| {
            !self.parked.contains(item.id())
                && marker::is_done(&self.layout.fetch_item(item.region()))
        }))
    }

    async fn send_item(&self, item: &WorkItem) -> Result<(), StageError> {
        let properties = RegionProperties::load(item.region_dir())?;
        let staged = self.stage(item).await?;

        info!(item = %item, "Sending artifact");
        let request = ZoneRequest {
            mode: ZoneMode::Send,
            region: properties.name.clone(),
            version: properties.version.clone(),
            branch_and_version: properties.branch_and_version(),
            output_dir: self.layout.staging(),
        };
        self.tool
            .run(&request)
            .await
            .map_err(|e| StageError::tool(item.id(), e))?;

        let sent_dir = self.layout.sent_region(item.region());
        let region_dir = item.region_dir().to_path_buf();
        let target = sent_dir.join(item.file_name());
        blocking({
            let target = target.clone();
            move || {
                std::fs::create_dir_all(&sent_dir).map_err(|e| StageError::io(&sent_dir, e))?;
                // Properties land before the artifact so convert never sees one without the other
                RegionProperties::copy_if_absent(&region_dir, &sent_dir)?;
                util::move_path(&staged, &target).map_err(|e| StageError::io(&target, e))
            }
        })
        .await?;

        marker::mark_done(item.path())
            .map_err(|e| StageError::io(marker::marker_path(item.path()), e))?;
        debug!(item = %item, target = %target.display(), "Artifact sent");
        Ok(())
    }

    /// Place a copy of `item` alone in the staging directory.
    async fn stage(&self, item: &WorkItem) -> Result<PathBuf, StageError> {
        let staging = self.layout.staging();
        let source = item.path().to_path_buf();
        let target = staging.join(item.file_name());
        let prefix = self.version_prefix.clone();

        blocking(move || {
            util::remove_path(&staging).map_err(|e| StageError::io(&staging, e))?;
            std::fs::create_dir_all(&staging).map_err(|e| StageError::io(&staging, e))?;

            match prefix {
                Some(prefix) => {
                    let content =
                        std::fs::read(&source).map_err(|e| StageError::io(&source, e))?;
                    std::fs::write(&target, version::prefix_versions(&content, &prefix))
                        .map_err(|e| StageError::io(&target, e))?;
                }
                None => {
                    std::fs::copy(&source, &target).map_err(|e| StageError::io(&target, e))?;
                }
            }
            Ok(target)
        })
        .await
    }
}
