//! Convert stage.
//!
//! Converts sent artifacts and moves each converter result into the
//! destination directory, named by the artifact's short code.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    CONVERT_STAGE, SEND_STAGE, StageSummary, Upstream, blocking, handle_item_failure,
    observe_upstream, settle,
};
use crate::config::{ItemFailurePolicy, PipelineSettings, UpstreamFailurePolicy};
use crate::pipeline::claim::{ClaimRegistry, ClaimSet};
use crate::pipeline::error::StageError;
use crate::pipeline::item::{ItemId, ScanError, WorkItem, pending_items};
use crate::pipeline::layout::PipelineLayout;
use crate::pipeline::marker;
use crate::pipeline::properties::RegionProperties;
use crate::pipeline::signal::{StageReporter, StageWatch};
use crate::pipeline::version;
use crate::tool::{ConvertJob, ConvertTool};
use crate::util;

pub struct ConvertStage<C> {
    tool: Arc<C>,
    layout: PipelineLayout,
    upstream: StageWatch,
    claims: Arc<dyn ClaimSet>,
    suffix: String,
    poll: Duration,
    on_item_failure: ItemFailurePolicy,
    on_upstream_failure: UpstreamFailurePolicy,
    parked: BTreeSet<ItemId>,
}

impl<C: ConvertTool> ConvertStage<C> {
    pub fn new(
        tool: Arc<C>,
        layout: PipelineLayout,
        upstream: StageWatch,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            tool,
            layout,
            upstream,
            claims: Arc::new(ClaimRegistry::new()),
            suffix: settings.artifact_suffix.clone(),
            poll: settings.convert_poll(),
            on_item_failure: settings.on_item_failure,
            on_upstream_failure: settings.on_upstream_failure,
            parked: BTreeSet::new(),
        }
    }

    /// Share a claim registry with other convert workers.
    pub fn with_claims(mut self, claims: Arc<dyn ClaimSet>) -> Self {
        self.claims = claims;
        self
    }

    pub async fn run(mut self, reporter: StageReporter) -> Result<StageSummary, StageError> {
        let result = self.convert_all(&reporter).await;
        settle(reporter, result)
    }

    async fn convert_all(&mut self, reporter: &StageReporter) -> Result<StageSummary, StageError> {
        loop {
            let upstream = observe_upstream(&self.upstream, SEND_STAGE, self.on_upstream_failure)?;

            let next = match self.select_next() {
                Ok(next) => next,
                Err(e) => {
                    warn!(error = %e, "Scan of sent artifacts failed, retrying");
                    self.upstream.wait(self.poll).await;
                    continue;
                }
            };

            match next {
                Some(item) => {
                    let result = self.convert_item(&item).await;
                    self.claims.release(item.id());
                    match result {
                        Ok(()) => reporter.item_completed(),
                        Err(e) => {
                            handle_item_failure(self.on_item_failure, &mut self.parked, item.id(), e)?
                        }
                    }
                }
                None if upstream == Upstream::Settled => break,
                None => {
                    let state = self.upstream.state();
                    debug!(
                        upstream = %state.phase,
                        upstream_completed = state.completed,
                        "Nothing to convert yet, waiting"
                    );
                    self.upstream.wait(self.poll).await;
                }
            }
        }

        Ok(StageSummary::new(CONVERT_STAGE, reporter.completed(), &self.parked))
    }

    /// Claim the first sent artifact that is ready for conversion.
    ///
    /// Skips artifacts that are marked, parked, claimed, or whose short code
    /// is not among the region's sub-regions. The returned item stays claimed
    /// until the caller releases it.
    pub fn select_next(&self) -> Result<Option<WorkItem>, ScanError> {
        let mut region_properties: HashMap<String, Option<RegionProperties>> = HashMap::new();

        for item in pending_items(&self.layout.sent(), &self.suffix)? {
            if self.parked.contains(item.id()) || self.claims.is_claimed(item.id()) {
                continue;
            }

            // Missing properties fail later, with the error attached to the item
            let properties = region_properties
                .entry(item.region().to_string())
                .or_insert_with(|| RegionProperties::load(item.region_dir()).ok());
            if let Some(properties) = properties
                && !properties.accepts_code(item.short_code())
            {
                debug!(item = %item, "Not a configured sub-region, leaving it");
                continue;
            }

            if self.claims.try_claim(item.id()) {
                return Ok(Some(item));
            }
        }

        Ok(None)
    }

    async fn convert_item(&self, item: &WorkItem) -> Result<(), StageError> {
        let properties = RegionProperties::load(item.region_dir())?;
        let artifact = item.path().to_path_buf();
        let found = blocking(move || {
            version::find_version(&artifact).map_err(|e| StageError::io(&artifact, e))
        })
        .await?;
        let version = match found {
            Some(version) => version,
            None => {
                warn!(
                    item = %item,
                    version = %properties.version,
                    "No version found in artifact, using the region version"
                );
                properties.version.clone()
            }
        };

        let job = ConvertJob {
            region: properties.name.clone(),
            zone: item.short_code().to_string(),
            version,
            branch_and_version: properties.branch_and_version(),
        };
        info!(item = %item, zone = %job.zone, version = %job.version, "Converting artifact");

        let result = self.tool.convert(&job).await;
        self.claims.release(item.id());
        result.map_err(|e| StageError::tool(item.id(), e))?;

        let output = self.tool.output_path(&job);
        if !output.exists() {
            return Err(StageError::MissingOutput(output));
        }
        let target = self.layout.destination().join(&job.zone);
        blocking({
            let target = target.clone();
            move || util::move_path(&output, &target).map_err(|e| StageError::io(&target, e))
        })
        .await?;

        marker::mark_done(item.path())
            .map_err(|e| StageError::io(marker::marker_path(item.path()), e))?;
        info!(item = %item, target = %target.display(), "Artifact converted");
        Ok(())
    }
}
