//! Pipeline orchestration.
//!
//! Wires fetch, send and convert together through their stage signals, runs
//! them as concurrent tasks, and collects a per-stage report.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::task::{Id, JoinSet};
use tracing::{error, info};

use super::claim::{ClaimRegistry, ClaimSet};
use super::error::{PipelineError, StageError};
use super::layout::PipelineLayout;
use super::signal::stage_signal;
use super::stages::{
    CONVERT_STAGE, ConvertStage, FETCH_STAGE, FetchStage, SEND_STAGE, SendStage, StageSummary,
};
use crate::config::PipelineSettings;
use crate::region::RegionDescriptor;
use crate::tool::{ConvertTool, ZoneTool};

const STAGE_ORDER: [&str; 3] = [FETCH_STAGE, SEND_STAGE, CONVERT_STAGE];

/// How one stage worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: &'static str,
    /// Items completed in this run
    pub completed: u64,
    pub parked: Vec<String>,
    /// Why the stage failed, if it did
    pub error: Option<String>,
}

impl StageOutcome {
    fn from_result(stage: &'static str, result: Result<StageSummary, StageError>) -> Self {
        match result {
            Ok(summary) => Self {
                stage,
                completed: summary.completed,
                parked: summary.parked,
                error: None,
            },
            Err(e) => Self::failed(stage, e.to_string()),
        }
    }

    fn failed(stage: &'static str, error: String) -> Self {
        Self {
            stage,
            completed: 0,
            parked: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}: failed ({error})", self.stage),
            None if self.parked.is_empty() => {
                write!(f, "{}: {} completed", self.stage, self.completed)
            }
            None => write!(
                f,
                "{}: {} completed, {} parked ({})",
                self.stage,
                self.completed,
                self.parked.len(),
                self.parked.join(", ")
            ),
        }
    }
}

/// Result of a pipeline run, stages in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub stages: Vec<StageOutcome>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.stages.iter().all(StageOutcome::is_success)
    }

    #[cfg(test)]
    pub fn stage(&self, name: &str) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn failed(&self) -> impl Iterator<Item = &StageOutcome> {
        self.stages.iter().filter(|s| !s.is_success())
    }
}

/// The fetch, send and convert pipeline for one set of regions.
pub struct Pipeline<Z, C> {
    layout: PipelineLayout,
    settings: PipelineSettings,
    regions: Vec<RegionDescriptor>,
    zone_tool: Arc<Z>,
    converter: Arc<C>,
    claims: Arc<dyn ClaimSet>,
}

impl<Z: ZoneTool, C: ConvertTool> Pipeline<Z, C> {
    pub fn new(
        layout: PipelineLayout,
        settings: PipelineSettings,
        regions: Vec<RegionDescriptor>,
        zone_tool: Z,
        converter: C,
    ) -> Self {
        Self {
            layout,
            settings,
            regions,
            zone_tool: Arc::new(zone_tool),
            converter: Arc::new(converter),
            claims: Arc::new(ClaimRegistry::new()),
        }
    }

    /// Run all three stages to completion.
    ///
    /// Stage failures are reported in the [`PipelineReport`]; only a layout
    /// failure or the run timeout produce an error.
    pub async fn run(self) -> Result<PipelineReport, PipelineError> {
        self.layout.create_dirs().map_err(PipelineError::Layout)?;

        info!(
            regions = self.regions.len(),
            output = %self.layout.output().display(),
            destination = %self.layout.destination().display(),
            "Starting pipeline"
        );

        let (fetch_reporter, fetch_watch) = stage_signal(FETCH_STAGE);
        let (send_reporter, send_watch) = stage_signal(SEND_STAGE);
        let (convert_reporter, _) = stage_signal(CONVERT_STAGE);

        let fetch = FetchStage::new(
            self.zone_tool.clone(),
            self.regions,
            self.layout.clone(),
            &self.settings,
        );
        let send = SendStage::new(
            self.zone_tool,
            self.layout.clone(),
            fetch_watch,
            &self.settings,
        );
        let convert = ConvertStage::new(
            self.converter,
            self.layout.clone(),
            send_watch,
            &self.settings,
        )
        .with_claims(self.claims);

        let mut workers = JoinSet::new();
        let mut names: HashMap<Id, &'static str> = HashMap::new();
        names.insert(workers.spawn(fetch.run(fetch_reporter)).id(), FETCH_STAGE);
        names.insert(workers.spawn(send.run(send_reporter)).id(), SEND_STAGE);
        names.insert(workers.spawn(convert.run(convert_reporter)).id(), CONVERT_STAGE);

        let timeout = self.settings.timeout();
        let outcomes = match tokio::time::timeout(timeout, join_all(&mut workers, &names)).await {
            Ok(outcomes) => outcomes,
            Err(_) => {
                error!(timeout = ?timeout, "Pipeline timed out, aborting remaining stages");
                workers.abort_all();
                return Err(PipelineError::Timeout(timeout));
            }
        };

        let report = PipelineReport {
            stages: STAGE_ORDER
                .iter()
                .filter_map(|stage| outcomes.get(stage).cloned())
                .collect(),
        };
        for outcome in &report.stages {
            if outcome.is_success() {
                info!(outcome = %outcome, "Stage outcome");
            } else {
                error!(outcome = %outcome, "Stage outcome");
            }
        }
        Ok(report)
    }
}

async fn join_all(
    workers: &mut JoinSet<Result<StageSummary, StageError>>,
    names: &HashMap<Id, &'static str>,
) -> HashMap<&'static str, StageOutcome> {
    let mut outcomes = HashMap::new();
    while let Some(joined) = workers.join_next_with_id().await {
        let outcome = match joined {
            Ok((id, result)) => {
                let stage = names.get(&id).copied().unwrap_or("unknown");
                StageOutcome::from_result(stage, result)
            }
            Err(e) => {
                let stage = names.get(&e.id()).copied().unwrap_or("unknown");
                error!(stage, error = %e, "Stage task panicked");
                StageOutcome::failed(stage, e.to_string())
            }
        };
        outcomes.insert(outcome.stage, outcome);
    }
    outcomes
}
