//! Stage workers.
//!
//! The pipeline runs three workers concurrently:
//!
//! 1. **FetchStage** - Fetch every configured region into `fetched/`
//! 2. **SendStage** - Send fetched artifacts one at a time, moving them to `sent/`
//! 3. **ConvertStage** - Convert sent artifacts into the destination directory
//!
//! Each worker consumes its upstream's tree, publishes progress through its
//! [`StageReporter`], and publishes a terminal phase on every exit path.

mod convert;
mod fetch;
mod send;

use std::collections::BTreeSet;
use std::fmt;

use tracing::{error, info, warn};

pub use convert::ConvertStage;
pub use fetch::FetchStage;
pub use send::SendStage;

use super::error::StageError;
use super::signal::{StagePhase, StageReporter, StageWatch};
use crate::config::{ItemFailurePolicy, UpstreamFailurePolicy};

pub const FETCH_STAGE: &str = "fetch";
pub const SEND_STAGE: &str = "send";
pub const CONVERT_STAGE: &str = "convert";

/// Outcome of a stage worker that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: &'static str,
    /// Items completed in this run
    pub completed: u64,
    /// Items that failed under the skip policy, retried by the next run
    pub parked: Vec<String>,
}

impl StageSummary {
    fn new<K: fmt::Display>(stage: &'static str, completed: u64, parked: &BTreeSet<K>) -> Self {
        Self {
            stage,
            completed,
            parked: parked.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Publish a worker's result on its reporter and hand it back.
fn settle(
    reporter: StageReporter,
    result: Result<StageSummary, StageError>,
) -> Result<StageSummary, StageError> {
    match &result {
        Ok(summary) => {
            info!(
                stage = summary.stage,
                completed = summary.completed,
                parked = summary.parked.len(),
                "Stage finished"
            );
            reporter.finish();
        }
        Err(e) => {
            error!(stage = reporter.stage(), error = %e, "Stage failed");
            reporter.fail();
        }
    }
    result
}

/// Run per-item filesystem work on the blocking pool.
///
/// Artifact copies and whole-file reads can take a while on large zones and
/// must not stall the other stage workers.
async fn blocking<T, F>(work: F) -> Result<T, StageError>
where
    F: FnOnce() -> Result<T, StageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Upstream as seen just before a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upstream {
    /// More work may still appear
    Active,
    /// Nothing new will appear; an empty scan ends the stage
    Settled,
}

fn observe_upstream(
    watch: &StageWatch,
    upstream: &'static str,
    policy: UpstreamFailurePolicy,
) -> Result<Upstream, StageError> {
    match watch.phase() {
        StagePhase::Running => Ok(Upstream::Active),
        StagePhase::Finished => Ok(Upstream::Settled),
        StagePhase::Failed => match policy {
            UpstreamFailurePolicy::Drain => Ok(Upstream::Settled),
            UpstreamFailurePolicy::Halt => Err(StageError::UpstreamFailed(upstream)),
        },
    }
}

/// Apply the item failure policy: stop the stage, or park the item.
fn handle_item_failure<K: Ord + Clone + fmt::Display>(
    policy: ItemFailurePolicy,
    parked: &mut BTreeSet<K>,
    key: &K,
    error: StageError,
) -> Result<(), StageError> {
    match policy {
        ItemFailurePolicy::Stop => Err(error),
        ItemFailurePolicy::Skip => {
            warn!(item = %key, error = %error, "Parking failed item for the rest of this run");
            parked.insert(key.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::signal::stage_signal;
    use crate::tool::ToolError;

    #[test]
    fn test_observe_upstream_policies() {
        let (reporter, watch) = stage_signal("fetch");
        assert_eq!(
            observe_upstream(&watch, "fetch", UpstreamFailurePolicy::Halt).unwrap(),
            Upstream::Active
        );

        reporter.fail();
        assert_eq!(
            observe_upstream(&watch, "fetch", UpstreamFailurePolicy::Drain).unwrap(),
            Upstream::Settled
        );
        assert!(matches!(
            observe_upstream(&watch, "fetch", UpstreamFailurePolicy::Halt),
            Err(StageError::UpstreamFailed("fetch"))
        ));
    }

    #[test]
    fn test_item_failure_policies() {
        let mut parked = BTreeSet::new();
        let failure = || StageError::tool("RWR", ToolError::Failed("boom".to_string()));

        let key = "RWR".to_string();
        assert!(handle_item_failure(ItemFailurePolicy::Stop, &mut parked, &key, failure()).is_err());
        assert!(parked.is_empty());

        handle_item_failure(ItemFailurePolicy::Skip, &mut parked, &key, failure()).unwrap();
        assert!(parked.contains("RWR"));
    }

    #[test]
    fn test_settle_publishes_terminal_phase() {
        let (reporter, watch) = stage_signal("send");
        let result = settle(reporter, Err(StageError::UpstreamFailed("fetch")));
        assert!(result.is_err());
        assert_eq!(watch.phase(), StagePhase::Failed);

        let (reporter, watch) = stage_signal("send");
        let summary = settle(
            reporter,
            Ok(StageSummary::new::<String>("send", 2, &BTreeSet::new())),
        )
        .unwrap();
        assert_eq!(summary.completed, 2);
        assert_eq!(watch.phase(), StagePhase::Finished);
    }
}
