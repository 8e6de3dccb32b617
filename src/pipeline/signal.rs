//! Stage status signalling.
//!
//! Every stage owns a [`StageReporter`] and hands out [`StageWatch`]es to the
//! stages downstream of it. The reporter is the only writer; watches see its
//! updates through a `tokio::sync::watch` channel, which also lets a waiting
//! downstream stage wake as soon as new work is reported instead of sleeping
//! out its full backoff.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    Running,
    Finished,
    Failed,
}

impl StagePhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StagePhase::Running)
    }
}

impl fmt::Display for StagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagePhase::Running => write!(f, "running"),
            StagePhase::Finished => write!(f, "finished"),
            StagePhase::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a stage as seen by its consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageState {
    pub phase: StagePhase,
    /// Items this stage has marked done in the current run
    pub completed: u64,
}

impl StageState {
    fn running() -> Self {
        Self {
            phase: StagePhase::Running,
            completed: 0,
        }
    }
}

/// Create the signal pair for one stage.
pub fn stage_signal(stage: &'static str) -> (StageReporter, StageWatch) {
    let (tx, rx) = watch::channel(StageState::running());
    (StageReporter { stage, tx }, StageWatch { rx })
}

// =============================================================================
// Writer
// =============================================================================

/// Write side of a stage's status.
///
/// Dropping a reporter that never published a terminal phase publishes
/// [`StagePhase::Failed`], so consumers are released even if the stage
/// panics or returns early.
pub struct StageReporter {
    stage: &'static str,
    tx: watch::Sender<StageState>,
}

impl StageReporter {
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn item_completed(&self) {
        self.tx.send_modify(|state| state.completed += 1);
    }

    pub fn completed(&self) -> u64 {
        self.tx.borrow().completed
    }

    /// Another watch on this stage.
    #[allow(dead_code)]
    pub fn watch(&self) -> StageWatch {
        StageWatch {
            rx: self.tx.subscribe(),
        }
    }

    pub fn finish(self) {
        self.publish(StagePhase::Finished);
    }

    pub fn fail(self) {
        self.publish(StagePhase::Failed);
    }

    fn publish(&self, phase: StagePhase) {
        // Terminal phases are final
        self.tx.send_if_modified(|state| {
            if state.phase.is_terminal() {
                return false;
            }
            state.phase = phase;
            true
        });
    }
}

impl Drop for StageReporter {
    fn drop(&mut self) {
        if !self.tx.borrow().phase.is_terminal() {
            warn!(stage = self.stage, "Stage exited without reporting completion");
            self.publish(StagePhase::Failed);
        }
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Read side of a stage's status.
#[derive(Debug, Clone)]
pub struct StageWatch {
    rx: watch::Receiver<StageState>,
}

impl StageWatch {
    pub fn state(&self) -> StageState {
        *self.rx.borrow()
    }

    pub fn phase(&self) -> StagePhase {
        self.rx.borrow().phase
    }

    /// Wait until the stage publishes an update or `timeout` elapses.
    pub async fn wait(&mut self, timeout: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {}
            changed = self.rx.changed() => {
                if changed.is_err() {
                    // Writer is gone; its final state is still readable
                    tokio::time::sleep(timeout).await;
                }
            }
        }
    }

    /// A watch on a stage that has already finished.
    #[cfg(test)]
    pub fn finished() -> Self {
        let (reporter, watch) = stage_signal("upstream");
        reporter.finish();
        watch
    }
}
