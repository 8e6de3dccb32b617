//! In-process stand-ins for the external tools.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::region::RegionDescriptor;
use crate::tool::{ConvertJob, ConvertTool, ToolError, ZoneMode, ZoneRequest, ZoneTool};

pub const BRANCH: &str = "562a90ee-fe27-40ef-ad1a-01463bf45662";

pub fn region(line: &str) -> RegionDescriptor {
    RegionDescriptor::parse(line).unwrap()
}

pub fn artifact_json(version: &str) -> String {
    format!("{{\n  \"version\" : \"{version}\",\n  \"zones\" : []\n}}\n")
}

/// Writes one file per configured artifact on FETCH and records every call.
#[derive(Default)]
pub struct FakeZoneTool {
    artifacts: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    requests: Mutex<Vec<ZoneRequest>>,
}

impl FakeZoneTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifacts(mut self, region: &str, names: &[&str]) -> Self {
        self.artifacts.insert(
            region.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
        self
    }

    pub fn failing_for(mut self, region: &str) -> Self {
        self.failing.insert(region.to_string());
        self
    }

    pub fn requests(&self) -> Vec<ZoneRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self, mode: ZoneMode) -> usize {
        self.requests().iter().filter(|r| r.mode == mode).count()
    }
}

impl ZoneTool for FakeZoneTool {
    async fn run(&self, request: &ZoneRequest) -> Result<(), ToolError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.region) {
            return Err(ToolError::Failed(format!("{} refused", request.region)));
        }
        if request.mode == ZoneMode::Fetch {
            for name in self.artifacts.get(&request.region).into_iter().flatten() {
                std::fs::write(
                    request.output_dir.join(name),
                    artifact_json(&request.version),
                )
                .map_err(|e| ToolError::Failed(e.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Writes `<output_dir>/<zone>/part-00000` holding the job's version.
pub struct FakeConverter {
    output_dir: PathBuf,
    failing: HashSet<String>,
    skip_output: bool,
    jobs: Mutex<Vec<ConvertJob>>,
}

impl FakeConverter {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            failing: HashSet::new(),
            skip_output: false,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_for(mut self, zone: &str) -> Self {
        self.failing.insert(zone.to_string());
        self
    }

    /// Report success without producing anything.
    pub fn without_output(mut self) -> Self {
        self.skip_output = true;
        self
    }

    pub fn jobs(&self) -> Vec<ConvertJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl ConvertTool for FakeConverter {
    async fn convert(&self, job: &ConvertJob) -> Result<(), ToolError> {
        self.jobs.lock().unwrap().push(job.clone());
        if self.failing.contains(&job.zone) {
            return Err(ToolError::ExitStatus {
                program: "hadoop".to_string(),
                code: Some(1),
            });
        }
        if !self.skip_output {
            let dir = self.output_path(job);
            std::fs::create_dir_all(&dir).map_err(|e| ToolError::Failed(e.to_string()))?;
            std::fs::write(dir.join("part-00000"), &job.version)
                .map_err(|e| ToolError::Failed(e.to_string()))?;
        }
        Ok(())
    }

    fn output_path(&self, job: &ConvertJob) -> PathBuf {
        self.output_dir.join(&job.zone)
    }
}

/// A zone tool that never returns.
pub struct HangingZoneTool;

impl ZoneTool for HangingZoneTool {
    async fn run(&self, _request: &ZoneRequest) -> Result<(), ToolError> {
        std::future::pending().await
    }
}
