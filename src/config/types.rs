//! Configuration type definitions.
//!
//! This module contains the data structures deserialized from
//! `regionflow.yaml`. These types are pure data - no I/O.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Root config
// =============================================================================

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// Base working directory holding `fetched/`, `sent/` and `tmp/`
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Where converted artifacts end up (defaults to `<output>/done`)
    #[serde(default)]
    pub destination: Option<PathBuf>,
    /// Regions file, one region per line
    #[serde(default = "default_regions")]
    pub regions: PathBuf,
    pub zone_maker: ZoneMakerConfig,
    pub converter: ConverterConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

fn default_output() -> PathBuf {
    PathBuf::from("work")
}

fn default_regions() -> PathBuf {
    PathBuf::from("regions.cfg")
}

impl RootConfig {
    /// Resolve every relative path in the config against `base_path`.
    pub fn resolve_paths(&mut self, base_path: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base_path.join(&*path);
            }
        };

        resolve(&mut self.output);
        resolve(&mut self.regions);
        if let Some(destination) = self.destination.as_mut() {
            resolve(destination);
        }
        resolve(&mut self.converter.output_dir);
    }

    /// The destination directory for converted artifacts.
    pub fn destination_dir(&self) -> PathBuf {
        self.destination
            .clone()
            .unwrap_or_else(|| self.output.join("done"))
    }
}

// =============================================================================
// Zone maker (fetch / send tool)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneMakerConfig {
    /// Java launcher used to run the zone maker jar
    #[serde(default = "default_java")]
    pub java: String,
    /// Path to the zone maker jar
    pub jar: String,
    /// `country_config.xml` passed through to the tool
    pub country_config: String,
    /// Access point web service URL
    pub access_point: String,
    /// Zoning service URL
    pub zoning_service: String,
    #[serde(default = "default_zone_type")]
    pub zone_type: String,
    /// Regions that need the administrative-level override
    #[serde(default = "default_admin_level_regions")]
    pub admin_level_regions: Vec<String>,
    #[serde(default = "default_admin_level")]
    pub admin_level: String,
}

fn default_java() -> String {
    "java".to_string()
}

fn default_zone_type() -> String {
    "COUNTRY".to_string()
}

fn default_admin_level_regions() -> Vec<String> {
    vec!["NAM".to_string()]
}

fn default_admin_level() -> String {
    "ORDER1".to_string()
}

impl ZoneMakerConfig {
    /// The administrative level to request for `region`, if it is overridden.
    pub fn admin_level_for(&self, region: &str) -> Option<&str> {
        self.admin_level_regions
            .iter()
            .any(|r| r.eq_ignore_ascii_case(region))
            .then_some(self.admin_level.as_str())
    }
}

// =============================================================================
// Converter (Hadoop job)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    #[serde(default = "default_converter_program")]
    pub program: String,
    /// Hadoop configuration directory
    pub hadoop_config: String,
    /// Converter job jar
    pub jar: String,
    /// `job-config.xml` for the converter
    pub job_config: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_zone_type")]
    pub zone_type: String,
    #[serde(default = "default_format")]
    pub format: String,
    /// Fixed location where the converter leaves its output, one entry per zone code
    #[serde(default = "default_converter_output")]
    pub output_dir: PathBuf,
}

fn default_converter_program() -> String {
    "hadoop".to_string()
}

fn default_model() -> String {
    "wbm_rio".to_string()
}

fn default_format() -> String {
    "TIFF_ASCII".to_string()
}

fn default_converter_output() -> PathBuf {
    PathBuf::from("output/wbm_rio")
}

// =============================================================================
// Pipeline behaviour
// =============================================================================

/// What a stage does when processing a single item fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemFailurePolicy {
    /// End the stage; the item stays unmarked for the next run
    #[default]
    Stop,
    /// Park the item for the rest of this run and keep going
    Skip,
}

/// What a downstream stage does once its upstream has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamFailurePolicy {
    /// Treat the failure like completion: process what exists, then stop
    #[default]
    Drain,
    /// Stop immediately and report failure downstream
    Halt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// File suffix of the artifacts passed between stages
    #[serde(default = "default_artifact_suffix")]
    pub artifact_suffix: String,
    /// Backoff when the send stage finds nothing to do
    #[serde(default = "default_send_poll_ms")]
    pub send_poll_ms: u64,
    /// Backoff when the convert stage finds nothing to do
    #[serde(default = "default_convert_poll_ms")]
    pub convert_poll_ms: u64,
    /// Hard limit for a whole pipeline run
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prefix written into the artifact's `"version"` value before sending
    #[serde(default)]
    pub version_prefix: Option<String>,
    #[serde(default)]
    pub on_item_failure: ItemFailurePolicy,
    #[serde(default)]
    pub on_upstream_failure: UpstreamFailurePolicy,
}

fn default_artifact_suffix() -> String {
    ".json".to_string()
}

fn default_send_poll_ms() -> u64 {
    2_000
}

fn default_convert_poll_ms() -> u64 {
    10_000
}

fn default_timeout_secs() -> u64 {
    7 * 24 * 60 * 60
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            artifact_suffix: default_artifact_suffix(),
            send_poll_ms: default_send_poll_ms(),
            convert_poll_ms: default_convert_poll_ms(),
            timeout_secs: default_timeout_secs(),
            version_prefix: None,
            on_item_failure: ItemFailurePolicy::default(),
            on_upstream_failure: UpstreamFailurePolicy::default(),
        }
    }
}

impl PipelineSettings {
    pub fn send_poll(&self) -> Duration {
        Duration::from_millis(self.send_poll_ms)
    }

    pub fn convert_poll(&self) -> Duration {
        Duration::from_millis(self.convert_poll_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
