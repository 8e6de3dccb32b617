//! Hadoop converter job invocation.

use std::path::PathBuf;

use crate::config::ConverterConfig;

use super::process::{CommandSpec, run_command};
use super::{ConvertJob, ConvertTool, ToolError};

/// Submits the converter jar through the `hadoop` launcher.
#[derive(Debug, Clone)]
pub struct HadoopConverter {
    config: ConverterConfig,
}

impl HadoopConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn command(&self, job: &ConvertJob) -> CommandSpec {
        CommandSpec::new(&self.config.program)
            .opt("--config", &self.config.hadoop_config)
            .opt("jar", &self.config.jar)
            .opt("--config", &self.config.job_config)
            .opt("--model", &self.config.model)
            .opt("--type", &self.config.zone_type)
            .opt("--zone", &job.zone)
            .opt("--version", &job.version)
            .opt("--format", &self.config.format)
            .opt("--branchAndVersion", &job.branch_and_version)
    }
}

impl ConvertTool for HadoopConverter {
    async fn convert(&self, job: &ConvertJob) -> Result<(), ToolError> {
        run_command(&self.command(job)).await.map(|_| ())
    }

    fn output_path(&self, job: &ConvertJob) -> PathBuf {
        self.config.output_dir.join(&job.zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> HadoopConverter {
        HadoopConverter::new(ConverterConfig {
            program: "hadoop".to_string(),
            hadoop_config: "/etc/hadoop".to_string(),
            jar: "photon-converter.jar".to_string(),
            job_config: "job-config.xml".to_string(),
            model: "wbm_rio".to_string(),
            zone_type: "COUNTRY".to_string(),
            format: "TIFF_ASCII".to_string(),
            output_dir: PathBuf::from("/data/output/wbm_rio"),
        })
    }

    fn job() -> ConvertJob {
        ConvertJob {
            region: "RWR".to_string(),
            zone: "AS_".to_string(),
            version: "2.4".to_string(),
            branch_and_version: "562a90ee-fe27-40ef-ad1a-01463bf45662:1000000".to_string(),
        }
    }

    #[test]
    fn test_command_line() {
        let spec = converter().command(&job());

        assert_eq!(
            spec.to_string(),
            "hadoop --config /etc/hadoop jar photon-converter.jar --config job-config.xml \
             --model wbm_rio --type COUNTRY --zone AS_ --version 2.4 --format TIFF_ASCII \
             --branchAndVersion 562a90ee-fe27-40ef-ad1a-01463bf45662:1000000"
        );
    }

    #[test]
    fn test_output_path_uses_zone_code() {
        assert_eq!(
            converter().output_path(&job()),
            PathBuf::from("/data/output/wbm_rio/AS_")
        );
    }
}
