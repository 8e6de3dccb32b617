//! Zone maker jar invocation.

use crate::config::ZoneMakerConfig;

use super::process::{CommandSpec, run_command};
use super::{ToolError, ZoneRequest, ZoneTool};

/// Runs the zone maker jar as a child process.
#[derive(Debug, Clone)]
pub struct ZoneMakerCommand {
    config: ZoneMakerConfig,
}

impl ZoneMakerCommand {
    pub fn new(config: ZoneMakerConfig) -> Self {
        Self { config }
    }

    /// Build the command line for `request`.
    ///
    /// Regions listed in `admin_level_regions` get the `-adm` override.
    pub fn command(&self, request: &ZoneRequest) -> CommandSpec {
        let spec = CommandSpec::new(&self.config.java)
            .opt("-jar", &self.config.jar)
            .opt("-c", &self.config.country_config)
            .opt("-url", &self.config.access_point)
            .opt("-out", request.output_dir.to_string_lossy())
            .opt("-mod", request.mode.as_str())
            .opt("-rn", &request.region)
            .opt("-rver", &request.version)
            .opt("-type", &self.config.zone_type)
            .opt("-zone", &self.config.zoning_service)
            .opt("-bv", &request.branch_and_version);

        match self.config.admin_level_for(&request.region) {
            Some(level) => spec.opt("-adm", level),
            None => spec,
        }
    }
}

impl ZoneTool for ZoneMakerCommand {
    async fn run(&self, request: &ZoneRequest) -> Result<(), ToolError> {
        run_command(&self.command(request)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::tool::ZoneMode;

    fn config() -> ZoneMakerConfig {
        ZoneMakerConfig {
            java: "java".to_string(),
            jar: "zone-maker.jar".to_string(),
            country_config: "country_config.xml".to_string(),
            access_point: "http://ap/ws".to_string(),
            zoning_service: "http://zs/ws".to_string(),
            zone_type: "COUNTRY".to_string(),
            admin_level_regions: vec!["NAM".to_string()],
            admin_level: "ORDER1".to_string(),
        }
    }

    fn request(region: &str, mode: ZoneMode) -> ZoneRequest {
        ZoneRequest {
            mode,
            region: region.to_string(),
            version: "13.10".to_string(),
            branch_and_version: "562a90ee-fe27-40ef-ad1a-01463bf45662:1000000".to_string(),
            output_dir: PathBuf::from("/work/fetched/RWR"),
        }
    }

    #[test]
    fn test_fetch_command_line() {
        let tool = ZoneMakerCommand::new(config());
        let spec = tool.command(&request("RWR", ZoneMode::Fetch));

        assert_eq!(spec.program, "java");
        assert_eq!(
            spec.args,
            vec![
                "-jar",
                "zone-maker.jar",
                "-c",
                "country_config.xml",
                "-url",
                "http://ap/ws",
                "-out",
                "/work/fetched/RWR",
                "-mod",
                "FETCH",
                "-rn",
                "RWR",
                "-rver",
                "13.10",
                "-type",
                "COUNTRY",
                "-zone",
                "http://zs/ws",
                "-bv",
                "562a90ee-fe27-40ef-ad1a-01463bf45662:1000000",
            ]
        );
    }

    #[test]
    fn test_admin_level_override() {
        let tool = ZoneMakerCommand::new(config());

        let spec = tool.command(&request("NAM", ZoneMode::Send));
        assert_eq!(&spec.args[spec.args.len() - 2..], ["-adm", "ORDER1"]);
        assert!(spec.args.contains(&"SEND".to_string()));

        let spec = tool.command(&request("RWR", ZoneMode::Send));
        assert!(!spec.args.contains(&"-adm".to_string()));
    }
}
