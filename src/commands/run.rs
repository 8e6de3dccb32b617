use tracing::info;

use crate::{
    RunArgs,
    config::RootConfig,
    pipeline::{Pipeline, PipelineLayout},
    region::load_regions,
    tool::{HadoopConverter, ZoneMakerCommand},
};

use super::absolute;

pub async fn run(args: &RunArgs) -> Result<(), anyhow::Error> {
    let mut config = RootConfig::load_from_arg(args.config_file.as_deref())?;
    if let Some(regions) = &args.regions {
        config.regions = absolute(regions)?;
    }
    if let Some(output) = &args.output {
        config.output = absolute(output)?;
    }

    // Everything that can be rejected up front is, before any stage starts
    let regions = load_regions(&config.regions)?;
    info!(
        count = regions.len(),
        file = %config.regions.display(),
        "Loaded regions"
    );

    let layout = PipelineLayout::new(config.output.clone(), config.destination_dir());
    let pipeline = Pipeline::new(
        layout,
        config.pipeline.clone(),
        regions,
        ZoneMakerCommand::new(config.zone_maker.clone()),
        HadoopConverter::new(config.converter.clone()),
    );
    let report = pipeline.run().await?;

    for outcome in &report.stages {
        println!("{outcome}");
    }

    if !report.is_success() {
        let failed: Vec<_> = report.failed().map(|s| s.stage).collect();
        return Err(anyhow::anyhow!(
            "pipeline finished with failed stages: {}",
            failed.join(", ")
        ));
    }

    Ok(())
}
