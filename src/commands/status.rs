use crate::{
    StatusArgs,
    config::RootConfig,
    pipeline::{PipelineLayout, progress},
};

use super::absolute;

pub async fn run(args: &StatusArgs) -> Result<(), anyhow::Error> {
    let mut config = RootConfig::load_from_arg(args.config_file.as_deref())?;
    if let Some(output) = &args.output {
        config.output = absolute(output)?;
    }

    let layout = PipelineLayout::new(config.output.clone(), config.destination_dir());
    let regions = progress(&layout, &config.pipeline.artifact_suffix)?;

    if regions.is_empty() {
        println!("Nothing fetched yet under {}", layout.output().display());
        return Ok(());
    }

    println!(
        "{:<12} {:>8} {:>10} {:>6} {:>10} {:>9}  state",
        "region", "fetched", "artifacts", "sent", "converted", "filtered"
    );
    for region in &regions {
        let state = if region.is_complete() {
            "done"
        } else {
            "pending"
        };
        println!(
            "{:<12} {:>8} {:>10} {:>6} {:>10} {:>9}  {}",
            region.region,
            if region.fetched { "yes" } else { "no" },
            region.artifacts,
            region.sent,
            region.converted,
            region.filtered,
            state
        );
    }

    let complete = regions.iter().filter(|r| r.is_complete()).count();
    println!(
        "{complete}/{} regions complete, destination {}",
        regions.len(),
        layout.destination().display()
    );

    Ok(())
}
