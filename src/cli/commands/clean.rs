//! Clean command - remove the staging directory and cache record

use crate::builder::CommandImageBuilder;
use crate::config::Config;
use crate::error::DepImageResult;
use crate::pipeline::{DependencyImage, PipelineSettings};
use crate::ui::{self, UiContext};

/// Execute the clean command
pub async fn execute(config: &Config, ctx: &UiContext) -> DepImageResult<()> {
    let builder = CommandImageBuilder::new(config.image.builder.clone());
    let pipeline = DependencyImage::new(PipelineSettings::from_config(config), &builder);
    let root = pipeline.settings().root.display().to_string();

    if pipeline.clean().await? {
        ui::step_ok_detail(ctx, "Removed staging directory", &root);
    } else {
        ui::step_info(ctx, &format!("Nothing to clean at {}", root));
    }

    Ok(())
}
