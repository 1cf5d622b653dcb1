//! Status command - report whether the dependency image is up to date

use super::manifest_resolver;
use crate::builder::CommandImageBuilder;
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::config::Config;
use crate::error::DepImageResult;
use crate::pipeline::{CheckOutcome, DependencyImage, PipelineSettings};
use crate::ui::{self, TaskSpinner, UiContext};
use serde::Serialize;

#[derive(Serialize)]
struct StatusJson {
    fingerprint: String,
    previous: Option<String>,
    cache: String,
    up_to_date: bool,
    staged: usize,
    image: String,
}

impl StatusJson {
    fn new(outcome: &CheckOutcome, image_name: &str) -> Self {
        Self {
            fingerprint: outcome.fingerprint.to_string(),
            previous: outcome.previous.as_ref().map(ToString::to_string),
            cache: outcome.cache.to_string(),
            up_to_date: outcome.cache.is_hit(),
            staged: outcome.staged,
            image: format!("{}:{}", image_name, outcome.fingerprint),
        }
    }
}

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config, ctx: &UiContext) -> DepImageResult<()> {
    let resolver = manifest_resolver(config, args.manifest);
    // never invoked; check() stops before the build phase
    let builder = CommandImageBuilder::new(config.image.builder.clone());
    let settings = PipelineSettings::from_config(config);
    let image_name = settings.image_name.clone();
    let pipeline = DependencyImage::new(settings, &builder);

    if args.format == OutputFormat::Json {
        let outcome = pipeline.check(&resolver).await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&StatusJson::new(&outcome, &image_name))?
        );
        return Ok(());
    }

    ui::intro(ctx, "depimage status");
    let mut spinner = TaskSpinner::new(ctx);
    spinner.start("Staging and fingerprinting dependencies...");
    let outcome = match pipeline.check(&resolver).await {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.stop_error("Could not fingerprint dependencies");
            return Err(e);
        }
    };
    spinner.stop(&format!("Fingerprinted {} dependencies", outcome.staged));

    ui::key_value(ctx, "Fingerprint", outcome.fingerprint.as_hex());
    ui::key_value(
        ctx,
        "Recorded",
        outcome
            .previous
            .as_ref()
            .map(|fp| fp.as_hex())
            .unwrap_or("(none)"),
    );
    ui::key_value_status(
        ctx,
        "Cache",
        if outcome.cache.is_hit() {
            "hit, build would be skipped"
        } else {
            "miss, build required"
        },
        outcome.cache.is_hit(),
    );

    if ctx.is_quiet() {
        println!("{}", outcome.cache);
    } else {
        ui::step_info(
            ctx,
            &format!("Image: {}:{}", image_name, outcome.fingerprint),
        );
    }

    Ok(())
}
