//! Build command - stage dependencies and build the image on a cache miss

use super::manifest_resolver;
use crate::builder::{BuildOptions, CommandImageBuilder, ImageBuilder};
use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::error::DepImageResult;
use crate::pipeline::{DependencyImage, Phase, PipelineSettings};
use crate::ui::{self, BuildProgress, TaskSpinner, UiContext};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config, ctx: &UiContext) -> DepImageResult<()> {
    let resolver = manifest_resolver(config, args.manifest);
    let builder =
        CommandImageBuilder::new(args.builder.unwrap_or_else(|| config.image.builder.clone()));

    let mut settings = PipelineSettings::from_config(config);
    if let Some(secs) = args.timeout {
        settings.build_timeout = Some(Duration::from_secs(secs));
    }
    let image_name = settings.image_name.clone();

    ui::intro(ctx, "depimage build");

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupted, cancelling build");
                cancel.cancel();
            }
        })
    };

    let progress: Arc<Mutex<Option<BuildProgress>>> = Arc::new(Mutex::new(None));
    let options = {
        let progress = progress.clone();
        BuildOptions::default()
            .with_cancel(cancel)
            .with_output(Arc::new(move |line| {
                if let Ok(guard) = progress.lock() {
                    if let Some(ref progress) = *guard {
                        progress.on_line(line);
                    }
                }
            }))
    };

    let spinner = Mutex::new(TaskSpinner::new(ctx));
    let pipeline = DependencyImage::new(settings, &builder).on_phase(|phase| {
        let Ok(mut spinner) = spinner.lock() else {
            return;
        };
        match phase {
            Phase::Staging => spinner.start("Staging dependencies..."),
            Phase::Hashing => spinner.start("Fingerprinting dependencies..."),
            Phase::Building => {
                spinner.clear();
                if let Ok(mut guard) = progress.lock() {
                    *guard = Some(BuildProgress::new(ctx, &image_name));
                }
            }
            _ => {}
        }
    });

    let result = pipeline.run(&resolver, &options, args.force).await;
    drop(pipeline);
    ctrl_c.abort();

    if let Ok(mut guard) = progress.lock() {
        if let Some(progress) = guard.take() {
            progress.finish();
        }
    }
    let mut spinner = spinner.into_inner().unwrap_or_else(|e| e.into_inner());

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.clear();
            ui::outro_error(ctx, "Dependency image build failed");
            return Err(e);
        }
    };

    if outcome.cache.is_hit() {
        spinner.stop(&format!(
            "Cache hit, {} dependencies unchanged",
            outcome.staged
        ));
    } else {
        spinner.clear();
        ui::step_ok_detail(
            ctx,
            &format!("Built with {}", builder.builder_name()),
            &format!("{} dependencies", outcome.staged),
        );
    }

    if outcome.record_stale {
        ui::step_warn_hint(
            ctx,
            "Cache record could not be written",
            "the next build will rebuild this image",
        );
    }

    ui::key_value(ctx, "Fingerprint", outcome.fingerprint.as_hex());
    ui::key_value(ctx, "Image", &outcome.tags.qualified);

    if ctx.is_quiet() {
        println!("{}", outcome.fingerprint);
    } else if outcome.cache.is_hit() {
        ui::outro_success(ctx, "Dependency image up to date");
    } else {
        ui::outro_success(ctx, "Dependency image built");
    }

    Ok(())
}
