//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_FILE};
use crate::error::{DepImageError, DepImageResult};
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
    ctx: &UiContext,
) -> DepImageResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(force, ctx).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> DepImageResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(force: bool, ctx: &UiContext) -> DepImageResult<()> {
    let cwd =
        std::env::current_dir().map_err(|e| DepImageError::io("getting current directory", e))?;
    let path = cwd.join(LOCAL_CONFIG_FILE);

    if path.exists() && !force {
        ui::step_warn_hint(
            ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    ConfigManager::with_path(path.clone())
        .save(&Config::default())
        .await?;

    ui::step_ok_detail(ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}
