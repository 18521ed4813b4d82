//! Config command - show or initialize configuration

use super::CommandContext;
use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_NAME};
use crate::error::{EnvbootError, EnvbootResult};
use crate::ui::{self, UiContext};
use std::path::Path;

/// Execute the config command
pub async fn execute(args: ConfigArgs, ctx: &CommandContext) -> EnvbootResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(&ctx.config),
        Some(ConfigAction::Path) => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
        Some(ConfigAction::Init { force }) => init_config(&ctx.project_dir, force).await,
    }
}

fn show_config(config: &Config) -> EnvbootResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Write a default config into `project_dir`
pub async fn init_config(project_dir: &Path, force: bool) -> EnvbootResult<()> {
    let path = project_dir.join(LOCAL_CONFIG_NAME);
    if path.exists() && !force {
        return Err(EnvbootError::ConfigExists(path));
    }

    ConfigManager::with_path(path.clone())
        .save(&Config::default())
        .await?;

    let ctx = UiContext::detect();
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();

        init_config(dir.path(), false).await.unwrap();

        let path = dir.path().join(LOCAL_CONFIG_NAME);
        let config = ConfigManager::with_path(path.clone()).load().await.unwrap();
        assert_eq!(config.environment.name, "circleenv");
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LOCAL_CONFIG_NAME), "[tests]\n").unwrap();

        let err = init_config(dir.path(), false).await.unwrap_err();
        assert!(matches!(err, EnvbootError::ConfigExists(_)));

        init_config(dir.path(), true).await.unwrap();
    }
}
