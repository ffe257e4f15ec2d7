//! Implementation of the `questline init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub database_path: Option<String>,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if let Some(config_path) = &self.config_path {
            lines.push(format!("Config written to {}", config_path.display()));
        }
        if let Some(db) = &self.database_path {
            lines.push(format!("Database initialized at {db}"));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let output_data = run(args).await?;
    output(&output_data, json_mode);
    Ok(())
}

async fn run(args: InitArgs) -> Result<InitOutput> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };
    let questline_dir = target_path.join(".questline");

    if questline_dir.exists() && !args.force {
        return Ok(InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target_path,
            config_path: None,
            database_path: None,
        });
    }
    if args.force && questline_dir.exists() {
        fs::remove_dir_all(&questline_dir)
            .await
            .context("Failed to remove existing .questline directory")?;
    }

    fs::create_dir_all(questline_dir.join("logs"))
        .await
        .with_context(|| format!("Failed to create {}", questline_dir.display()))?;

    let mut config = Config::default();
    config.database.path = questline_dir.join("questline.db").display().to_string();

    let config_path = questline_dir.join("config.yaml");
    let yaml = serde_yaml::to_string(&config).context("Failed to render default config")?;
    fs::write(&config_path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let pool = initialize_database(&config.database)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    Ok(InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        config_path: Some(config_path),
        database_path: Some(config.database.path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;

    #[tokio::test]
    async fn test_init_writes_loadable_config_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };

        let result = run(args).await.unwrap();
        assert!(result.success);
        let config_path = result.config_path.unwrap();
        assert!(dir.path().join(".questline/questline.db").exists());

        let config = ConfigLoader::load_from_file(&config_path).unwrap();
        assert_eq!(config.database.path, result.database_path.unwrap());
        assert_eq!(config.rules.referral_threshold, 5);
    }

    #[tokio::test]
    async fn test_init_twice_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let args = || InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };

        assert!(run(args()).await.unwrap().success);
        assert!(!run(args()).await.unwrap().success);

        let forced = run(InitArgs { force: true, ..args() }).await.unwrap();
        assert!(forced.success);
        assert!(forced.message.contains("reinitialized"));
    }
}
