use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::args::ConfigArgs;
use crate::config::{self, Config, DEFAULT_CONFIG_TEMPLATE};
use crate::ui::report;

pub async fn execute(args: ConfigArgs, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_path);

    if args.path {
        println!("Configuration file path:");
        println!("  {}", config_path.display());
        return Ok(());
    }

    if args.init {
        if config_path.exists() {
            report::warn(format!("Configuration file already exists: {}", config_path.display()));
            return Ok(());
        }
        create_default_config(&config_path)?;
        report::success(format!("Configuration file created: {}", config_path.display()));
        println!("\nYou can now edit this file to customize default settings.");
        return Ok(());
    }

    if args.show {
        println!("Current configuration:");
        if !config_path.exists() {
            println!("  No configuration file found, using defaults.");
            println!("  Run 'universal-downloader config --init' to create one.");
        }
        let config = Config::load(Some(&config_path))?;
        println!("\n{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    // Default: show help
    println!("Configuration management");
    println!("\nOptions:");
    println!("  --show   Show current configuration");
    println!("  --init   Initialize default configuration file");
    println!("  --path   Show configuration file path");

    Ok(())
}

fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
