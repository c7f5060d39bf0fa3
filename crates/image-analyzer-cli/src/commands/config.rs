//! Config command - show where settings come from and their effective values.

use anyhow::{Context, Result};

use crate::config::{find_project_config, xdg_config_path, AppConfig};

/// Run the config command.
pub fn run(config: &AppConfig) -> Result<()> {
    println!("Config files (lowest to highest priority):");
    match xdg_config_path() {
        Some(path) => {
            let state = if path.exists() { "" } else { " (not found)" };
            println!("  user:    {}{state}", path.display());
        }
        None => println!("  user:    (no config directory)"),
    }
    match find_project_config() {
        Some(path) => println!("  project: {}", path.display()),
        None => println!("  project: (none)"),
    }
    println!();

    let effective = toml::to_string(&config.with_defaults())
        .context("Failed to render configuration")?;
    println!("Effective configuration:");
    println!();
    print!("{effective}");

    Ok(())
}
