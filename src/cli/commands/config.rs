//! Config Command
//!
//! Manage reportforge configuration.
//!
//! Usage:
//!   reportforge config show [-g] [-f toml|json]
//!   reportforge config path
//!   reportforge config init [-g] [--force]

use crate::cli::util::{GlobalOptions, load_config};
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show configuration
pub fn show(options: &GlobalOptions, global: bool, format: &str) -> Result<()> {
    if global {
        match ConfigLoader::global_config_path() {
            Some(path) if path.exists() => {
                println!("# Global Config: {}\n", path.display());
                println!("{}", std::fs::read_to_string(&path)?);
            }
            Some(_) => {
                println!("No global config found.");
                println!("Run 'reportforge config init --global' to create one.");
            }
            None => println!("Cannot determine global config directory."),
        }
        return Ok(());
    }

    // Merged effective config
    let config = load_config(options)?;
    println!("{}", ConfigLoader::render(&config, format == "json")?);
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Write a default config, globally or under the current directory
pub fn init(global: bool, force: bool) -> Result<()> {
    if global {
        let dir = ConfigLoader::init_global(force)?;
        println!("✓ Initialized global configuration");
        println!("  Directory: {}", dir.display());
        if let Some(config_path) = ConfigLoader::global_config_path() {
            println!("  Config:    {}", config_path.display());
        }
    } else {
        let root = std::env::current_dir()?;
        let dir = ConfigLoader::init_project(&root, force)?;
        println!("✓ Initialized project configuration");
        println!("  Directory: {}", dir.display());
        println!("  Config:    {}", dir.join("config.toml").display());
    }
    Ok(())
}
