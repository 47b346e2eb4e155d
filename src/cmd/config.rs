//! Configuration view and validation commands: `solo config`.

use anyhow::Result;
use std::path::Path;

use solo::config::SoloToml;

use super::super::ConfigCommands;

fn print_sections(toml: &SoloToml) {
    println!("[server]");
    println!("  host = \"{}\"", toml.server.host);
    println!("  port = {}", toml.server.port);
    println!("  dev_mode = {}", toml.server.dev_mode);
    println!();
    println!("[database]");
    println!("  path = \"{}\"", toml.database.path.display());
    println!();
    println!("[blog]");
    println!("  editor_type = \"{}\"", toml.blog.editor_type);
    println!();
    println!("[log]");
    println!("  level = \"{}\"", toml.log.level);
    println!("  format = \"{}\"", toml.log.format);
    if let Some(dir) = &toml.log.dir {
        println!("  dir = \"{}\"", dir.display());
    }
    println!();
}

/// `effective` is the file merged with environment overrides.
pub fn cmd_config(
    config_path: &Path,
    effective: &SoloToml,
    command: Option<ConfigCommands>,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Solo Configuration");
            println!("==================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No solo.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();
            println!("Effective values (with env overrides):");
            println!();
            print_sections(effective);
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No solo.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = SoloToml::load(config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("solo.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            SoloToml::default().save(config_path)?;

            println!("Created solo.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port, dev_mode");
            println!("  - [database] path");
            println!("  - [log] level, format, dir");
            println!();
        }
    }

    Ok(())
}
