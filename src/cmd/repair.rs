//! Counter repair: `solo repair`.

use anyhow::{Context, Result};

use solo::blog::server::open_database;
use solo::config::SoloToml;

pub fn cmd_repair(toml: &SoloToml) -> Result<()> {
    let config = toml.server_config();
    if !config.db_path.exists() {
        anyhow::bail!(
            "No database at {}. Run 'solo init' first.",
            config.db_path.display()
        );
    }

    let db = open_database(&config)?;
    let before = db.statistic()?;
    let after = db.repair_counters()?;

    if before == after {
        println!("Counters already consistent.");
    } else {
        println!("Counters repaired.");
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&after).context("Failed to serialize statistic")?
    );
    Ok(())
}
