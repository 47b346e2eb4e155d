//! Project bootstrap: `solo init`.

use anyhow::Result;
use std::path::Path;

use solo::blog::server::open_database;
use solo::config::SoloToml;

pub fn cmd_init(config_path: &Path, toml: &SoloToml) -> Result<()> {
    if config_path.exists() {
        println!("Using existing {}", config_path.display());
    } else {
        toml.save(config_path)?;
        println!("Created {}", config_path.display());
    }

    let config = toml.server_config();
    let db = open_database(&config)?;
    let stat = db.statistic()?;

    println!("Database ready at {}", config.db_path.display());
    println!(
        "  {} articles ({} published), {} comments",
        stat.blog_article_count, stat.published_blog_article_count, stat.blog_comment_count
    );
    println!();
    println!("Run 'solo serve' to start the console.");
    Ok(())
}
