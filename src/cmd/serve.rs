//! Console API server command: `solo serve`.

use anyhow::Result;
use std::path::PathBuf;

use solo::config::SoloToml;

pub async fn cmd_serve(
    toml: SoloToml,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
) -> Result<()> {
    let mut config = toml.server_config();
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(db_path) = db_path {
        config.db_path = db_path;
    }
    config.dev_mode |= dev;

    solo::blog::server::start_server(config).await
}
