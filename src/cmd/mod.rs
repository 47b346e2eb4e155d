//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `serve`  | `Serve`          |
//! | `init`   | `Init`           |
//! | `config` | `Config`         |
//! | `repair` | `Repair`         |

pub mod config;
pub mod init;
pub mod repair;
pub mod serve;

pub use config::cmd_config;
pub use init::cmd_init;
pub use repair::cmd_repair;
pub use serve::cmd_serve;
