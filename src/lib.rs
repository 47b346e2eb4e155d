pub mod blog;
pub mod config;
pub mod errors;
pub mod logging;
