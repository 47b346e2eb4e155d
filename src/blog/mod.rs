//! Solo blog console: page, article and comment management over SQLite,
//! exposed as a JSON API.
//!
//! - `db` / `repo`: schema, transactions and table access
//! - `permalink`, `ordering`, `cascade`, `statistics`: the rules every
//!   management operation is built from
//! - `page_service`, `article_service`, `comment_service`: one transaction
//!   per public operation
//! - `access`, `api`, `server`: the HTTP surface

pub mod access;
pub mod api;
pub mod article_service;
pub mod cascade;
pub mod comment_service;
pub mod db;
pub mod ids;
pub mod models;
pub mod ordering;
pub mod page_service;
pub mod pagination;
pub mod permalink;
pub mod repo;
pub mod server;
pub mod statistics;
