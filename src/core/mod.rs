//! Core operations: context, config, discovery and the service
//! lifecycle building blocks the CLI commands compose.

pub mod backup;
pub mod certs;
pub mod config;
pub mod context;
pub mod detect;
pub mod discovery;
pub mod docker;
pub mod envfile;
pub mod health;
pub mod lock;
pub mod perms;
pub mod template;
pub mod vault;
