//! Core modules: the line protocol, the progression machine and the shared
//! primitives (errors, storage access, config, logging) they stand on.

pub mod broker;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod external_action;
pub mod logging;
pub mod machine;
pub mod protocol;
pub mod schemas;
pub mod session;
pub mod store;
pub mod time;
