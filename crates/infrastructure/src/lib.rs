//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod graph_directory_client;
mod json_file_migration_log;

pub use graph_directory_client::{GraphDirectoryClient, GraphDirectoryConfig};
pub use json_file_migration_log::JsonFileMigrationLog;
