pub mod config;
pub mod db;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod schema;
