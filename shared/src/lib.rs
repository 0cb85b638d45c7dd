pub mod config;
pub mod database;
pub mod domain;
pub mod entity;

pub use config::Config;
pub use database::get_db_connection;
pub use domain::*;
