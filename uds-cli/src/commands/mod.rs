pub mod config;
pub mod stress;
