//! Backend for the agricultural and rural development dashboard: loads the
//! indicator table, projects country profiles to 2D and serves the results.

pub mod analysis;
pub mod assemble;
pub mod config;
pub mod data;
pub mod error;
pub mod query;
pub mod server;
