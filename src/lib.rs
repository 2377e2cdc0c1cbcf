pub mod config;
pub mod errors;
pub mod models;
pub mod playlist;
pub mod prober;
pub mod report;
pub mod runner;
pub mod utils;
