pub mod app;
pub mod calibration;
pub mod config;
pub mod export;
pub mod logger;
pub mod mqtt;
pub mod postural;
pub mod tapping;
pub mod task;
pub mod trace;
pub mod types;
pub mod utils;
