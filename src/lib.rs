pub mod bundle;
pub mod config;
pub mod error;
pub mod log;
pub mod overlay;
pub mod pipeline;
pub mod run;
pub mod staging;
