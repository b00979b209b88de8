pub mod cli;
pub mod config;
pub mod core;
pub mod ml;
pub mod modules;
pub mod pipeline;
