// Domain types, constants and errors shared across layers
pub mod common;

// Ports the pipeline depends on, and their adapters
pub mod app;
pub mod infra;

pub mod config;
pub mod logging;
pub mod pipeline;
