// Library for the binary and the integration tests

pub mod archive;
pub mod chart;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod definitions;
pub mod inventory;
pub mod metrics;
pub mod models;
pub mod oci_repo;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod regions;
pub mod report;
pub mod resolver;
pub mod version;
