//! Tempokit command-line application
//!
//! Loads operations from a YAML configuration file and runs them through the
//! `tempokit-core` pipeline.

pub mod analysis;
pub mod cli;
pub mod commands;
pub mod config;
pub mod report;
