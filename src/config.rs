//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::{
    services::{parse_catalog_entry, CommandCatalog},
    timers::{FleetConfig, TaskTiming},
};

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "multi-timer")]
#[command(about = "Run linked, pausable countdown timers behind an HTTP control API")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Number of timers in the initial fleet
    #[arg(short, long, default_value = "3")]
    pub timers: usize,

    /// Length of one countdown tick in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// How long a stop waits for a countdown to exit
    #[arg(long, default_value = "10")]
    pub stop_timeout_secs: u64,

    /// Post-completion command as LABEL=PATH (repeatable, replaces the defaults)
    #[arg(long = "command", value_name = "LABEL=PATH", value_parser = parse_catalog_entry)]
    pub commands: Vec<(String, PathBuf)>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Engine settings derived from the flags
    pub fn fleet_config(&self) -> FleetConfig {
        let catalog = if self.commands.is_empty() {
            CommandCatalog::default()
        } else {
            CommandCatalog::new(self.commands.clone())
        };

        FleetConfig {
            timing: TaskTiming {
                tick: Duration::from_millis(self.tick_ms.max(1)),
                stop_timeout: Duration::from_secs(self.stop_timeout_secs),
            },
            catalog,
        }
    }
}
