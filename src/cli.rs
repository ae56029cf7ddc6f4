// src/cli.rs
//! Command-line definitions for the `page-sentinel` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Watch web pages, classify changes, and email subscribers when something matters.
#[derive(Debug, Parser)]
#[command(name = "page-sentinel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "SENTINEL_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check every monitored page once and exit
    Run,

    /// Check pages on a fixed interval until stopped
    Watch {
        /// Seconds between runs (overrides [schedule].interval_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Serve /health, /status, /run and /metrics, with the interval loop in the background
    Serve {
        /// Address to bind (overrides [server].bind)
        #[arg(long)]
        bind: Option<String>,

        /// Do not start the interval loop; runs happen only via POST /run
        #[arg(long)]
        no_schedule: bool,
    },

    /// Send a canned change through the classifier and print the verdict
    Probe,
}
