//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Viajero: HTTP service and CLI runner for the viajar test engine
#[derive(Parser, Debug)]
#[command(name = "viajero")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// SQLite database path
    #[arg(long, default_value = "viajero.db", global = true)]
    pub database: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve(ServeArgs),

    /// Load the demo step catalogs into the database
    Seed,

    /// Execute one catalog case and print the result as JSON
    Run(RunArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8090")]
    pub addr: String,

    /// Base URL of the booking site under test
    #[arg(long, default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Run the browser with a visible window
    #[arg(long)]
    pub headed: bool,

    /// Chromium binary path (auto-detected when omitted)
    #[arg(long)]
    pub chrome_path: Option<String>,

    /// Disable the Chromium sandbox (needed inside some containers)
    #[arg(long)]
    pub no_sandbox: bool,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test case id to execute
    pub test_case_id: String,

    /// Travel mode catalog to read
    #[arg(short, long, default_value = "flight")]
    pub mode: String,

    /// Base URL of the booking site under test
    #[arg(long, default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Run parameter as key=value (repeatable)
    #[arg(short, long = "param")]
    pub params: Vec<String>,

    /// Run the browser with a visible window
    #[arg(long)]
    pub headed: bool,

    /// Chromium binary path (auto-detected when omitted)
    #[arg(long)]
    pub chrome_path: Option<String>,

    /// Disable the Chromium sandbox (needed inside some containers)
    #[arg(long)]
    pub no_sandbox: bool,
}
