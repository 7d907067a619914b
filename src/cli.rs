/// CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};

// Build timestamp injected at compile time
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "cluster-pulse")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Prometheus base URL (overrides config file and PROMETHEUS_URL)
    #[arg(long, global = true)]
    pub prometheus_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive terminal dashboard (default)
    Dashboard {
        /// Poll a cluster-pulse server instead of Prometheus directly
        #[arg(short, long)]
        endpoint: Option<String>,
    },

    /// Run one poll and print the dashboard view model
    Snapshot {
        #[arg(short, long, value_enum, default_value = "text")]
        format: SnapshotFormat,
    },

    /// Run an ad-hoc instant query
    Query {
        /// PromQL expression
        expression: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: QueryFormat,
    },

    /// List the named query set
    Queries,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Run HTTP API server mode
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on (default from config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default from config)
        #[arg(long)]
        host: Option<String>,

        /// Enable CORS for cross-origin requests
        #[arg(long)]
        cors: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SnapshotFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// View effective configuration
    View,

    /// Print the config file location
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
