//! CLI definition using clap derive API.
//!
//! `termchat` with no subcommand starts the server.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// TermChat - encrypted terminal chat over telnet.
#[derive(Parser, Debug)]
#[command(name = "termchat", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Deployment environment; selects the config file and default log level.
    #[arg(long, value_enum, default_value_t = Environment::Dev, global = true, env = "TERMCHAT_ENV")]
    pub env: Environment,

    /// Config file (default: `{data_dir}/termchat_{env}.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (default: `$TERMCHAT_DATA_DIR` or `~/.termchat`).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the telnet listen address.
    #[arg(long, global = true)]
    pub tcp_addr: Option<String>,

    /// Override the HTTP listen address.
    #[arg(long, global = true)]
    pub http_addr: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the telnet chat server and the HTTP health endpoint.
    Serve,

    /// Print a fresh base64 message encryption key.
    GenKey,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }
}

impl Cli {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match (self.verbose, self.env) {
            (0, Environment::Prod) => "info",
            (0, _) | (1, _) => "debug",
            _ => "trace",
        }
    }
}
