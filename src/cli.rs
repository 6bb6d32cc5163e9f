use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "proxywatch")]
#[command(version = concat!("Ver:", env!("CARGO_PKG_VERSION")))]
#[command(about = "Proxy detection monitor with reachability probing and fallback selection")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write a default config file
    Init,
    /// Validate the config file
    Check,
    /// Print the effective configuration
    Print,
    /// Detect the current proxy once (with retries)
    Detect,
    /// Probe whether a tunnel can be opened through a proxy
    Probe {
        /// Proxy endpoint, e.g. http://127.0.0.1:7890
        url: String,
        /// Use the short background timeout instead of the interactive one
        #[arg(short = 'b', long = "background")]
        background: bool,
    },
    /// Select between the system proxy and the configured fallback
    Select {
        /// System proxy candidate (defaults to the detected proxy)
        #[arg(short = 's', long = "system")]
        system: Option<String>,
    },
    /// Run the monitor until Ctrl-C, printing events
    Watch,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
