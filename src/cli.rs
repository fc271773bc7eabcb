//! Code related to CLI things
//!

use clap::{Parser, Subcommand};

#[derive(Parser, Clone)]
pub struct SharedOpts {
    #[clap(short, long, help = "Configuration file")]
    pub config: Option<String>,
    #[clap(short, long)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the resolver: UDP, TCP and DoH listeners together.
    Server {
        #[clap(flatten)]
        sopt: SharedOpts,
    },
    /// Validate the configuration and print the result.
    ConfigCheck {
        #[clap(flatten)]
        sopt: SharedOpts,
    },
    /// Print a default configuration file.
    ExportConfig {
        #[clap(flatten)]
        sopt: SharedOpts,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Server {
            sopt: SharedOpts {
                config: None,
                debug: false,
            },
        }
    }
}

#[derive(Parser)]
#[command(arg_required_else_help(false))]
/// A small authoritative and forwarding DNS resolver. With ibex references.
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}
