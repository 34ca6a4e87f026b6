//! Argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nodewatch::participation::validate_address;

#[derive(Debug, Parser)]
#[command(
    name = "nodewatch",
    version,
    about = "Follow an algod node: status, throughput, and participation keys",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print one snapshot as JSON
    Status,
    /// Follow the node until Ctrl-C
    Watch {
        /// Prometheus textfile rewritten after every update
        #[arg(long, value_name = "PATH", env = "NODEWATCH_METRICS_FILE")]
        metrics_file: Option<PathBuf>,
    },
    /// Manage participation keys
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
    /// Control fast-catchup
    Catchup {
        #[command(subcommand)]
        command: CatchupCommand,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum KeysCommand {
    /// List participation keys held by the node
    List,
    /// Generate a key and wait until the node lists it
    Generate {
        /// Account address the key is generated for
        #[arg(value_parser = account_address)]
        address: String,
        /// First valid round
        first: u64,
        /// Last valid round
        last: u64,
        /// Key dilution; the node picks one when absent
        dilution: Option<u64>,
    },
    /// Delete a participation key
    Delete {
        /// Key id as shown by `keys list`
        id: String,
    },
    /// Print the key registration link
    Link {
        /// Key id as shown by `keys list`
        id: String,
        /// Link that takes the account offline instead
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CatchupCommand {
    /// Fast-catchup to the latest catchpoint
    Start,
    /// Abort a running fast-catchup
    Abort,
}

fn account_address(value: &str) -> Result<String, String> {
    if validate_address(value) {
        Ok(value.to_string())
    } else {
        Err("not a valid account address".to_string())
    }
}
