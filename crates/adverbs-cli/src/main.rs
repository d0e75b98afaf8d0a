// SPDX-License-Identifier: Apache-2.0
//! adverbs command-line interface
//!
//! Inspect the RDMA adapters on this host: list devices, show device and
//! port attributes, filter ports by state and link layer.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::{self, DeviceSelector};
use commands::{list, ports, show, version};

/// adverbs - RDMA device discovery and capability queries
#[derive(Parser)]
#[command(name = "adverbs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Verbs library to load (overrides config and ADVERBS_LIBRARY)
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long, global = true, env = "ADVERBS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List RDMA devices
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show device attributes and ports for one device
    #[command(group(ArgGroup::new("device").required(true).args(["name", "index", "guid"])))]
    Show {
        /// Kernel device name (e.g. mlx5_0)
        name: Option<String>,

        /// Kernel device index
        #[arg(long)]
        index: Option<i32>,

        /// Node GUID (xxxx:xxxx:xxxx:xxxx or hex)
        #[arg(long)]
        guid: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List the ports of one device
    Ports {
        /// Kernel device name (e.g. mlx5_0)
        name: String,

        /// Only ports in the ACTIVE state
        #[arg(long)]
        active: bool,

        /// Only ports with this link layer
        #[arg(long, value_enum)]
        link_layer: Option<LinkLayerArg>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LinkLayerArg {
    #[value(name = "ib", alias = "infiniband")]
    Infiniband,
    Ethernet,
}

impl From<LinkLayerArg> for ports::LinkLayerFilter {
    fn from(arg: LinkLayerArg) -> Self {
        match arg {
            LinkLayerArg::Infiniband => ports::LinkLayerFilter::Infiniband,
            LinkLayerArg::Ethernet => ports::LinkLayerFilter::Ethernet,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let library = cli.library.as_deref();
    let config = cli.config.as_deref();

    // Execute command
    let result = match cli.command {
        Commands::List { json } => {
            common::open_verbs(library, config).and_then(|verbs| list::execute(&verbs, json))
        }

        Commands::Show {
            name,
            index,
            guid,
            json,
        } => DeviceSelector::from_args(name, index, guid.as_deref()).and_then(|selector| {
            let verbs = common::open_verbs(library, config)?;
            show::execute(&verbs, &selector, json)
        }),

        Commands::Ports {
            name,
            active,
            link_layer,
            json,
        } => common::open_verbs(library, config).and_then(|verbs| {
            ports::execute(&verbs, &name, active, link_layer.map(Into::into), json)
        }),

        Commands::Version => {
            version::execute(library, config);
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
