use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{config::Config, error::Error};

/// Attach a tty device to a tty bus.
///
/// Example:
///
///   tty_bus -d -s /tmp/ttyS0mux
///
///   tty-attach -d -s /tmp/ttyS0mux /dev/ttyS0
#[derive(Parser, Debug)]
#[command(author, version, about, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// The tty device to attach to the bus.
    pub device: Option<PathBuf>,

    /// Detach from the terminal and run as a daemon.
    #[arg(short, long)]
    pub daemonize: bool,

    /// GPS mode (sniffer): open the device through the GPS synchronization layer.
    #[arg(short, long)]
    pub gps: bool,

    /// Use this as the bus path name [default: /tmp/ttybus].
    #[arg(short = 's', long = "bus", value_name = "BUS_PATH")]
    pub bus_path: Option<PathBuf>,

    /// Send this init string (and a newline) to the device before relaying.
    #[arg(short, long = "init", value_name = "INIT_STRING")]
    pub init_string: Option<String>,

    /// Path to a configuration file.
    /// Options given on the command line take precedence.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also log to daily rotated files in this directory.
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),
}

/// Helpful examples for users.
#[derive(Subcommand, Debug, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,
}

/// Print whatever the command asks for.
pub fn handle_command(command: Commands) {
    match command {
        Commands::Examples(example) => match example {
            Examples::Config => {
                println!("{}", Config::example().serialize_pretty());
            }
        },
    }
}

impl Cli {
    /// The configuration to run with:
    /// the configuration file if given (else defaults), overridden by command line options.
    ///
    /// The result is validated.
    pub fn resolve(&self) -> Result<Config, Error> {
        let mut config = match &self.config {
            Some(path) => Config::new_from_path(path)?,
            None => Config::default(),
        };

        if let Some(device) = &self.device {
            config.device = Some(device.clone());
        }

        if let Some(bus_path) = &self.bus_path {
            config.bus_path = bus_path.clone();
        }

        if let Some(init_string) = &self.init_string {
            config.init_string = Some(init_string.clone());
        }

        config.gps |= self.gps;
        config.daemonize |= self.daemonize;

        config.validate()?;

        Ok(config)
    }
}
