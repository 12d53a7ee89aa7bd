use std::{error::Error as _, process};

use clap::Parser;
use color_eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Level};
use tty_attach::{
    bridge, cli,
    error::{exit_code, Error},
    logging,
};

/// Log `e` with its causes and end the process with its exit code.
fn fail(e: Error) -> ! {
    error!("{e}");

    let mut source = e.source();
    while let Some(cause) = source {
        error!("Caused by: {cause}");
        source = cause.source();
    }

    logging::shutdown();

    process::exit(e.exit_code());
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let mut cli = cli::Cli::parse();

    if let Some(command) = cli.command.take() {
        cli::handle_command(command);

        return Ok(());
    }

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(e.exit_code());
        }
    };

    // Must happen while the process is still single threaded.
    if config.daemonize {
        if let Err(e) = nix::unistd::daemon(false, false).map_err(Error::Daemonize) {
            eprintln!("{e}: {}", e.source().map(ToString::to_string).unwrap_or_default());
            process::exit(e.exit_code());
        }
    }

    logging::init(logging::Targets {
        syslog: true,
        file: cli.log_dir.map(|dir| (Level::DEBUG, dir)),
    });
    debug!(?config, "Resolved configuration");

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        fail(Error::SignalHandler(e));
    }

    match bridge::run(&config, &shutdown) {
        Ok(()) => {
            info!("Told to stop, quitting");
            logging::shutdown();

            process::exit(exit_code::SHUTDOWN);
        }
        Err(e) => fail(e),
    }
}
