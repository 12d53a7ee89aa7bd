use std::{path::PathBuf, sync::Once};

use tracing::{debug, info, metadata::LevelFilter, trace, Level};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{prelude::*, EnvFilter};

mod syslog;

/// Where log lines go besides stderr.
#[derive(Debug, Default, Clone)]
pub struct Targets {
    /// Mirror events at info and above to the system log.
    pub syslog: bool,

    /// Also write daily rotated files at the given level into the given directory.
    pub file: Option<(Level, PathBuf)>,
}

fn do_init(targets: Targets) {
    let mut message = String::from("Logging with:");

    // stderr
    message += " stderr";

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let maybe_syslog_layer = if targets.syslog {
        message += ", syslog";

        Some(syslog::SyslogLayer::new().with_filter(LevelFilter::INFO))
    } else {
        None
    };

    let maybe_file_layer = if let Some((level, output_dir)) = targets.file {
        message += &format!(", file (in dir {output_dir:?})");

        let file_appender = RollingFileAppender::new(Rotation::DAILY, output_dir, "tty-attach.log");

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_filter(LevelFilter::from(level));
        Some(file_layer)
    } else {
        None
    };

    registry.with(maybe_syslog_layer).with(maybe_file_layer).init();

    debug!(message);
}

/// Initialize tracing.
///
/// Will only initialize once, so tests may call this.
pub fn init(targets: Targets) {
    static TRACING_IS_INITIALIZED: Once = Once::new();

    TRACING_IS_INITIALIZED.call_once(|| do_init(targets));

    info!("Logging initialized");
}

/// Flush what can be flushed before the process exits.
pub fn shutdown() {
    trace!("Shutting down");
    syslog::close();
}
