//! Mirrors events into the system log.

use std::{
    ffi::{CStr, CString},
    fmt::{self, Write},
};

use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{layer::Context, Layer};

const IDENT: &CStr = c"tty-attach";

/// A layer which sends every event it sees to `syslog(3)`.
pub(crate) struct SyslogLayer;

impl SyslogLayer {
    pub(crate) fn new() -> Self {
        // SAFETY: `IDENT` is a static C string, so it outlives the process' use of it.
        unsafe { libc::openlog(IDENT.as_ptr(), libc::LOG_PID, libc::LOG_DAEMON) };

        Self
    }
}

pub(crate) fn close() {
    // SAFETY: No arguments, closing an unopened log is harmless.
    unsafe { libc::closelog() };
}

fn priority(level: &Level) -> libc::c_int {
    match *level {
        Level::ERROR => libc::LOG_ERR,
        Level::WARN => libc::LOG_WARNING,
        Level::INFO => libc::LOG_INFO,
        Level::DEBUG | Level::TRACE => libc::LOG_DEBUG,
    }
}

/// Renders the message first, then the other fields as `key=value`.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn into_line(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

impl<S: Subscriber> Layer<S> for SyslogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        // Interior NULs cannot be passed on, strip them.
        let line = visitor.into_line().replace('\0', "");
        let Ok(line) = CString::new(line) else {
            return;
        };

        // SAFETY: The format string consumes exactly one C string argument, which we provide.
        unsafe {
            libc::syslog(
                priority(event.metadata().level()),
                c"%s".as_ptr(),
                line.as_ptr(),
            )
        };
    }
}
