//! The `[Role] [timestamp] [level]` log formatter required by `spec.md` §7.
//!
//! Both the master and every interop module call [`init`] once at startup,
//! matching how the teacher's reference peer binary wires up
//! `tracing_subscriber::fmt()` with a custom writer in `main()`.

use std::fmt;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Renders each log line as `[Role] [timestamp] [level] message fields...`.
struct RolePrefixFormat {
    role: &'static str,
}

impl<S, N> FormatEvent<S, N> for RolePrefixFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown-time".to_string());
        let level = *event.metadata().level();
        write!(writer, "[{}] [{}] [{}] ", self.role, timestamp, level_name(level))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        Level::TRACE => "trace",
    }
}

/// Installs the global tracing subscriber for this process, writing to
/// stderr with the `[Role] [timestamp] [level]` prefix.
///
/// `role` should be `"master"` for the master process, or the module name
/// for an interop module — it becomes the literal first bracketed field on
/// every log line this process emits.
pub fn init(role: &'static str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(RolePrefixFormat { role })
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_lowercase() {
        assert_eq!(level_name(Level::ERROR), "error");
        assert_eq!(level_name(Level::INFO), "info");
    }
}
