use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Layer,
};

/// Installs the console + rolling file subscriber.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the lifetime of the process.
pub fn setup_logger(log_dir: &str) -> Option<WorkerGuard> {
    let file_parts = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::hourly(log_dir, "deployer");
            Some(tracing_appender::non_blocking(file_appender))
        }
        Err(e) => {
            eprintln!("Cannot create log directory {}: {}", log_dir, e);
            None
        }
    };

    // Console honours RUST_LOG, everything at INFO otherwise
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    let (file_layer, guard) = match file_parts {
        Some((non_blocking, guard)) => {
            let file_filter = tracing_subscriber::filter::Targets::new()
                .with_target("cycle_result", Level::INFO)
                .with_default(Level::INFO);

            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(FileFormatter)
                .with_filter(file_filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init();

    if let Err(e) = installed {
        eprintln!("Logger already installed: {}", e);
    }

    guard
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn event_message(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor {
        message: String::new(),
    };
    event.record(&mut visitor);
    visitor.message
}

/// Paints the status keywords the bot prints in its progress lines.
pub(crate) fn colorize_status(msg: &str) -> String {
    let palette = [
        ("SUCCESS", Color::LightGreen),
        ("FAILED", Color::LightRed),
        ("SKIPPED", Color::LightYellow),
    ];

    let mut out = msg.to_string();
    for (word, color) in palette {
        if out.contains(word) {
            let painted = Style::new().fg(color).bold().paint(word).to_string();
            out = out.replace(word, &painted);
        }
    }
    out
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%H:%M:%S");
        let dim = Style::new().dimmed();
        write!(writer, "{} ", dim.paint(timestamp.to_string()))?;

        match *event.metadata().level() {
            Level::ERROR => write!(writer, "{} ", Color::Red.bold().paint("ERROR"))?,
            Level::WARN => write!(writer, "{} ", Color::Yellow.bold().paint("WARN"))?,
            _ => {}
        }

        let msg = event_message(event);
        write!(writer, "{}", colorize_status(&msg))?;
        writeln!(writer)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        write!(writer, "{} [{}] ", timestamp, level)?;
        writeln!(writer, "{}", event_message(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_leaves_plain_text() {
        assert_eq!(colorize_status("Deploying Greeter.sol"), "Deploying Greeter.sol");
    }

    #[test]
    fn test_colorize_wraps_keywords() {
        let out = colorize_status("SKIPPED SimpleTimeLock.sol");
        assert!(out.contains("SKIPPED"));
        assert!(out.contains('\u{1b}'));
    }
}
