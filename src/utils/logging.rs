use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the logging system with the specified filter.
///
/// `log_level` accepts anything `EnvFilter` understands, so per-target
/// directives such as `info,trading_gateway=debug` work too. When
/// `directory` is set, logs are also written to a daily rotating
/// `trading-gateway.log` there.
///
/// # Example
///
/// ```ignore
/// init_logging("info", Some("logs"));
/// ```
pub fn init_logging(log_level: &str, directory: Option<&str>) {
    let filter = match EnvFilter::try_new(log_level) {
        Ok(f) => f,
        Err(_) => {
            eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
            EnvFilter::new("info")
        }
    };

    let stdout_layer = fmt::layer().with_target(false).with_line_number(true);

    match directory {
        Some(directory) => {
            let file_appender =
                RollingFileAppender::new(Rotation::DAILY, directory, "trading-gateway.log");

            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_line_number(true)
                .with_writer(file_appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .init();
        }
    }
}
