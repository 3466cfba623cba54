use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1B[31m",
        Level::Warn => "\x1B[33m",
        Level::Info => "\x1B[32m",
        Level::Debug => "\x1B[36m",
        Level::Trace => "\x1B[35m",
    }
}

/// Installs the global logger. Info by default, `RUST_LOG` overrides.
pub fn setup_logging() {
    let colored = atty::is(atty::Stream::Stderr);

    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .format(move |buf, record| {
            let level = record.level();
            let timestamp = humantime::format_rfc3339_millis(SystemTime::now());

            if colored {
                write!(buf, "{}{:>5}\x1B[0m", level_color(level), level)?;
            } else {
                write!(buf, "{:>5}", level)?;
            }
            write!(buf, " [{}] {}", timestamp, record.args())?;

            // Source location only for debug/trace
            if level >= Level::Debug {
                write!(
                    buf,
                    " - {}:{}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0)
                )?;
            }
            writeln!(buf)
        })
        .init();
}

#[macro_export]
macro_rules! log_request {
    ($request:expr) => {{
        let parts: Vec<&str> = $request.trim().split_whitespace().collect();
        if parts.len() >= 2 {
            log::info!("→ {} {}", parts[0], parts[1])
        } else {
            log::info!("→ Invalid request format: {}", $request.trim())
        }
    }};
}

#[macro_export]
macro_rules! log_response {
    ($status:expr, $duration:expr, $encoding:expr, $size:expr) => {
        log::info!(
            "← {} ({:?}) - {} body, {} bytes",
            $status,
            $duration,
            $encoding,
            $size
        )
    };
}

#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        log::error!("❌ {} - {}", $context, $error)
    };
}

pub trait Loggable {
    fn log_description(&self) -> String;
}

impl Loggable for str {
    fn log_description(&self) -> String {
        self.to_string()
    }
}

impl Loggable for Path {
    fn log_description(&self) -> String {
        self.display().to_string()
    }
}

pub trait LoggingExt: Loggable {
    fn log_operation<F, T, E>(&self, operation: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::fmt::Display;
}

impl<S: ?Sized + Loggable> LoggingExt for S {
    fn log_operation<F, T, E>(&self, operation: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::fmt::Display,
    {
        log::debug!("Starting {} on {}", operation, self.log_description());
        match f() {
            Ok(result) => {
                log::debug!("Completed {} on {}", operation, self.log_description());
                Ok(result)
            }
            Err(e) => {
                log::error!("Failed {} on {}: {}", operation, self.log_description(), e);
                Err(e)
            }
        }
    }
}
