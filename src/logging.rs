//! Console logging for the `detscope` binary.
//!
//! The library only uses the `log` macros; this module installs the `env_logger`
//! backend with a colored `timestamp LEVEL module:line message` format.
//!
//! Log levels:
//! - `RUST_LOG` set: used as-is
//! - Debug builds: DEBUG and above for `detscope`
//! - Release builds: INFO and above for `detscope`
//! - Other crates: off unless `RUST_LOG` enables them

use std::io::Write;
use chrono::Utc;
use env_logger::fmt::{Color, Formatter};
use log::{Level, LevelFilter, Record};

use crate::config::APP_NAME;

/// `module:line` when both are known, falling back to whichever is available
fn module_info(record: &Record) -> String {
    match (record.module_path(), record.line()) {
        (Some(module), Some(line)) => format!("{module}:{line}"),
        (Some(module), None) => module.to_string(),
        (None, Some(line)) => format!("line:{line}"),
        (None, None) => "unknown".to_string(),
    }
}

fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Install the global logger. Returns an error if a logger is already set.
pub fn setup_logger(verbose: bool) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else {
        builder.filter(None, LevelFilter::Off);
        let level = if verbose { LevelFilter::Trace } else { default_level() };
        builder.filter(Some(APP_NAME), level);
    }

    builder.format(|buf: &mut Formatter, record: &Record| {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let mut level_style = buf.style();
        let mut meta_style = buf.style();

        match record.level() {
            Level::Error => level_style.set_color(Color::Red).set_bold(true),
            Level::Warn => level_style.set_color(Color::Yellow).set_bold(true),
            Level::Info => level_style.set_color(Color::Green).set_bold(true),
            Level::Debug => level_style.set_color(Color::Blue).set_bold(true),
            Level::Trace => level_style.set_color(Color::White),
        };

        // Color::Rgb does not render on macOS terminals
        #[cfg(target_os = "macos")]
        {
            meta_style.set_color(Color::Blue);
        }

        #[cfg(not(target_os = "macos"))]
        {
            meta_style.set_color(Color::Rgb(120, 120, 120));
        }

        writeln!(
            buf,
            "{} {:<5} {} {}",
            meta_style.value(timestamp),
            level_style.value(record.level()),
            meta_style.value(module_info(record)),
            record.args()
        )
    });

    builder.try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_info_formats() {
        let record = Record::builder()
            .module_path(Some("detscope::crop"))
            .line(Some(42))
            .build();
        assert_eq!(module_info(&record), "detscope::crop:42");

        let record = Record::builder().module_path(None).line(None).build();
        assert_eq!(module_info(&record), "unknown");
    }
}
