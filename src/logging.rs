use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::thread;

// Custom logger structure
#[derive(Debug)]
struct VmLogger {
    level: LevelFilter,
    debug_filters: Option<HashSet<String>>,
}

// Implement the log::Log trait for our custom logger
impl log::Log for VmLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // Check if the record's level is enabled
        if metadata.level() <= self.level {
            // If we have debug filters, check if the target matches any filter
            if let Some(filters) = &self.debug_filters {
                if metadata.level() == log::Level::Debug || metadata.level() == log::Level::Trace {
                    return filters.contains(metadata.target())
                        || filters.iter().any(|f| metadata.target().starts_with(f));
                }
            }
            return true;
        }
        false
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let level_color = match record.level() {
                log::Level::Error => "\x1B[31m", // Red
                log::Level::Warn => "\x1B[33m",  // Yellow
                log::Level::Info => "\x1B[32m",  // Green
                log::Level::Debug => "\x1B[36m", // Cyan
                log::Level::Trace => "\x1B[35m", // Magenta
            };

            let reset = "\x1B[0m";
            let now = Local::now();
            let timestamp = now.format("%H:%M:%S%.3f");

            // VM threads are named vm-N; tag their lines with the instance id
            let mut context = String::new();
            if let Some(id) = thread::current()
                .name()
                .and_then(|name| name.strip_prefix("vm-"))
                .and_then(|id| id.parse::<u32>().ok())
            {
                context.push_str(&format!("[I{:02}] ", id));
            }

            let output = format!(
                "{timestamp} {level_color}{level:5}{reset} {context}{target}: {message}",
                timestamp = timestamp,
                level_color = level_color,
                level = record.level(),
                reset = reset,
                context = context,
                target = record.target(),
                message = record.args()
            );

            let mut stdout = io::stdout();
            writeln!(stdout, "{}", output).expect("Failed to write to stdout");
            stdout.flush().expect("Failed to flush stdout");
        }
    }

    fn flush(&self) {
        io::stdout().flush().expect("Failed to flush stdout");
    }
}

// Use OnceLock instead of unsafe static mut
static LOGGER: OnceLock<VmLogger> = OnceLock::new();

// Initialize the logger with optional debug filters
pub fn init_logger(level: LevelFilter, debug_filter: Option<String>) -> Result<(), SetLoggerError> {
    let debug_filters = debug_filter.map(|filter_str| {
        filter_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect::<HashSet<String>>()
    });

    // Initialize the logger if it hasn't been initialized yet
    if LOGGER.get().is_none() {
        let logger = VmLogger {
            level,
            debug_filters,
        };

        LOGGER.set(logger).expect("Failed to set logger");
    }

    log::set_logger(LOGGER.get().unwrap()).map(|()| log::set_max_level(level))
}

// Helper macros for specific debug topics
#[macro_export]
macro_rules! debug_vm {
    ($($arg:tt)*) => {
        log::debug!(target: "vm", "{}", format_args!($($arg)*))
    }
}

#[macro_export]
macro_rules! debug_port {
    ($($arg:tt)*) => {
        log::debug!(target: "port", "{}", format_args!($($arg)*))
    }
}

#[macro_export]
macro_rules! debug_pipeline {
    ($($arg:tt)*) => {
        log::debug!(target: "pipeline", "{}", format_args!($($arg)*))
    }
}

#[macro_export]
macro_rules! debug_instructions {
    ($($arg:tt)*) => {
        log::debug!(target: "instructions", "{}", format_args!($($arg)*))
    }
}
