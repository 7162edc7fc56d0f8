use std::{
    fs::OpenOptions,
    io::{BufWriter, Write},
    sync::{LazyLock, Mutex},
};

use crate::file_utils;

pub struct LoggingState {
    writer: BufWriter<std::fs::File>,
}

impl LoggingState {
    /// Opens a fresh log file in `<launcher dir>/logs`,
    /// named after the current local time.
    ///
    /// Returns `None` (logging to file disabled) if the
    /// launcher directory or the file can't be created.
    #[must_use]
    pub fn create() -> Option<LoggingState> {
        let launcher_dir = file_utils::get_launcher_dir().ok()?;

        let logs_dir = launcher_dir.join("logs");
        std::fs::create_dir_all(&logs_dir).ok()?;

        let now = chrono::Local::now();
        let log_file_path = logs_dir.join(format!("{}.log", now.format("%Y-%m-%d-%H-%M-%S")));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file_path)
            .ok()?;

        Some(LoggingState {
            writer: BufWriter::new(file),
        })
    }

    pub fn write_str(&mut self, s: &str) {
        _ = self.writer.write_all(s.as_bytes());
    }

    pub fn finish(&mut self) {
        _ = self.writer.flush();
    }
}

pub static LOGGER: LazyLock<Mutex<Option<LoggingState>>> =
    LazyLock::new(|| Mutex::new(LoggingState::create()));

#[doc(hidden)]
pub fn write_to_log(plain_text: &str) {
    if let Ok(mut logger) = LOGGER.lock() {
        if let Some(logger) = &mut *logger {
            logger.write_str(plain_text);
        }
    }
}

/// Flushes the log file. Call this before exiting.
pub fn logger_finish() {
    if let Ok(mut logger) = LOGGER.lock() {
        if let Some(logger) = &mut *logger {
            logger.finish();
        }
    }
}

/// Print an informational message.
/// Saved to a log file.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        let plain_text = format!("[info] {}\n", format_args!($($arg)*));

        if cfg!(windows) {
            print!("{plain_text}");
        } else {
            println!("{} {}", colored::Colorize::yellow("[info]"), format_args!($($arg)*));
        }

        $crate::print::write_to_log(&plain_text);
    }};
}

/// Print an informational message.
/// Not saved to the log file.
#[macro_export]
macro_rules! info_no_log {
    ($($arg:tt)*) => {{
        if cfg!(windows) {
            println!("[info] {}", format_args!($($arg)*));
        } else {
            println!("{} {}", colored::Colorize::yellow("[info]"), format_args!($($arg)*));
        }
    }};
}

/// Print an error message.
/// Saved to a log file.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {{
        let plain_text = format!("[error] {}\n", format_args!($($arg)*));

        if cfg!(windows) {
            eprint!("{plain_text}");
        } else {
            eprintln!("{} {}", colored::Colorize::red("[error]"), format_args!($($arg)*));
        }

        $crate::print::write_to_log(&plain_text);
    }};
}

/// Print a point message, ie. a small step in some process.
/// Saved to a log file.
#[macro_export]
macro_rules! pt {
    ($($arg:tt)*) => {{
        let plain_text = format!("[plain] {}\n", format_args!($($arg)*));

        if cfg!(windows) {
            println!("- {}", format_args!($($arg)*));
        } else {
            println!("{} {}", colored::Colorize::bold("-"), format_args!($($arg)*));
        }

        $crate::print::write_to_log(&plain_text);
    }};
}
