//! Leveled, colorized logging plus a warn-once dedup helper so a large
//! project tree doesn't flood stderr with the same warning per file.
//! Grounded on the teacher's `fortitude::logging` (`set_up_logging`,
//! `warn_user_once_by_id`/`warn_user_once_by_message`).

use std::sync::{LazyLock, Mutex};

use anyhow::Result;
use colored::Colorize;
use log::Level;
use rustc_hash::FxHashSet;

pub static MESSAGES: LazyLock<Mutex<FxHashSet<String>>> = LazyLock::new(Mutex::default);

/// Warn once per distinct message content (e.g. "no layer resolved for
/// src/misc/script.py" should only print once even across many files that
/// share the same text).
#[macro_export]
macro_rules! warn_user_once_by_message {
    ($($arg:tt)*) => {{
        use colored::Colorize;
        use log::warn;

        if let Ok(mut seen) = $crate::logging::MESSAGES.lock() {
            let message = format!("{}", format_args!($($arg)*));
            if !seen.contains(&message) {
                warn!("{}", message.bold());
                seen.insert(message);
            }
        }
    }};
}

#[macro_export]
macro_rules! warn_user {
    ($($arg:tt)*) => {{
        use colored::Colorize;
        use log::warn;
        warn!("{}", format!("{}", format_args!($($arg)*)).bold());
    }};
}

#[derive(Debug, Default, PartialOrd, Ord, PartialEq, Eq, Copy, Clone)]
pub enum LogLevel {
    Silent,
    Quiet,
    #[default]
    Default,
    Verbose,
}

impl LogLevel {
    const fn level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Default => log::LevelFilter::Info,
            LogLevel::Verbose => log::LevelFilter::Debug,
            LogLevel::Quiet | LogLevel::Silent => log::LevelFilter::Off,
        }
    }
}

pub fn set_up_logging(level: LogLevel) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| match record.level() {
            Level::Error => out.finish(format_args!("{}{} {}", "error".red().bold(), ":".bold(), message)),
            Level::Warn => out.finish(format_args!("{}{} {}", "warning".yellow().bold(), ":".bold(), message)),
            Level::Info | Level::Debug | Level::Trace => out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            )),
        })
        .level(level.level_filter())
        .level_for("globset", log::LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::LogLevel;

    #[test]
    fn test_log_levels_order_silent_below_verbose() {
        assert!(LogLevel::Verbose > LogLevel::Default);
        assert!(LogLevel::Default > LogLevel::Silent);
        assert!(LogLevel::Quiet > LogLevel::Silent);
    }
}
