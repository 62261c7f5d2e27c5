use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Status,
    Warning,
    Error,
}

/// write a single line at the given level
/// status and info go to stdout, warnings and errors to stderr
pub fn emit(level: Level, message: &str) {
    match level {
        Level::Info => {
            let _ = writeln!(io::stdout(), "{message}");
        }
        Level::Status => {
            let _ = writeln!(io::stdout(), "{}", message.green());
        }
        Level::Warning => {
            let _ = writeln!(io::stderr(), "{}", message.yellow());
        }
        Level::Error => {
            let _ = writeln!(io::stderr(), "{}", message.red());
        }
    }
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        $crate::ui::emit($crate::ui::Level::Warning, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::ui::emit($crate::ui::Level::Error, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! status {
    ($($arg:tt)*) => {
        $crate::ui::emit($crate::ui::Level::Status, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! info {
    () => {
        $crate::ui::emit($crate::ui::Level::Info, "")
    };
    ($($arg:tt)*) => {
        $crate::ui::emit($crate::ui::Level::Info, &format!($($arg)*))
    };
}

/// loud multi-line banner for conditions that put user data at risk
pub fn alarm(title: &str, body: &str) {
    let rule = "=".repeat(72);
    let mut stderr = io::stderr();
    let _ = writeln!(stderr, "{}", rule.red().bold());
    let _ = writeln!(stderr, "{}", title.red().bold());
    let _ = writeln!(stderr, "{}", rule.red().bold());
    for line in body.lines() {
        let _ = writeln!(stderr, "{}", line.red());
    }
    let _ = writeln!(stderr, "{}", rule.red().bold());
}

/// spinner shown while linters run; hidden when stderr isn't a terminal
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        if !io::stderr().is_terminal() {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
