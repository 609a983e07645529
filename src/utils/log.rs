//! Logging utilities with colored output.
//!
//! This module provides the `log!` macro for formatted terminal output with
//! colored module prefixes. Every long-running part of the process (the sync
//! loop, the HTTP workers, the shutdown coordinator) logs through it, so the
//! output stays line-oriented even when several threads write at once.
//!
//! # Example
//!
//! ```ignore
//! log!("sync"; "cycle {} done, {} new pages", generation, count);
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{IsTerminal, Write, stdout},
    sync::OnceLock,
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<Option<u16>> = OnceLock::new();

/// Length of brackets around module name: "[]"
const BRACKET_LEN: usize = 2;
/// Space after prefix: "[module] " <- this space
const SPACE_AFTER_PREFIX: usize = 1;

/// Calculate total prefix length for a module name.
///
/// Returns: `module.len() + 3` (for `[`, `]`, and trailing space)
#[inline]
const fn calc_prefix_len(module_len: usize) -> usize {
    module_len + BRACKET_LEN + SPACE_AFTER_PREFIX
}

/// Terminal width, cached after first call.
///
/// `None` when stdout is not a terminal (service managers, pipes), in which
/// case lines are never truncated.
fn get_terminal_width() -> Option<u16> {
    *TERMINAL_WIDTH.get_or_init(|| {
        if stdout().is_terminal() {
            Some(size().map(|(w, _)| w).unwrap_or(120))
        } else {
            None
        }
    })
}

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::utils::log::log($module, &format!($($arg)*))
    }};
}

/// Log a message with a colored module prefix.
///
/// Automatically truncates long messages to fit terminal width.
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();

    let message = match get_terminal_width() {
        Some(width) => {
            execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
            let max_msg_len = (width as usize).saturating_sub(calc_prefix_len(module.len()));
            truncate_str(message, max_msg_len)
        }
        None => message,
    };

    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold(),
        "sync" => prefix.bright_green().bold(),
        "fetch" | "compile" => prefix.bright_cyan().bold(),
        "shutdown" => prefix.bright_magenta().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to fit within max_len bytes.
///
/// Ensures the result is valid UTF-8 by finding the nearest character boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
