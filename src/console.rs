//! User-facing status lines.
//!
//! Status text is upper-cased and coloured by tone: blue for progress,
//! yellow for warnings, red for errors, green for success. Colour is
//! skipped when `NO_COLOR` is set or stderr is not a terminal. Lines go to
//! stderr so stdout stays free for data.

use std::{
    env,
    io::{self, IsTerminal},
};

use crate::report::{Severity, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Progress,
    Warning,
    Error,
    Success,
}

impl Tone {
    fn ansi_code(self) -> &'static str {
        match self {
            Tone::Progress => "34",
            Tone::Warning => "33",
            Tone::Error => "31",
            Tone::Success => "32",
        }
    }
}

pub fn format_line(tone: Tone, message: &str, color: bool) -> String {
    let text = message.to_uppercase();
    if color {
        format!("\x1b[{}m{text}\x1b[0m", tone.ansi_code())
    } else {
        text
    }
}

pub fn announce(tone: Tone, message: &str) {
    eprintln!("{}", format_line(tone, message, colors_enabled()));
}

pub fn announce_report(report: &ValidationReport) {
    for entry in report {
        let tone = match entry.severity {
            Severity::Error => Tone::Error,
            Severity::Warning => Tone::Warning,
        };
        announce(tone, &entry.to_string());
    }
}

fn colors_enabled() -> bool {
    env::var_os("NO_COLOR").is_none() && io::stderr().is_terminal()
}
