//! One-line status messages for the user. These go to the terminal directly
//! and are separate from `tracing` diagnostics.

use super::style;

pub fn success(message: impl AsRef<str>) {
    println!("{} {}", style::success_style(style::CHECK), message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    eprintln!("{} {}", style::error_style(style::CROSS), style::error_style(message.as_ref()));
}

pub fn info(message: impl AsRef<str>) {
    println!("{} {}", style::title_style(style::INFO), message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    eprintln!("{} {}", style::warning_style(style::WARN), message.as_ref());
}

/// Indented follow-up line, e.g. a remediation step
pub fn hint(message: impl AsRef<str>) {
    eprintln!("   {}", style::muted_style(message.as_ref()));
}

/// `label: value` pair with a dimmed label
pub fn field(label: &str, value: impl AsRef<str>) {
    println!("  {} {}", style::muted_style(format!("{}:", label)), style::normal_style(value.as_ref()));
}

pub fn heading(message: impl AsRef<str>) {
    println!("\n{}", style::title_style(message.as_ref()));
}
