use crossterm::style::{style as styled, Color, StyledContent, Stylize};
use std::fmt::Display;

// Color palette
pub const ACCENT_PRIMARY: Color = Color::Rgb { r: 0, g: 200, b: 255 }; // Cyan
pub const TEXT_PRIMARY: Color = Color::Rgb { r: 230, g: 230, b: 240 };
pub const TEXT_MUTED: Color = Color::Rgb { r: 150, g: 150, b: 170 };
pub const SUCCESS: Color = Color::Green;
pub const WARNING: Color = Color::Yellow;
pub const ERROR: Color = Color::Red;

// Symbols
pub const CHECK: &str = "✓";
pub const CROSS: &str = "✗";
pub const INFO: &str = "ℹ";
pub const WARN: &str = "⚠";
pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn title_style<D: Display>(content: D) -> StyledContent<D> {
    styled(content).with(ACCENT_PRIMARY).bold()
}

pub fn normal_style<D: Display>(content: D) -> StyledContent<D> {
    styled(content).with(TEXT_PRIMARY)
}

pub fn muted_style<D: Display>(content: D) -> StyledContent<D> {
    styled(content).with(TEXT_MUTED)
}

pub fn success_style<D: Display>(content: D) -> StyledContent<D> {
    styled(content).with(SUCCESS)
}

pub fn warning_style<D: Display>(content: D) -> StyledContent<D> {
    styled(content).with(WARNING)
}

pub fn error_style<D: Display>(content: D) -> StyledContent<D> {
    styled(content).with(ERROR)
}
