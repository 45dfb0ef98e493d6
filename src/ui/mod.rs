pub mod report;
pub mod spinner;
pub mod style;

pub use spinner::Spinner;
