//! Small shared helpers: freshness formatting and the debounce primitive.

pub mod debounce;
pub mod format;

pub use debounce::Debouncer;
pub use format::{age_display, truncate};
