//! Shared error-code contract.
//!
//! Each module owns its own `thiserror` enum; this trait gives all of them a
//! stable, grepable code so a host can map failures without matching on
//! message text.

/// Grepable error code and retryable flag for editor errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
