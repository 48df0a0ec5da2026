//! Stable exit codes for deployer CLI commands.

use crate::core::types::Status;

/// Operation finished with `success`, `info`, `warning` or `confirmed`.
pub const OK: i32 = 0;
/// Invalid usage or configuration.
pub const INVALID: i32 = 1;
/// Operation returned `status=error`, or a session ended in failure.
pub const FAILED: i32 = 2;
/// User cancelled (or a session ended before completing).
pub const CANCELLED: i32 = 3;

/// Exit code for an operation result status.
pub fn for_status(status: Status) -> i32 {
    match status {
        Status::Success | Status::Info | Status::Warning | Status::Confirmed => OK,
        Status::Error => FAILED,
        Status::Cancelled => CANCELLED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_is_not_a_failure() {
        assert_eq!(for_status(Status::Warning), OK);
        assert_eq!(for_status(Status::Error), FAILED);
        assert_eq!(for_status(Status::Cancelled), CANCELLED);
    }
}
