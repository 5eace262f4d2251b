//! Exit codes for the CLI

use extpilot_stores::{ErrorKind, StoreError};

use crate::config::ConfigError;

/// Success
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Bad arguments or configuration
pub const USAGE_ERROR: i32 = 2;

/// Credentials rejected or unusable
pub const AUTH_ERROR: i32 = 3;

/// Network or file system failure
pub const TRANSPORT_ERROR: i32 = 4;

/// Store answered with something unexpected
pub const PROTOCOL_ERROR: i32 = 5;

/// Store rejected the package
pub const VALIDATION_ERROR: i32 = 6;

/// Polling ran out of time
pub const TIMEOUT: i32 = 7;

/// Item or version does not exist
pub const NOT_FOUND: i32 = 8;

/// User cancelled
pub const CANCELLED: i32 = 130;

/// Exit code for a store error kind
pub fn for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Auth => AUTH_ERROR,
        ErrorKind::Transport => TRANSPORT_ERROR,
        ErrorKind::Protocol => PROTOCOL_ERROR,
        ErrorKind::ValidationFailed => VALIDATION_ERROR,
        ErrorKind::Timeout => TIMEOUT,
        ErrorKind::NotFound => NOT_FOUND,
        ErrorKind::Cancelled => CANCELLED,
        ErrorKind::Usage => USAGE_ERROR,
    }
}

/// Exit code for the first recognised error in the chain
pub fn for_error(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(store_error) = cause.downcast_ref::<StoreError>() {
            return for_kind(store_error.kind());
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return USAGE_ERROR;
        }
    }
    ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_store_errors_map_through_context() {
        let err: anyhow::Result<()> = Err(StoreError::Timeout("signing".into()).into());
        let err = err.context("sign failed").unwrap_err();
        assert_eq!(for_error(&err), TIMEOUT);

        let err = anyhow::Error::from(StoreError::AuthenticationFailed("nope".into()));
        assert_eq!(for_error(&err), AUTH_ERROR);

        let err = anyhow::Error::from(StoreError::ValidationFailed("bad".into()));
        assert_eq!(for_error(&err), VALIDATION_ERROR);
    }

    #[test]
    fn test_config_errors_are_usage_errors() {
        let err = anyhow::Error::from(ConfigError::InvalidValue {
            field: "edge.poll_interval_secs".into(),
            message: "must be positive".into(),
        });
        assert_eq!(for_error(&err), USAGE_ERROR);
    }

    #[test]
    fn test_unknown_errors_are_general() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(for_error(&err), ERROR);
    }

    #[test]
    fn test_every_failure_is_non_zero() {
        for kind in [
            ErrorKind::Auth,
            ErrorKind::Transport,
            ErrorKind::Protocol,
            ErrorKind::ValidationFailed,
            ErrorKind::Timeout,
            ErrorKind::NotFound,
            ErrorKind::Cancelled,
            ErrorKind::Usage,
        ] {
            assert_ne!(for_kind(kind), SUCCESS);
        }
    }
}
