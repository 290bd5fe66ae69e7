//! Errors raised by the hosting runtime.

use pagekeep_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The install handler failed outright; the instance is redundant.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(#[source] Error),

    /// No instance with this id is known to the registration.
    #[error("UNKNOWN_WORKER: {0}")]
    UnknownWorker(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistrationError::InstallFailed(Error::Network("offline".into()));
        assert!(err.to_string().contains("INSTALL_FAILED"));
        assert!(err.to_string().contains("offline"));
    }
}
