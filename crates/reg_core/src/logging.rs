//! Tracing subscriber setup for binaries and tests embedding the crate

use tracing_subscriber::EnvFilter;

use crate::errors::{RegressionError, Result};

/// Install a global fmt subscriber filtered by `filter` (e.g. `"tabreg_core=debug"`).
///
/// Returns `Config` if the filter does not parse or a global subscriber is
/// already installed; the existing subscriber stays in place.
pub fn init_tracing(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| RegressionError::Config(format!("Invalid tracing filter {}: {}", filter, e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| RegressionError::Config(format!("Failed to install tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_an_error_not_a_panic() {
        let _ = init_tracing("info");
        assert!(matches!(init_tracing("info"), Err(RegressionError::Config(_))));
    }

    #[test]
    fn malformed_filter_is_rejected() {
        assert!(init_tracing("tabreg_core=loud").is_err());
    }
}
