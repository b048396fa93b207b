//! Session configuration
//!
//! Loaded from TOML. Every field is optional; missing ones take the
//! defaults the engines were tuned with.
//!
//! ```toml
//! candidates = ["/dev/tcm0"]
//!
//! [timing]
//! tcm_mode_switch_settle_ms = 300
//!
//! [timing.tcm_response]
//! attempts = 400
//! interval_ms = 10
//!
//! [tcm]
//! bit_order = "lsb0"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use synadiag_core::timing::TimingPolicy;

/// Device nodes probed by `find_device` when none are configured
pub const DEFAULT_CANDIDATES: &[&str] = &["/dev/rmi0", "/dev/rmi1", "/dev/tcm0", "/dev/tcm1"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Poll budgets and settle delays
    pub timing: TimingPolicy,
    /// RMI production test frame counts
    #[cfg(feature = "rmi")]
    pub rmi: synadiag_rmi::RmiTestConfig,
    /// TCM bit order and static config layout
    #[cfg(feature = "tcm")]
    pub tcm: synadiag_tcm::TcmOptions,
    /// Device nodes probed by `find_device`, in order
    pub candidates: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timing: TimingPolicy::default(),
            #[cfg(feature = "rmi")]
            rmi: Default::default(),
            #[cfg(feature = "tcm")]
            tcm: Default::default(),
            candidates: DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SessionConfig {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(SessionConfig::from_toml_str("").unwrap(), SessionConfig::default());
    }

    #[test]
    fn test_partial_timing_override() {
        let config = SessionConfig::from_toml_str(
            r#"
            candidates = ["dummy-tcm"]

            [timing]
            tcm_mode_switch_settle_ms = 300

            [timing.tcm_response]
            attempts = 400
            interval_ms = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.candidates, vec!["dummy-tcm".to_string()]);
        assert_eq!(config.timing.tcm_mode_switch_settle_ms, 300);
        assert_eq!(config.timing.tcm_response.attempts, 400);
        assert_eq!(
            config.timing.rmi_get_report,
            TimingPolicy::default().rmi_get_report
        );
    }

    #[cfg(feature = "tcm")]
    #[test]
    fn test_tcm_options() {
        use synadiag_core::bits::BitOrder;
        let config = SessionConfig::from_toml_str(
            r#"
            [tcm]
            bit_order = "lsb0"
            trx_bitmap_bytes = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.tcm.bit_order, BitOrder::Lsb0);
        assert_eq!(config.tcm.trx_pins(), 56);
    }

    #[test]
    fn test_unknown_type_is_parse_error() {
        assert!(matches!(
            SessionConfig::from_toml_str("candidates = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            SessionConfig::from_toml_file("/nonexistent/synadiag.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}
