//! RMI production test settings

use serde::{Deserialize, Serialize};

/// Frame counts of the multi-frame production tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RmiTestConfig {
    /// Delta frames captured by the noise test (report 2)
    pub noise_frames: u32,
    /// Frames scanned for the peak by the abs hybrid delta test (report 59)
    pub abs_delta_frames: u32,
    /// Frames averaged by the abs hybrid raw test (report 63)
    pub abs_raw_frames: u32,
}

impl Default for RmiTestConfig {
    fn default() -> Self {
        Self {
            noise_frames: 20,
            abs_delta_frames: 100,
            abs_raw_frames: 10,
        }
    }
}
