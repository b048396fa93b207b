//! Poll budgets and the bounded poll helper
//!
//! The attempt counts and intervals encode real hardware timing budgets.
//! They are values rather than constants so a configuration file or a
//! test can change them.

use crate::error::{Error, Result};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};

/// A bounded sleep/retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Maximum number of polls
    pub attempts: u32,
    /// Delay between polls in milliseconds
    pub interval_ms: u32,
}

impl PollPolicy {
    /// Create a policy
    pub const fn new(attempts: u32, interval_ms: u32) -> Self {
        Self {
            attempts,
            interval_ms,
        }
    }

    /// Total time the policy may spend sleeping
    pub fn budget_ms(&self) -> u64 {
        self.attempts as u64 * self.interval_ms as u64
    }
}

/// Poll `step` until it yields a value or the budget runs out
///
/// `step` is tried first, then the transport sleeps for the interval before
/// the next try. Errors from `step` abort immediately. Exhaustion returns
/// [`Error::Timeout`] naming `what`.
pub fn poll<X, T, F>(transport: &mut X, policy: PollPolicy, what: &str, mut step: F) -> Result<T>
where
    X: Transport + ?Sized,
    F: FnMut(&mut X) -> Result<Option<T>>,
{
    for attempt in 0..policy.attempts {
        if let Some(value) = step(transport)? {
            if attempt > 0 {
                log::trace!("{} ready after {} polls", what, attempt + 1);
            }
            return Ok(value);
        }
        transport.delay_ms(policy.interval_ms);
    }
    log::error!(
        "Timed out waiting for {} ({} x {} ms)",
        what,
        policy.attempts,
        policy.interval_ms
    );
    Err(Error::Timeout(what.to_string()))
}

/// Every timing budget used by the protocol engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingPolicy {
    /// RMI F54 force update / force cal completion
    pub rmi_command: PollPolicy,
    /// RMI F54 get report completion
    pub rmi_get_report: PollPolicy,
    /// Settle time after an RMI F01 soft reset
    pub rmi_reset_settle_ms: u32,
    /// TCM command response
    pub tcm_response: PollPolicy,
    /// TCM unsolicited report (identify after reset, image frames)
    pub tcm_report: PollPolicy,
    /// Settle time after entering bootloader or application mode
    pub tcm_mode_switch_settle_ms: u32,
    /// Settle time between a TCM flash write and the first poll
    pub tcm_flash_write_settle_ms: u32,
    /// Settle time between a TCM flash erase and the first poll
    pub tcm_flash_erase_settle_ms: u32,
    /// TCM flash erase completion
    pub tcm_flash_erase: PollPolicy,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            rmi_command: PollPolicy::new(10, 100),
            rmi_get_report: PollPolicy::new(150, 20),
            rmi_reset_settle_ms: 100,
            tcm_response: PollPolicy::new(200, 10),
            tcm_report: PollPolicy::new(100, 20),
            tcm_mode_switch_settle_ms: 200,
            tcm_flash_write_settle_ms: 20,
            tcm_flash_erase_settle_ms: 500,
            tcm_flash_erase: PollPolicy::new(500, 20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock {
        elapsed_ms: u64,
    }

    impl Transport for Clock {
        fn read(&mut self, _addr: Option<u16>, buf: &mut [u8]) -> Result<usize> {
            Ok(buf.len())
        }
        fn write(&mut self, _addr: Option<u16>, data: &[u8]) -> Result<usize> {
            Ok(data.len())
        }
        fn set_raw_mode(&mut self, _raw: bool) -> Result<()> {
            Ok(())
        }
        fn set_irq(&mut self, _enable: bool) -> Result<()> {
            Ok(())
        }
        fn hardware_reset(&mut self) -> Result<()> {
            Ok(())
        }
        fn delay_ms(&mut self, ms: u32) {
            self.elapsed_ms += ms as u64;
        }
    }

    #[test]
    fn test_poll_succeeds_on_third_try() {
        let mut clock = Clock { elapsed_ms: 0 };
        let mut tries = 0;
        let v = poll(&mut clock, PollPolicy::new(5, 10), "thing", |_| {
            tries += 1;
            Ok(if tries == 3 { Some(42) } else { None })
        })
        .unwrap();
        assert_eq!(v, 42);
        assert_eq!(clock.elapsed_ms, 20);
    }

    #[test]
    fn test_poll_exhaustion_is_timeout() {
        let mut clock = Clock { elapsed_ms: 0 };
        let policy = PollPolicy::new(10, 100);
        let err = poll(&mut clock, policy, "force cal", |_| Ok(None::<()>)).unwrap_err();
        assert!(matches!(err, Error::Timeout(ref w) if w == "force cal"));
        assert_eq!(clock.elapsed_ms, policy.budget_ms());
    }

    #[test]
    fn test_poll_error_aborts() {
        let mut clock = Clock { elapsed_ms: 0 };
        let err = poll(&mut clock, PollPolicy::new(10, 1), "x", |_| {
            Err::<Option<()>, _>(Error::protocol("bad"))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(clock.elapsed_ms, 0);
    }

    #[test]
    fn test_timing_defaults() {
        let t = TimingPolicy::default();
        assert_eq!(t.rmi_command.budget_ms(), 1000);
        assert_eq!(t.rmi_get_report.budget_ms(), 3000);
    }
}
