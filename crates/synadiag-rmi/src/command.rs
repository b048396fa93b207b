//! F54 command register protocol
//!
//! Commands are started by setting a bit in the F54 command register. The
//! firmware clears the bit when the command completes.

use crate::registers::f54::F54Info;
use bitflags::bitflags;
use synadiag_core::timing::{poll, PollPolicy, TimingPolicy};
use synadiag_core::{Result, Transport};

bitflags! {
    /// F54 command register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct F54Command: u8 {
        const GET_REPORT = 1 << 0;
        const FORCE_CAL = 1 << 1;
        const FORCE_UPDATE = 1 << 2;
    }
}

impl F54Command {
    fn name(self) -> &'static str {
        if self == Self::GET_REPORT {
            "F54 get report"
        } else if self == Self::FORCE_CAL {
            "F54 force cal"
        } else if self == Self::FORCE_UPDATE {
            "F54 force update"
        } else {
            "F54 command"
        }
    }
}

/// Poll until every bit of `command` reads back clear
pub fn wait_clear<T: Transport + ?Sized>(
    t: &mut T,
    f54: &F54Info,
    command: F54Command,
    policy: PollPolicy,
) -> Result<()> {
    let addr = f54.command_addr();
    poll(t, policy, command.name(), |t| {
        let value = F54Command::from_bits_retain(t.read_byte(addr)?);
        Ok((!value.intersects(command)).then_some(()))
    })
}

/// Write `command` and wait for it to complete
pub fn issue<T: Transport + ?Sized>(
    t: &mut T,
    f54: &F54Info,
    command: F54Command,
    policy: PollPolicy,
) -> Result<()> {
    log::debug!("{}", command.name());
    t.write_byte(f54.command_addr(), command.bits())?;
    wait_clear(t, f54, command, policy)
}

/// Apply pending control register writes
pub fn force_update<T: Transport + ?Sized>(
    t: &mut T,
    f54: &F54Info,
    timing: &TimingPolicy,
) -> Result<()> {
    issue(t, f54, F54Command::FORCE_UPDATE, timing.rmi_command)
}

/// Recalibrate the baseline
pub fn force_cal<T: Transport + ?Sized>(
    t: &mut T,
    f54: &F54Info,
    timing: &TimingPolicy,
) -> Result<()> {
    issue(t, f54, F54Command::FORCE_CAL, timing.rmi_command)
}
