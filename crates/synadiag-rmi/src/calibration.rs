//! F54 calibration and capture preparation
//!
//! Raw capacitance reports are only meaningful with baseline relaxation,
//! charge balancing (CBC) and signal clarity (CDM) turned off. The
//! preparation leaves the firmware in a state only a reset undoes, so every
//! caller that prepares must reset afterwards.

use crate::command::{force_cal, force_update};
use crate::registers::f54::{ctrl, F54Info};
use crate::report::{is_amp, skips_cbc_preparation};
use synadiag_core::timing::TimingPolicy;
use synadiag_core::{Error, Result, Transport};

/// Read-modify-write one control register byte
fn update_control<T, F>(t: &mut T, f54: &F54Info, n: u16, f: F) -> Result<bool>
where
    T: Transport + ?Sized,
    F: FnOnce(u8) -> u8,
{
    let Some(addr) = f54.control(n) else {
        return Ok(false);
    };
    let old = t.read_byte(addr)?;
    let new = f(old);
    log::debug!("F54 control {} @0x{:04X}: 0x{:02X} -> 0x{:02X}", n, addr, old, new);
    t.write_byte(addr, new)?;
    Ok(true)
}

/// Set or clear the no-relax bit and apply it
pub fn set_no_relax<T: Transport + ?Sized>(
    t: &mut T,
    f54: &F54Info,
    timing: &TimingPolicy,
    no_relax: bool,
) -> Result<()> {
    update_control(t, f54, 0, |v| {
        if no_relax {
            v | ctrl::NO_RELAX
        } else {
            v & !ctrl::NO_RELAX
        }
    })?;
    force_update(t, f54, timing)
}

/// Turn off charge balancing
pub fn disable_cbc<T: Transport + ?Sized>(t: &mut T, f54: &F54Info) -> Result<()> {
    if f54.query.touch_controller_family() == 1 {
        update_control(t, f54, 7, |v| v & !ctrl::CBC_TX_CARRIER_SELECTION)?;
    } else if f54.query.has_ctrl88() {
        update_control(t, f54, 88, |v| v & !ctrl::CBC_TX_CARRIER_SELECTION_88)?;
    }
    if f54.query.has_0d_acquisition_control() {
        update_control(t, f54, 57, |v| v & !ctrl::CBC_TX_CARRIER_SELECTION)?;
    }
    if f54.query.has_ctrl149() {
        update_control(t, f54, 149, |v| v & !ctrl::TRANS_CBC_GLOBAL_CAP_ENABLE)?;
    }
    Ok(())
}

/// Turn off signal clarity
pub fn disable_cdm<T: Transport + ?Sized>(t: &mut T, f54: &F54Info) -> Result<()> {
    if f54.query.has_signal_clarity() {
        update_control(t, f54, 41, |v| v | ctrl::NO_SIGNAL_CLARITY)?;
    }
    Ok(())
}

/// Start the AMP sensor production test mode
pub fn start_amp_production_test<T: Transport + ?Sized>(
    t: &mut T,
    f54: &F54Info,
    timing: &TimingPolicy,
) -> Result<()> {
    if !update_control(t, f54, 188, |v| v | ctrl::START_PRODUCTION_TEST)? {
        return Err(Error::Unsupported("F54 control 188 not present".into()));
    }
    force_update(t, f54, timing)
}

/// Prepare the firmware for capturing `rt`
///
/// Returns true when registers were changed and a reset is owed.
pub fn prepare<T: Transport + ?Sized>(
    t: &mut T,
    f54: &F54Info,
    timing: &TimingPolicy,
    rt: u8,
) -> Result<bool> {
    if f54.query.skip_preparation() {
        log::debug!("F54: firmware handles preparation itself");
        return Ok(false);
    }
    if is_amp(rt) {
        start_amp_production_test(t, f54, timing)?;
        return Ok(true);
    }
    if skips_cbc_preparation(rt) {
        return Ok(false);
    }

    log::debug!("F54: preparing for report {}", rt);
    set_no_relax(t, f54, timing, true)?;
    disable_cbc(t, f54)?;
    disable_cdm(t, f54)?;
    force_update(t, f54, timing)?;
    force_cal(t, f54, timing)?;
    Ok(true)
}

/// Pin sensing to frequency `gear`
///
/// Every other entry of the control 17 table gets its disable bit.
pub fn set_gear<T: Transport + ?Sized>(
    t: &mut T,
    f54: &F54Info,
    timing: &TimingPolicy,
    gear: u8,
) -> Result<()> {
    let count = f54.query.num_sensing_frequencies();
    let addr = match f54.control(17) {
        Some(addr) if count > 0 => addr,
        _ => return Err(Error::Unsupported("sense frequency control".into())),
    };
    if gear >= count {
        return Err(Error::invalid(format!(
            "gear {} out of range, {} frequencies",
            gear, count
        )));
    }

    let mut table = vec![0u8; count as usize];
    t.read_register(addr, &mut table)?;
    for (i, entry) in table.iter_mut().enumerate() {
        if i == gear as usize {
            *entry &= !ctrl::FREQ_DISABLE;
        } else {
            *entry |= ctrl::FREQ_DISABLE;
        }
    }
    t.write_register(addr, &table)?;
    log::info!("F54: gear {} selected", gear);
    force_update(t, f54, timing)
}
