//! F1A: 0D capacitive buttons

use crate::pdt::FunctionDescriptor;
use synadiag_core::{Result, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F1aInfo {
    pub fd: FunctionDescriptor,
    pub button_count: usize,
}

impl F1aInfo {
    pub fn parse<T: Transport + ?Sized>(t: &mut T, fd: FunctionDescriptor) -> Result<Self> {
        let q0 = t.read_byte(fd.query_base)?;
        let button_count = (q0 & 0x07) as usize + 1;
        log::debug!("F1A: {} buttons", button_count);
        Ok(Self { fd, button_count })
    }
}
