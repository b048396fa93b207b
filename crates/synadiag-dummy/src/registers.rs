//! Flat register file

use synadiag_core::{Result, Transport};

const MEMORY_SIZE: usize = 0x1_0000;

/// 64 KiB of zero-initialised registers with no side effects
///
/// Reads past the end of the address space return zeros, writes past it are
/// dropped.
#[derive(Clone)]
pub struct DummyRegisters {
    memory: Vec<u8>,
    elapsed_ms: u64,
}

impl Default for DummyRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyRegisters {
    pub fn new() -> Self {
        Self {
            memory: vec![0; MEMORY_SIZE],
            elapsed_ms: 0,
        }
    }

    /// Copy `data` into memory starting at `addr`
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        let end = (start + data.len()).min(MEMORY_SIZE);
        self.memory[start..end].copy_from_slice(&data[..end - start]);
    }

    pub fn peek(&self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    pub fn slice(&self, addr: u16, len: usize) -> &[u8] {
        let start = addr as usize;
        &self.memory[start..(start + len).min(MEMORY_SIZE)]
    }

    /// Total time spent in [`Transport::delay_ms`]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub(crate) fn read_into(&self, addr: u16, buf: &mut [u8]) {
        let start = addr as usize;
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.memory.get(start + i).copied().unwrap_or(0);
        }
    }

    pub(crate) fn add_delay(&mut self, ms: u32) {
        self.elapsed_ms += ms as u64;
    }
}

impl Transport for DummyRegisters {
    fn read(&mut self, addr: Option<u16>, buf: &mut [u8]) -> Result<usize> {
        self.read_into(addr.unwrap_or(0), buf);
        Ok(buf.len())
    }

    fn write(&mut self, addr: Option<u16>, data: &[u8]) -> Result<usize> {
        self.load(addr.unwrap_or(0), data);
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
        self.add_delay(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_read_back() {
        let mut regs = DummyRegisters::new();
        regs.load(0x1234, &[1, 2, 3]);
        let mut buf = [0u8; 4];
        regs.read_register(0x1233, &mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);
    }

    #[test]
    fn test_end_of_address_space() {
        let mut regs = DummyRegisters::new();
        regs.load(0xFFFF, &[7, 8]);
        assert_eq!(regs.peek(0xFFFF), 7);
        let mut buf = [0xAAu8; 2];
        regs.read_register(0xFFFF, &mut buf).unwrap();
        assert_eq!(buf, [7, 0]);
    }

    #[test]
    fn test_delay_is_virtual() {
        let mut regs = DummyRegisters::new();
        regs.delay_ms(250);
        regs.delay_ms(50);
        assert_eq!(regs.elapsed_ms(), 300);
    }
}
