//! Page Description Table scan
//!
//! Each register page may carry a descending list of 6-byte function
//! descriptors starting at 0xE9. A descriptor with function number 0x00
//! (or 0xFF, erased) ends the page, and a page without any descriptor ends
//! the scan.

use synadiag_core::{Error, Result, Transport};

/// Number of register pages scanned
pub const PDT_PAGES: u16 = 6;
/// Address of the first descriptor within a page
pub const PDT_START: u16 = 0x00E9;
/// Lowest descriptor address within a page
pub const PDT_END: u16 = 0x000A;
/// Size of one descriptor
pub const PDT_ENTRY_SIZE: u16 = 6;

/// Function numbers this driver understands
pub mod function {
    pub const F01: u8 = 0x01;
    pub const F11: u8 = 0x11;
    pub const F12: u8 = 0x12;
    pub const F1A: u8 = 0x1A;
    pub const F34: u8 = 0x34;
    pub const F54: u8 = 0x54;
    pub const F55: u8 = 0x55;
}

const KNOWN_FUNCTIONS: &[u8] = &[
    function::F01,
    function::F11,
    function::F12,
    function::F1A,
    function::F34,
    function::F54,
    function::F55,
];

/// One discovered function block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub number: u8,
    pub query_base: u16,
    pub command_base: u16,
    pub control_base: u16,
    pub data_base: u16,
    pub version: u8,
    /// Number of interrupt sources owned by the function
    pub interrupt_count: u8,
    /// Position of the function's first interrupt bit
    pub interrupt_offset: u8,
}

impl FunctionDescriptor {
    /// Decode a raw descriptor found on `page`
    pub fn parse(page: u16, raw: &[u8; 6], interrupt_offset: u8) -> Self {
        let base = page << 8;
        Self {
            number: raw[5],
            query_base: base | raw[0] as u16,
            command_base: base | raw[1] as u16,
            control_base: base | raw[2] as u16,
            data_base: base | raw[3] as u16,
            version: (raw[4] >> 5) & 0x03,
            interrupt_count: raw[4] & 0x07,
            interrupt_offset,
        }
    }

    /// Bits of this function in the F01 interrupt enable/status registers
    pub fn interrupt_mask(&self) -> u32 {
        if self.interrupt_count == 0 {
            return 0;
        }
        ((1u32 << self.interrupt_count) - 1) << self.interrupt_offset
    }
}

/// Result of a PDT scan
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageDescriptorTable {
    functions: Vec<FunctionDescriptor>,
    interrupt_sources: u8,
}

impl PageDescriptorTable {
    /// Walk every page and collect known functions
    pub fn scan<T: Transport + ?Sized>(transport: &mut T) -> Result<Self> {
        let mut table = Self::default();

        for page in 0..PDT_PAGES {
            let mut found_on_page = false;
            let mut addr = PDT_START;
            while addr >= PDT_END {
                let mut raw = [0u8; 6];
                transport.read_register((page << 8) | addr, &mut raw)?;
                let number = raw[5];
                if number == 0x00 || number == 0xFF {
                    break;
                }
                found_on_page = true;

                let fd = FunctionDescriptor::parse(page, &raw, table.interrupt_sources);
                table.interrupt_sources += fd.interrupt_count;
                if KNOWN_FUNCTIONS.contains(&number) {
                    log::debug!(
                        "PDT: F{:02X} v{} query=0x{:04X} cmd=0x{:04X} ctrl=0x{:04X} data=0x{:04X} irq={}@{}",
                        fd.number,
                        fd.version,
                        fd.query_base,
                        fd.command_base,
                        fd.control_base,
                        fd.data_base,
                        fd.interrupt_count,
                        fd.interrupt_offset
                    );
                    table.functions.push(fd);
                } else {
                    log::debug!("PDT: skipping unknown function F{:02X}", number);
                }
                addr -= PDT_ENTRY_SIZE;
            }
            if !found_on_page {
                break;
            }
        }

        log::info!(
            "PDT scan found {} functions, {} interrupt sources",
            table.functions.len(),
            table.interrupt_sources
        );
        Ok(table)
    }

    pub fn get(&self, number: u8) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.number == number)
    }

    /// Descriptor of a mandatory function
    pub fn require(&self, number: u8) -> Result<&FunctionDescriptor> {
        self.get(number).ok_or(Error::MissingFunction(number))
    }

    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// Total interrupt sources across all functions
    pub fn interrupt_sources(&self) -> u8 {
        self.interrupt_sources
    }
}
