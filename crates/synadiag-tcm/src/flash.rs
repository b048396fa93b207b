//! Bootloader flash access
//!
//! Flash is addressed in 16-bit words. Callers address it in write blocks
//! of `write_block_size_words` words; erase works on pages of
//! `erase_page_size_words` words.

use crate::info::BootInfo;
use crate::message;
use crate::protocol::cmd;
use synadiag_core::timing::TimingPolicy;
use synadiag_core::{Error, Result, Transport};

/// Largest word count requested by one read command
const MAX_READ_WORDS: usize = 0x4000;

/// Block and page sizes from the boot info
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    pub block_words: usize,
    pub erase_page_words: usize,
    /// Data bytes per write command, 0 for unlimited
    pub max_write_payload: usize,
}

impl FlashGeometry {
    pub fn from_boot_info(info: &BootInfo) -> Result<Self> {
        if info.write_block_size_words == 0 {
            return Err(Error::invalid("boot info write block size is 0"));
        }
        if info.erase_page_size_words == 0 {
            return Err(Error::invalid("boot info erase page size is 0"));
        }
        Ok(Self {
            block_words: info.write_block_size_words as usize,
            erase_page_words: info.erase_page_size_words as usize,
            max_write_payload: info.max_write_payload_size as usize,
        })
    }

    pub fn block_bytes(&self) -> usize {
        self.block_words * 2
    }

    /// Erase pages per write block, at least 1
    pub fn pages_per_block(&self) -> usize {
        (self.block_words / self.erase_page_words).max(1)
    }

    /// Data bytes per write command, a whole number of blocks
    fn write_chunk_bytes(&self, total: usize) -> usize {
        if self.max_write_payload == 0 {
            return total.max(self.block_bytes());
        }
        let blocks = (self.max_write_payload / self.block_bytes()).max(1);
        blocks * self.block_bytes()
    }
}

fn word_address(block: u32, geometry: &FlashGeometry) -> Result<u32> {
    (block as usize)
        .checked_mul(geometry.block_words)
        .and_then(|w| u32::try_from(w).ok())
        .ok_or_else(|| Error::invalid(format!("flash block {} out of range", block)))
}

/// Program `data` starting at `block`
///
/// A partial final block is padded with 0xFF.
pub fn write<T: Transport + ?Sized>(
    t: &mut T,
    timing: &TimingPolicy,
    max_write_size: usize,
    geometry: &FlashGeometry,
    block: u32,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let block_bytes = geometry.block_bytes();
    let mut padded = data.to_vec();
    padded.resize(data.len().div_ceil(block_bytes) * block_bytes, 0xFF);

    let chunk_bytes = geometry.write_chunk_bytes(padded.len());
    let mut address = word_address(block, geometry)?;
    for chunk in padded.chunks(chunk_bytes) {
        let mut payload = Vec::with_capacity(chunk.len() + 4);
        payload.extend_from_slice(&address.to_le_bytes());
        payload.extend_from_slice(chunk);
        log::debug!("tcm: flash write {} bytes at word 0x{:X}", chunk.len(), address);

        message::write_command(t, cmd::WRITE_FLASH, &payload, max_write_size)?;
        t.delay_ms(timing.tcm_flash_write_settle_ms);
        message::wait_response(t, timing.tcm_response, cmd::WRITE_FLASH)?;
        address += (chunk.len() / 2) as u32;
    }
    Ok(())
}

/// Erase `count` blocks starting at `block`
///
/// `wide_format` selects the 4-byte `[first LE16, count LE16]` payload
/// instead of `[first, count]`.
pub fn erase<T: Transport + ?Sized>(
    t: &mut T,
    timing: &TimingPolicy,
    max_write_size: usize,
    geometry: &FlashGeometry,
    block: u32,
    count: u32,
    wide_format: bool,
) -> Result<()> {
    let ratio = geometry.pages_per_block();
    let first = block as usize * ratio;
    let pages = (count as usize * ratio).max(1);

    let payload = if wide_format {
        let first = u16::try_from(first)
            .map_err(|_| Error::invalid(format!("erase page {} out of range", first)))?;
        let pages = u16::try_from(pages)
            .map_err(|_| Error::invalid(format!("erase count {} out of range", pages)))?;
        let mut p = first.to_le_bytes().to_vec();
        p.extend_from_slice(&pages.to_le_bytes());
        p
    } else {
        let first = u8::try_from(first)
            .map_err(|_| Error::invalid(format!("erase page {} needs the wide format", first)))?;
        let pages = u8::try_from(pages)
            .map_err(|_| Error::invalid(format!("erase count {} needs the wide format", pages)))?;
        vec![first, pages]
    };

    log::info!("tcm: erasing {} pages from page {}", pages, first);
    message::write_command(t, cmd::ERASE_FLASH, &payload, max_write_size)?;
    t.delay_ms(timing.tcm_flash_erase_settle_ms);
    message::wait_response(t, timing.tcm_flash_erase, cmd::ERASE_FLASH)?;
    Ok(())
}

/// Read flash starting at `block` into `buf`, returning bytes copied
pub fn read<T: Transport + ?Sized>(
    t: &mut T,
    timing: &TimingPolicy,
    max_write_size: usize,
    geometry: &FlashGeometry,
    block: u32,
    buf: &mut [u8],
) -> Result<usize> {
    let mut address = word_address(block, geometry)?;
    let mut copied = 0;
    for chunk in buf.chunks_mut(MAX_READ_WORDS * 2) {
        let words = chunk.len().div_ceil(2) as u16;
        let mut payload = address.to_le_bytes().to_vec();
        payload.extend_from_slice(&words.to_le_bytes());

        let data = message::command(t, timing.tcm_response, cmd::READ_FLASH, &payload, max_write_size)?;
        let n = data.len().min(chunk.len());
        chunk[..n].copy_from_slice(&data[..n]);
        copied += n;
        if n < chunk.len() {
            log::warn!("tcm: flash read returned {} of {} bytes", n, chunk.len());
            break;
        }
        address += words as u32;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synadiag_dummy::tcm::{cmd as dcmd, MODE_BOOTLOADER};
    use synadiag_dummy::{DummyTcm, DummyTcmConfig};

    fn bootloader() -> DummyTcm {
        DummyTcm::with_config(DummyTcmConfig {
            start_in_bootloader: true,
            ..Default::default()
        })
    }

    fn geometry() -> FlashGeometry {
        FlashGeometry {
            block_words: 32,
            erase_page_words: 16,
            max_write_payload: 128,
        }
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let mut info = BootInfo::parse(&[]);
        assert!(FlashGeometry::from_boot_info(&info).is_err());
        info.write_block_size_words = 32;
        assert!(FlashGeometry::from_boot_info(&info).is_err());
        info.erase_page_size_words = 16;
        assert_eq!(FlashGeometry::from_boot_info(&info).unwrap().pages_per_block(), 2);
    }

    #[test]
    fn test_write_chunks_on_block_boundaries() {
        let mut dev = bootloader();
        assert_eq!(dev.mode(), MODE_BOOTLOADER);
        let timing = TimingPolicy::default();
        let data: Vec<u8> = (0..300).map(|i| i as u8).collect();
        write(&mut dev, &timing, 64, &geometry(), 2, &data).unwrap();

        // 300 bytes pad to 5 blocks of 64, sent as 128 + 128 + 64
        assert_eq!(dev.count_commands(dcmd::WRITE_FLASH), 3);
        let start = 2 * 64;
        assert_eq!(&dev.flash()[start..start + 300], &data[..]);
        assert!(dev.flash()[start + 300..start + 320].iter().all(|&b| b == 0xFF));
        assert!(dev.elapsed_ms() >= 3 * timing.tcm_flash_write_settle_ms as u64);
    }

    #[test]
    fn test_read_back() {
        let mut dev = bootloader();
        dev.flash_mut()[64..70].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        let mut buf = [0u8; 5];
        let n = read(&mut dev, &TimingPolicy::default(), 0, &geometry(), 1, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_erase_formats() {
        let mut dev = bootloader();
        dev.flash_mut()[..256].fill(0);
        let timing = TimingPolicy::default();
        // block 1 for 1 block: pages 2..4, bytes 64..128
        erase(&mut dev, &timing, 0, &geometry(), 1, 1, false).unwrap();
        assert!(dev.flash()[64..128].iter().all(|&b| b == 0xFF));
        assert_eq!(dev.flash()[63], 0);
        assert_eq!(dev.flash()[128], 0);

        erase(&mut dev, &timing, 0, &geometry(), 3, 0, true).unwrap();
        // count 0 still erases one page
        assert!(dev.flash()[192..224].iter().all(|&b| b == 0xFF));
        assert_eq!(dev.flash()[224], 0);
    }

    #[test]
    fn test_narrow_erase_range_checked() {
        let mut dev = bootloader();
        let err = erase(&mut dev, &TimingPolicy::default(), 0, &geometry(), 200, 1, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert!(dev.commands().is_empty());
    }
}
