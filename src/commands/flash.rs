//! Flash read, write and erase commands

use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use synadiag_session::DeviceManager;

/// Flash blocks transferred per progress step
const BLOCKS_PER_CHUNK: usize = 16;

fn progress_bar(total: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Bytes per progress step; whole blocks so each chunk starts on a block
fn chunk_size(mgr: &mut DeviceManager) -> Result<usize, Box<dyn std::error::Error>> {
    let block = mgr.flash_block_size()?;
    if block == 0 {
        return Err("device reports a zero flash block size".into());
    }
    Ok(block * BLOCKS_PER_CHUNK)
}

/// Read `length` bytes starting at `block` into `output`
pub fn run_read(
    mgr: &mut DeviceManager,
    block: u32,
    length: usize,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let chunk = chunk_size(mgr)?;
    let mut data = vec![0u8; length];

    let pb = progress_bar(length as u64)?;
    let mut offset = 0usize;
    let mut next_block = block;
    while offset < length {
        let n = chunk.min(length - offset);
        let read = mgr.flash_read(next_block, &mut data[offset..offset + n])?;
        if read < n {
            data.truncate(offset + read);
            break;
        }
        offset += n;
        next_block += BLOCKS_PER_CHUNK as u32;
        pb.set_position(offset as u64);
    }
    pb.finish_with_message("Read complete");

    let mut file = File::create(output)?;
    file.write_all(&data)?;
    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}

/// Program `input` starting at `block`
pub fn run_write(
    mgr: &mut DeviceManager,
    block: u32,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let chunk = chunk_size(mgr)?;
    println!("Writing {} bytes from {:?}", data.len(), input);

    let pb = progress_bar(data.len() as u64)?;
    let mut next_block = block;
    let mut written = 0usize;
    for part in data.chunks(chunk) {
        mgr.flash_write(next_block, part)?;
        written += part.len();
        next_block += BLOCKS_PER_CHUNK as u32;
        pb.set_position(written as u64);
    }
    pb.finish_with_message("Write complete");
    Ok(())
}

/// Erase `count` blocks starting at `block`
pub fn run_erase(
    mgr: &mut DeviceManager,
    block: u32,
    count: u32,
    wide: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Erasing {} blocks from {}", count, block));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    let result = mgr.flash_erase(block, count, wide);
    pb.finish_and_clear();
    result?;
    println!("Erased {} blocks from {}", count, block);
    Ok(())
}

#[cfg(all(test, feature = "dummy", feature = "tcm"))]
mod tests {
    use super::*;
    use synadiag_session::SessionConfig;

    #[test]
    fn test_write_then_read_back() {
        let dir = std::env::temp_dir().join(format!("synadiag-flash-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.bin");
        let output = dir.join("out.bin");
        // Covers two chunks and a partial block
        let data: Vec<u8> = (0..2100u32).map(|i| (i % 251) as u8).collect();
        fs::write(&input, &data).unwrap();

        let mut mgr = DeviceManager::new(SessionConfig::default());
        mgr.open_device("dummy-tcm").unwrap();
        run_erase(&mut mgr, 0, 64, false).unwrap();
        run_write(&mut mgr, 0, &input).unwrap();
        run_read(&mut mgr, 0, data.len(), &output).unwrap();

        assert_eq!(fs::read(&output).unwrap(), data);
        fs::remove_dir_all(&dir).unwrap();
    }
}
