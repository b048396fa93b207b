//! Command framing and response polling

use crate::protocol::*;
use synadiag_core::timing::{poll, PollPolicy};
use synadiag_core::{Error, Result, Transport};

/// A decoded message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub marker: u8,
    pub code: u8,
    pub length: usize,
}

impl Header {
    pub fn parse(raw: [u8; HEADER_SIZE]) -> Self {
        Self {
            marker: raw[0],
            code: raw[1],
            length: u16::from_le_bytes([raw[2], raw[3]]) as usize,
        }
    }

    pub fn is_report(&self) -> bool {
        self.code >= report::FIRST
    }
}

/// Split a command into FIFO writes
///
/// The first chunk carries the command code and length. Later chunks start
/// with [`cmd::CONTINUE_WRITE`]. `max_write_size == 0` means unlimited.
pub fn encode_command(command: u8, payload: &[u8], max_write_size: usize) -> Result<Vec<Vec<u8>>> {
    let length = u16::try_from(payload.len())
        .map_err(|_| Error::invalid(format!("command payload too long: {} bytes", payload.len())))?;
    let mut first = Vec::with_capacity(payload.len() + 3);
    first.push(command);
    first.extend_from_slice(&length.to_le_bytes());

    if max_write_size == 0 || payload.len() + 3 <= max_write_size {
        first.extend_from_slice(payload);
        return Ok(vec![first]);
    }
    if max_write_size < 4 {
        return Err(Error::invalid(format!("max write size {} too small", max_write_size)));
    }

    let head = max_write_size - 3;
    first.extend_from_slice(&payload[..head]);
    let mut chunks = vec![first];
    for part in payload[head..].chunks(max_write_size - 1) {
        let mut chunk = Vec::with_capacity(part.len() + 1);
        chunk.push(cmd::CONTINUE_WRITE);
        chunk.extend_from_slice(part);
        chunks.push(chunk);
    }
    Ok(chunks)
}

/// Write a command, continuation chunks included
pub fn write_command<T: Transport + ?Sized>(
    t: &mut T,
    command: u8,
    payload: &[u8],
    max_write_size: usize,
) -> Result<()> {
    let chunks = encode_command(command, payload, max_write_size)?;
    log::debug!(
        "tcm: command 0x{:02X}, {} payload bytes in {} chunk(s)",
        command,
        payload.len(),
        chunks.len()
    );
    for chunk in &chunks {
        t.write_fifo(chunk)?;
    }
    Ok(())
}

pub fn read_header<T: Transport + ?Sized>(t: &mut T) -> Result<Header> {
    let mut raw = [0u8; HEADER_SIZE];
    t.read_fifo(&mut raw)?;
    Ok(Header::parse(raw))
}

/// Read the payload frame announced by a header of `length` bytes
///
/// Frame marker, code and end marker mismatches are logged only.
pub fn read_payload<T: Transport + ?Sized>(t: &mut T, length: usize) -> Result<Vec<u8>> {
    if length == 0 {
        return Ok(Vec::new());
    }
    let mut frame = vec![0u8; length + FRAME_OVERHEAD];
    t.read_fifo(&mut frame)?;
    if frame[0] != MARKER || frame[1] != CONTINUED_READ {
        log::warn!(
            "tcm: unexpected payload frame start {:02X} {:02X}",
            frame[0],
            frame[1]
        );
    }
    if frame[length + 2] != END_MARKER {
        log::warn!("tcm: payload end marker is 0x{:02X}", frame[length + 2]);
    }
    frame.truncate(length + 2);
    frame.drain(..2);
    Ok(frame)
}

/// Wait for the response to `command`
///
/// Idle and busy headers retry, reports are drained and skipped.
pub fn wait_response<T: Transport + ?Sized>(
    t: &mut T,
    policy: PollPolicy,
    command: u8,
) -> Result<Vec<u8>> {
    let what = format!("response to command 0x{:02X}", command);
    poll(t, policy, &what, |t| {
        let header = read_header(t)?;
        if header.marker != MARKER {
            log::warn!("tcm: bad header marker 0x{:02X}", header.marker);
            return Ok(None);
        }
        match header.code {
            status::IDLE | status::BUSY => Ok(None),
            status::OK => read_payload(t, header.length).map(Some),
            status::NOT_IMPLEMENTED => {
                log::error!("tcm: command 0x{:02X} not implemented", command);
                Err(Error::NotImplemented(command))
            }
            _ if header.is_report() => {
                log::debug!(
                    "tcm: skipping report 0x{:02X} ({} bytes) while waiting",
                    header.code,
                    header.length
                );
                read_payload(t, header.length)?;
                Ok(None)
            }
            code => {
                read_payload(t, header.length)?;
                log::error!("tcm: command 0x{:02X} failed with status 0x{:02X}", command, code);
                Err(Error::protocol(format!(
                    "command 0x{:02X} failed with status 0x{:02X}",
                    command, code
                )))
            }
        }
    })
}

/// Wait for a report with `code`, skipping everything else
pub fn wait_report<T: Transport + ?Sized>(
    t: &mut T,
    policy: PollPolicy,
    code: u8,
) -> Result<Vec<u8>> {
    let what = format!("report 0x{:02X}", code);
    poll(t, policy, &what, |t| {
        let header = read_header(t)?;
        if header.marker != MARKER {
            log::warn!("tcm: bad header marker 0x{:02X}", header.marker);
            return Ok(None);
        }
        if header.code == status::IDLE || header.code == status::BUSY {
            return Ok(None);
        }
        let payload = read_payload(t, header.length)?;
        if header.code == code {
            Ok(Some(payload))
        } else {
            log::debug!("tcm: skipping message 0x{:02X} while waiting", header.code);
            Ok(None)
        }
    })
}

/// Send `command` and wait for its response payload
pub fn command<T: Transport + ?Sized>(
    t: &mut T,
    policy: PollPolicy,
    command: u8,
    payload: &[u8],
    max_write_size: usize,
) -> Result<Vec<u8>> {
    write_command(t, command, payload, max_write_size)?;
    wait_response(t, policy, command)
}
