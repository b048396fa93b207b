//! F12: 2D sensor (touch reporting)
//!
//! F12 describes its control and data registers with presence bitmaps:
//! query 5 for controls and query 8 for data, each preceded by a size
//! register (query 4 and query 7). Every present register occupies one
//! address, so a register's address is the base plus the number of present
//! registers below it.

use super::PresenceMap;
use crate::pdt::FunctionDescriptor;
use synadiag_core::bits::le16;
use synadiag_core::{Error, Result, Transport};

/// Upper bound on reported fingers
pub const MAX_FINGERS: usize = 10;
/// Bytes per finger record in data 1
pub const FINGER_RECORD_SIZE: usize = 8;

const CTRL_SENSOR_TUNING: usize = 8;
const CTRL_REPORTING: usize = 20;
const CTRL_OBJECT_REPORT: usize = 23;
const DATA_FINGERS: usize = 1;
const DATA_ATTENTION: usize = 15;

/// Sensor tuning register (control 8)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorTuning {
    pub max_x: u16,
    pub max_y: u16,
    pub rx_pitch: u16,
    pub tx_pitch: u16,
    pub num_rx: u8,
    pub num_tx: u8,
}

impl SensorTuning {
    fn parse(raw: &[u8]) -> Self {
        Self {
            max_x: le16(raw, 0),
            max_y: le16(raw, 2),
            rx_pitch: le16(raw, 4),
            tx_pitch: le16(raw, 6),
            num_rx: raw.get(12).copied().unwrap_or(0),
            num_tx: raw.get(13).copied().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F12Info {
    pub fd: FunctionDescriptor,
    pub controls: PresenceMap,
    pub data: PresenceMap,
    pub tuning: SensorTuning,
    pub max_objects: usize,
    /// Address of control 20 (reporting flags) when present
    pub ctrl20_addr: Option<u16>,
    /// Address of data 1 (finger records)
    pub data1_addr: u16,
    /// Address and size of data 15 (object attention) when present
    pub data15: Option<(u16, usize)>,
}

/// Read a size register followed by the presence register it sizes
fn read_presence<T: Transport + ?Sized>(t: &mut T, size_addr: u16) -> Result<Vec<u8>> {
    let size = t.read_byte(size_addr)? as usize;
    if size == 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; size];
    t.read_register(size_addr + 1, &mut buf)?;
    Ok(buf)
}

impl F12Info {
    pub fn parse<T: Transport + ?Sized>(t: &mut T, fd: FunctionDescriptor) -> Result<Self> {
        // Byte 0 of each presence register is the size of the next query
        let q5 = read_presence(t, fd.query_base + 4)?;
        let q8 = read_presence(t, fd.query_base + 7)?;
        let controls = PresenceMap::new(q5.get(1..).unwrap_or(&[]).to_vec());
        let data = PresenceMap::new(q8.get(1..).unwrap_or(&[]).to_vec());

        if !controls.is_present(CTRL_SENSOR_TUNING) {
            return Err(Error::protocol("F12 control 8 not present"));
        }
        let ctrl8_addr = fd.control_base + controls.offset_of(CTRL_SENSOR_TUNING);
        let mut raw = [0u8; 14];
        t.read_register(ctrl8_addr, &mut raw)?;
        let tuning = SensorTuning::parse(&raw);

        let max_objects = if controls.is_present(CTRL_OBJECT_REPORT) {
            let addr = fd.control_base + controls.offset_of(CTRL_OBJECT_REPORT);
            let mut ctrl23 = [0u8; 2];
            t.read_register(addr, &mut ctrl23)?;
            (ctrl23[1] as usize).min(MAX_FINGERS)
        } else {
            MAX_FINGERS
        };

        let ctrl20_addr = controls
            .is_present(CTRL_REPORTING)
            .then(|| fd.control_base + controls.offset_of(CTRL_REPORTING));

        if !data.is_present(DATA_FINGERS) {
            return Err(Error::protocol("F12 data 1 not present"));
        }
        let data1_addr = fd.data_base + data.offset_of(DATA_FINGERS);

        // data 15 is only usable when the data presence register reaches it
        let data15 = (q8.len() >= 3 && data.is_present(DATA_ATTENTION)).then(|| {
            (
                fd.data_base + data.offset_of(DATA_ATTENTION),
                max_objects.div_ceil(8),
            )
        });

        log::info!(
            "F12: max {}x{}, {} rx / {} tx, {} objects, data15 {}",
            tuning.max_x,
            tuning.max_y,
            tuning.num_rx,
            tuning.num_tx,
            max_objects,
            if data15.is_some() { "present" } else { "absent" }
        );

        Ok(Self {
            fd,
            controls,
            data,
            tuning,
            max_objects,
            ctrl20_addr,
            data1_addr,
            data15,
        })
    }
}
