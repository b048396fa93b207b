//! Touch reporting and raw access commands

use crate::cli::DirectionArg;
use synadiag_core::{RawDirection, TouchPoint};
use synadiag_session::{DeviceManager, TouchListener};

/// Prints finger edges as they happen
#[derive(Debug, Default)]
struct PrintListener {
    events: usize,
}

impl TouchListener for PrintListener {
    fn finger_down(&mut self, point: &TouchPoint) {
        self.events += 1;
        println!(
            "Finger {} down at ({}, {}) z={} w={}x{}",
            point.index, point.x, point.y, point.z, point.x_width, point.y_width
        );
    }

    fn finger_up(&mut self, index: u8, last: &TouchPoint) {
        self.events += 1;
        println!("Finger {} up at ({}, {})", index, last.x, last.y);
    }
}

/// Read `frames` touch frames and print finger edges
pub fn run_touch(
    mgr: &mut DeviceManager,
    frames: u32,
    max_fingers: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut listener = PrintListener::default();
    for frame in 0..frames {
        let points = mgr.query_touch_response(max_fingers, &mut listener)?;
        log::debug!("Frame {}: {} active objects", frame, points.len());
    }
    println!("{} finger events in {} frames", listener.events, frames);
    Ok(())
}

/// Raw register or packet access
pub fn run_raw(
    mgr: &mut DeviceManager,
    direction: DirectionArg,
    addr: u16,
    data: &[u8],
    length: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let direction = match direction {
        DirectionArg::Read => RawDirection::Read,
        DirectionArg::Write => RawDirection::Write,
    };
    let mut output = vec![0u8; length];
    let n = mgr.run_raw_command(direction, addr, data, &mut output)?;
    output.truncate(n);

    let bytes: Vec<String> = output.iter().map(|b| format!("{:02x}", b)).collect();
    println!("0x{:04X}: {} bytes: {}", addr, n, bytes.join(" "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(index: u8, x: u32, y: u32) -> TouchPoint {
        TouchPoint {
            index,
            classification: 1,
            x,
            y,
            ..Default::default()
        }
    }

    #[test]
    fn test_listener_counts_edges() {
        let mut l = PrintListener::default();
        l.finger_down(&point(0, 10, 20));
        l.finger_up(0, &point(0, 12, 22));
        assert_eq!(l.events, 2);
    }
}
