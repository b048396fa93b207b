//! F12 finger reporting

use crate::registers::f12::{F12Info, FINGER_RECORD_SIZE};
use synadiag_core::bits::le16;
use synadiag_core::{Result, TouchPoint, Transport};

/// Tracks how many finger slots the previous frame used
///
/// Some firmware clears attention bits before the finger record reports the
/// lift, so the slot count never drops below the previous frame's.
#[derive(Debug, Default, Clone)]
pub struct FingerTracker {
    fingers_present: usize,
}

impl FingerTracker {
    pub fn fingers_present(&self) -> usize {
        self.fingers_present
    }

    /// Number of slots to read for an attention bitmap
    fn slots_to_process(&self, attention: &[u8], max_objects: usize) -> usize {
        let highest = attention
            .iter()
            .enumerate()
            .rev()
            .find(|&(_, &b)| b != 0)
            .map(|(i, &b)| i * 8 + (8 - b.leading_zeros() as usize))
            .unwrap_or(0);
        highest.max(self.fingers_present).min(max_objects)
    }

    /// Read one touch frame
    ///
    /// Returns every processed slot, lifted ones included, truncated to
    /// `max_fingers`.
    pub fn read<T: Transport + ?Sized>(
        &mut self,
        t: &mut T,
        f12: &F12Info,
        max_fingers: usize,
    ) -> Result<Vec<TouchPoint>> {
        let slots = match f12.data15 {
            Some((addr, size)) => {
                let mut attention = vec![0u8; size];
                t.read_register(addr, &mut attention)?;
                self.slots_to_process(&attention, f12.max_objects)
            }
            None => f12.max_objects,
        };
        if slots == 0 {
            self.fingers_present = 0;
            return Ok(Vec::new());
        }

        let mut raw = vec![0u8; slots * FINGER_RECORD_SIZE];
        t.read_register(f12.data1_addr, &mut raw)?;

        let points: Vec<TouchPoint> = raw
            .chunks_exact(FINGER_RECORD_SIZE)
            .enumerate()
            .map(|(i, r)| TouchPoint {
                index: i as u8,
                classification: r[0],
                x: le16(r, 1) as u32,
                y: le16(r, 3) as u32,
                z: r[5] as u32,
                x_width: r[6] as u32,
                y_width: r[7] as u32,
                timestamp: 0,
            })
            .collect();

        self.fingers_present = points
            .iter()
            .rposition(|p| p.is_active())
            .map_or(0, |i| i + 1);
        log::trace!(
            "F12: {} slots read, {} fingers present",
            slots,
            self.fingers_present
        );

        Ok(points.into_iter().take(max_fingers).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdt::{function, PageDescriptorTable};
    use synadiag_dummy::{DummyFinger, DummyRmi};

    fn f12(dev: &mut DummyRmi) -> F12Info {
        let pdt = PageDescriptorTable::scan(dev).unwrap();
        let fd = *pdt.require(function::F12).unwrap();
        F12Info::parse(dev, fd).unwrap()
    }

    fn finger(slot: usize, x: u16) -> DummyFinger {
        DummyFinger {
            slot,
            classification: 1,
            x,
            y: x + 1,
            z: 40,
            wx: 3,
            wy: 4,
        }
    }

    #[test]
    fn test_slots_follow_attention() {
        let tracker = FingerTracker::default();
        assert_eq!(tracker.slots_to_process(&[0x00, 0x00], 10), 0);
        assert_eq!(tracker.slots_to_process(&[0x05, 0x00], 10), 3);
        assert_eq!(tracker.slots_to_process(&[0x00, 0x02], 10), 10);
    }

    #[test]
    fn test_read_fingers() {
        let mut dev = DummyRmi::new();
        let f12 = f12(&mut dev);
        dev.set_fingers(&[finger(0, 100), finger(2, 300)]);

        let mut tracker = FingerTracker::default();
        let points = tracker.read(&mut dev, &f12, 10).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[2].x, 300);
        assert_eq!(points[2].y, 301);
        assert_eq!(points[2].z, 40);
        assert!(!points[1].is_active());
        assert_eq!(tracker.fingers_present(), 3);
    }

    #[test]
    fn test_lift_still_reads_previous_slots() {
        let mut dev = DummyRmi::new();
        let f12 = f12(&mut dev);
        let mut tracker = FingerTracker::default();

        dev.set_fingers(&[finger(0, 10), finger(3, 40)]);
        tracker.read(&mut dev, &f12, 10).unwrap();
        assert_eq!(tracker.fingers_present(), 4);

        // attention cleared but slot 3 record still active
        dev.set_attention(vec![0x01, 0x00]);
        let points = tracker.read(&mut dev, &f12, 10).unwrap();
        assert_eq!(points.len(), 4);
        assert!(points[3].is_active());

        // the finger record now reports the lift
        dev.set_fingers(&[finger(0, 10)]);
        let points = tracker.read(&mut dev, &f12, 10).unwrap();
        assert_eq!(points.len(), 4);
        assert!(!points[3].is_active());
        assert_eq!(tracker.fingers_present(), 1);

        let points = tracker.read(&mut dev, &f12, 10).unwrap();
        assert_eq!(points.len(), 1);
    }
}
