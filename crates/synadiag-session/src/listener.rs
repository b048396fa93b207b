//! Finger edge notifications

use std::collections::BTreeMap;
use synadiag_core::TouchPoint;

/// Receives finger-down and finger-up edges from
/// `DeviceManager::query_touch_response`
pub trait TouchListener {
    /// An object appeared in slot `point.index`
    fn finger_down(&mut self, point: &TouchPoint);
    /// The object in slot `index` is gone; `last` is its final position
    fn finger_up(&mut self, index: u8, last: &TouchPoint);
}

/// Slots that were down in the previous frame
#[derive(Debug, Default, Clone)]
pub(crate) struct FingerState {
    down: BTreeMap<u8, TouchPoint>,
}

impl FingerState {
    /// Diff `points` against the previous frame and notify `listener`
    pub fn update(&mut self, points: &[TouchPoint], listener: &mut dyn TouchListener) {
        let mut now = BTreeMap::new();
        for p in points.iter().filter(|p| p.is_active()) {
            if !self.down.contains_key(&p.index) {
                log::debug!("finger {} down at ({}, {})", p.index, p.x, p.y);
                listener.finger_down(p);
            }
            now.insert(p.index, *p);
        }
        for (index, last) in &self.down {
            if !now.contains_key(index) {
                log::debug!("finger {} up", index);
                listener.finger_up(*index, last);
            }
        }
        self.down = now;
    }

    pub fn clear(&mut self) {
        self.down.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<(bool, u8)>,
    }

    impl TouchListener for Recorder {
        fn finger_down(&mut self, point: &TouchPoint) {
            self.events.push((true, point.index));
        }
        fn finger_up(&mut self, index: u8, _last: &TouchPoint) {
            self.events.push((false, index));
        }
    }

    fn point(index: u8) -> TouchPoint {
        TouchPoint {
            index,
            classification: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_edges() {
        let mut state = FingerState::default();
        let mut rec = Recorder::default();
        state.update(&[point(0), point(3)], &mut rec);
        state.update(&[point(0), point(3)], &mut rec);
        state.update(&[point(3)], &mut rec);
        state.update(&[], &mut rec);
        assert_eq!(rec.events, vec![(true, 0), (true, 3), (false, 0), (false, 3)]);
    }

    #[test]
    fn test_inactive_objects_are_up() {
        let mut state = FingerState::default();
        let mut rec = Recorder::default();
        state.update(&[point(1)], &mut rec);
        let gone = TouchPoint {
            index: 1,
            classification: 0,
            ..Default::default()
        };
        state.update(&[gone], &mut rec);
        assert_eq!(rec.events, vec![(true, 1), (false, 1)]);
    }
}
