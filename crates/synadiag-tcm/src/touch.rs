//! Touch report config compiler and interpreter
//!
//! The firmware describes its touch report layout as a byte program: loop
//! and padding opcodes, and field opcodes followed by a bit width. The
//! program is compiled once into [`TouchConfig`] with loop ends resolved,
//! then run against every touch report payload.

use synadiag_core::bits::{extract_bits, BitOrder};
use synadiag_core::{Error, Result, TouchPoint};

/// Touch report config opcodes
pub mod opcode {
    pub const END: u8 = 0;
    pub const FOREACH_ACTIVE_OBJECT: u8 = 1;
    pub const FOREACH_OBJECT: u8 = 2;
    pub const FOREACH_END: u8 = 3;
    pub const PAD_TO_NEXT_BYTE: u8 = 4;
    pub const TIMESTAMP: u8 = 5;
    pub const OBJECT_N_INDEX: u8 = 6;
    pub const OBJECT_N_CLASSIFICATION: u8 = 7;
    pub const OBJECT_N_X_POSITION: u8 = 8;
    pub const OBJECT_N_Y_POSITION: u8 = 9;
    pub const OBJECT_N_Z: u8 = 10;
    pub const OBJECT_N_X_WIDTH: u8 = 11;
    pub const OBJECT_N_Y_WIDTH: u8 = 12;
    pub const OBJECT_N_TX_POSITION_TIXELS: u8 = 13;
    pub const OBJECT_N_RX_POSITION_TIXELS: u8 = 14;
    pub const BUTTONS_STATE_0D: u8 = 15;
    pub const GESTURE_ID: u8 = 16;
    pub const FRAME_RATE: u8 = 17;
    pub const NUM_OF_ACTIVE_OBJECTS: u8 = 24;
}

/// What a field opcode fills in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Timestamp,
    Index,
    Classification,
    X,
    Y,
    Z,
    XWidth,
    YWidth,
    ButtonsState,
    GestureId,
    FrameRate,
    NumActiveObjects,
    /// Read and discarded
    Skip(u8),
}

impl Field {
    fn from_opcode(op: u8) -> Self {
        match op {
            opcode::TIMESTAMP => Self::Timestamp,
            opcode::OBJECT_N_INDEX => Self::Index,
            opcode::OBJECT_N_CLASSIFICATION => Self::Classification,
            opcode::OBJECT_N_X_POSITION => Self::X,
            opcode::OBJECT_N_Y_POSITION => Self::Y,
            opcode::OBJECT_N_Z => Self::Z,
            opcode::OBJECT_N_X_WIDTH => Self::XWidth,
            opcode::OBJECT_N_Y_WIDTH => Self::YWidth,
            opcode::BUTTONS_STATE_0D => Self::ButtonsState,
            opcode::GESTURE_ID => Self::GestureId,
            opcode::FRAME_RATE => Self::FrameRate,
            opcode::NUM_OF_ACTIVE_OBJECTS => Self::NumActiveObjects,
            other => Self::Skip(other),
        }
    }

    /// Store an object field
    fn apply(self, object: &mut TouchPoint, value: u32) {
        match self {
            Self::Index => object.index = value as u8,
            Self::Classification => object.classification = value as u8,
            Self::X => object.x = value,
            Self::Y => object.y = value,
            Self::Z => object.z = value,
            Self::XWidth => object.x_width = value,
            Self::YWidth => object.y_width = value,
            _ => {}
        }
    }
}

/// What a loop iterates over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// The reported number of active objects
    ActiveObjects,
    /// Every object slot
    AllObjects,
}

/// One compiled instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Loop header; `end` is the index of the matching [`Instruction::LoopEnd`]
    Loop { kind: LoopKind, end: usize },
    /// Loop tail; `start` is the index of the matching header
    LoopEnd { start: usize },
    PadToNextByte,
    Field { field: Field, bits: u8 },
}

/// A compiled touch report config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchConfig {
    program: Vec<Instruction>,
}

/// One decoded touch report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchReport {
    pub objects: Vec<TouchPoint>,
    pub timestamp: Option<u32>,
    pub buttons_state: Option<u32>,
    pub gesture_id: Option<u32>,
    pub frame_rate: Option<u32>,
    pub num_active_objects: Option<u32>,
}

struct LoopFrame {
    header: usize,
    end: usize,
    kind: LoopKind,
    iteration: usize,
    iteration_start_bit: usize,
}

impl TouchConfig {
    /// Compile a config program
    ///
    /// Fails on unmatched loop opcodes or a field opcode without its width.
    pub fn compile(config: &[u8]) -> Result<Self> {
        let mut program = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        let mut bytes = config.iter().copied();

        while let Some(op) = bytes.next() {
            let instr = match op {
                opcode::END => break,
                opcode::FOREACH_ACTIVE_OBJECT | opcode::FOREACH_OBJECT => {
                    open.push(program.len());
                    let kind = if op == opcode::FOREACH_ACTIVE_OBJECT {
                        LoopKind::ActiveObjects
                    } else {
                        LoopKind::AllObjects
                    };
                    Instruction::Loop { kind, end: 0 }
                }
                opcode::FOREACH_END => {
                    let start = open
                        .pop()
                        .ok_or_else(|| Error::protocol("touch config: loop end without loop"))?;
                    let end = program.len();
                    if let Some(Instruction::Loop { end: e, .. }) = program.get_mut(start) {
                        *e = end;
                    }
                    Instruction::LoopEnd { start }
                }
                opcode::PAD_TO_NEXT_BYTE => Instruction::PadToNextByte,
                op => {
                    let bits = bytes.next().ok_or_else(|| {
                        Error::protocol(format!("touch config: opcode {} has no width", op))
                    })?;
                    Instruction::Field {
                        field: Field::from_opcode(op),
                        bits,
                    }
                }
            };
            program.push(instr);
        }

        if !open.is_empty() {
            return Err(Error::protocol(format!(
                "touch config: {} unterminated loop(s)",
                open.len()
            )));
        }
        log::debug!("tcm: touch config compiled to {} instructions", program.len());
        Ok(Self { program })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.program
    }

    /// Index just past the end of the first active-object loop after `from`
    fn skip_next_active_loop(&self, from: usize) -> Option<usize> {
        self.program[from..].iter().find_map(|i| match i {
            Instruction::Loop {
                kind: LoopKind::ActiveObjects,
                end,
            } => Some(end + 1),
            _ => None,
        })
    }

    /// Decode one touch report payload
    ///
    /// Object loops run `max_objects` times. Active-object loops run the
    /// reported active count, or until the payload is exhausted when the
    /// report carries no count, and never more than `max_objects` times.
    pub fn parse(&self, payload: &[u8], max_objects: usize, order: BitOrder) -> TouchReport {
        let total_bits = payload.len() * 8;
        let mut report = TouchReport::default();
        let mut stack: Vec<LoopFrame> = Vec::new();
        let mut bit = 0usize;
        let mut ip = 0usize;

        while ip < self.program.len() {
            match self.program[ip] {
                Instruction::Loop { kind, end } => {
                    let runs = match kind {
                        LoopKind::ActiveObjects => {
                            max_objects > 0
                                && match report.num_active_objects {
                                    Some(n) => n > 0,
                                    None => bit < total_bits,
                                }
                        }
                        LoopKind::AllObjects => max_objects > 0,
                    };
                    if !runs {
                        ip = end + 1;
                        continue;
                    }
                    stack.push(LoopFrame {
                        header: ip,
                        end,
                        kind,
                        iteration: 0,
                        iteration_start_bit: bit,
                    });
                    report.objects.push(TouchPoint::default());
                    ip += 1;
                }
                Instruction::LoopEnd { .. } => {
                    let Some(frame) = stack.last_mut() else {
                        ip += 1;
                        continue;
                    };
                    frame.iteration += 1;
                    let step = bit - frame.iteration_start_bit;
                    let more = match frame.kind {
                        LoopKind::ActiveObjects => {
                            frame.iteration < max_objects
                                && match report.num_active_objects {
                                    Some(n) => frame.iteration < n as usize,
                                    None => step > 0 && bit + step <= total_bits,
                                }
                        }
                        LoopKind::AllObjects => frame.iteration < max_objects,
                    };
                    if more {
                        frame.iteration_start_bit = bit;
                        let index = frame.iteration;
                        ip = frame.header + 1;
                        report.objects.push(TouchPoint {
                            index: index as u8,
                            ..Default::default()
                        });
                    } else {
                        stack.pop();
                        ip += 1;
                    }
                }
                Instruction::PadToNextByte => {
                    bit = bit.div_ceil(8) * 8;
                    ip += 1;
                }
                Instruction::Field { field, bits } => {
                    let value = if bits <= 32 {
                        extract_bits(payload, bit, bits as u32, order)
                    } else {
                        0
                    };
                    bit += bits as usize;
                    ip += 1;

                    match field {
                        Field::NumActiveObjects => {
                            report.num_active_objects = Some(value);
                            if value == 0 {
                                ip = match stack.pop() {
                                    Some(frame) => {
                                        // the slot opened for this iteration holds nothing
                                        report.objects.pop();
                                        frame.end + 1
                                    }
                                    None => self.skip_next_active_loop(ip).unwrap_or(ip),
                                };
                            }
                        }
                        Field::Timestamp => report.timestamp = Some(value),
                        Field::ButtonsState => report.buttons_state = Some(value),
                        Field::GestureId => report.gesture_id = Some(value),
                        Field::FrameRate => report.frame_rate = Some(value),
                        _ if stack.is_empty() => {}
                        _ => {
                            if let Some(object) = report.objects.last_mut() {
                                field.apply(object, value);
                            }
                        }
                    }
                }
            }
        }

        if let Some(ts) = report.timestamp {
            for o in &mut report.objects {
                o.timestamp = ts;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synadiag_dummy::tcm::DEFAULT_TOUCH_CONFIG;

    #[test]
    fn test_compile_resolves_loops() {
        let cfg = TouchConfig::compile(DEFAULT_TOUCH_CONFIG).unwrap();
        let prog = cfg.instructions();
        assert_eq!(
            prog[1],
            Instruction::Loop {
                kind: LoopKind::ActiveObjects,
                end: 9
            }
        );
        assert_eq!(prog[9], Instruction::LoopEnd { start: 1 });
        assert_eq!(prog[10], Instruction::PadToNextByte);
        assert_eq!(prog.len(), 11);
    }

    #[test]
    fn test_compile_rejects_bad_programs() {
        assert!(TouchConfig::compile(&[opcode::FOREACH_END]).is_err());
        assert!(TouchConfig::compile(&[opcode::FOREACH_OBJECT, 8, 4]).is_err());
        assert!(TouchConfig::compile(&[opcode::OBJECT_N_X_POSITION]).is_err());
    }

    #[test]
    fn test_active_count_capped_at_max_objects() {
        // count (16 bits), then per active object an 8-bit x
        let cfg = TouchConfig::compile(&[
            opcode::NUM_OF_ACTIVE_OBJECTS,
            16,
            opcode::FOREACH_ACTIVE_OBJECT,
            opcode::OBJECT_N_X_POSITION,
            8,
            opcode::FOREACH_END,
        ])
        .unwrap();
        let r = cfg.parse(&[0xFF, 0xFF], 10, BitOrder::Msb0);
        assert_eq!(r.num_active_objects, Some(0xFFFF));
        assert_eq!(r.objects.len(), 10);
        assert_eq!(r.objects[9].index, 9);

        let r = cfg.parse(&[0xFF, 0xFF], 0, BitOrder::Msb0);
        assert!(r.objects.is_empty());
    }

    #[test]
    fn test_active_loop_without_count_capped_at_max_objects() {
        let cfg = TouchConfig::compile(&[
            opcode::FOREACH_ACTIVE_OBJECT,
            opcode::OBJECT_N_INDEX,
            8,
            opcode::FOREACH_END,
        ])
        .unwrap();
        let r = cfg.parse(&[0u8; 64], 4, BitOrder::Msb0);
        assert_eq!(r.objects.len(), 4);
    }

    #[test]
    fn test_active_objects_with_count() {
        let cfg = TouchConfig::compile(DEFAULT_TOUCH_CONFIG).unwrap();
        // 2 objects: index 3 class 1 x 0x0102 y 0x0304 z 5 wx 6 wy 7,
        // index 4 class 2 x 0x0A0B y 0x0C0D z 8 wx 9 wy 10
        let payload = [
            2, 0x31, 0x01, 0x02, 0x03, 0x04, 5, 6, 7, 0x42, 0x0A, 0x0B, 0x0C, 0x0D, 8, 9, 10,
        ];
        let r = cfg.parse(&payload, 10, BitOrder::Msb0);
        assert_eq!(r.num_active_objects, Some(2));
        assert_eq!(r.objects.len(), 2);
        assert_eq!(r.objects[0].index, 3);
        assert_eq!(r.objects[0].classification, 1);
        assert_eq!((r.objects[0].x, r.objects[0].y), (0x0102, 0x0304));
        assert_eq!(
            (r.objects[0].z, r.objects[0].x_width, r.objects[0].y_width),
            (5, 6, 7)
        );
        assert_eq!(r.objects[1].index, 4);
        assert_eq!(r.objects[1].x, 0x0A0B);
        assert_eq!(r.objects[1].y_width, 10);
    }

    #[test]
    fn test_zero_active_objects_skips_loop() {
        let cfg = TouchConfig::compile(DEFAULT_TOUCH_CONFIG).unwrap();
        let r = cfg.parse(&[0, 0xFF, 0xFF], 10, BitOrder::Msb0);
        assert_eq!(r.num_active_objects, Some(0));
        assert!(r.objects.is_empty());
    }

    #[test]
    fn test_active_loop_without_count_runs_until_payload_ends() {
        // foreach active: class 8, x 8; end
        let cfg = TouchConfig::compile(&[1, 7, 8, 8, 8, 3, 0]).unwrap();
        let r = cfg.parse(&[1, 10, 2, 20, 3, 30], 10, BitOrder::Msb0);
        assert_eq!(r.objects.len(), 3);
        assert_eq!(r.objects[2].classification, 3);
        assert_eq!(r.objects[2].x, 30);
        assert_eq!(r.objects[2].index, 2);
    }

    #[test]
    fn test_object_loop_runs_max_objects() {
        // timestamp 16; foreach object: class 8; end
        let cfg = TouchConfig::compile(&[5, 16, 2, 7, 8, 3]).unwrap();
        let r = cfg.parse(&[0x12, 0x34, 1, 0, 2], 4, BitOrder::Msb0);
        assert_eq!(r.timestamp, Some(0x1234));
        assert_eq!(r.objects.len(), 4);
        let classes: Vec<u8> = r.objects.iter().map(|o| o.classification).collect();
        // reads past the payload yield 0
        assert_eq!(classes, vec![1, 0, 2, 0]);
        assert!(r.objects.iter().all(|o| o.timestamp == 0x1234));
    }

    #[test]
    fn test_zero_count_outside_loop_jumps_past_next_active_loop() {
        // count 8; buttons 8; foreach active: x 8; end; frame rate 8
        let cfg = TouchConfig::compile(&[24, 8, 15, 8, 1, 8, 8, 3, 17, 8]).unwrap();
        let r = cfg.parse(&[0, 0x55, 120], 10, BitOrder::Msb0);
        assert!(r.objects.is_empty());
        // buttons field is skipped together with the loop
        assert_eq!(r.buttons_state, None);
        // frame rate is read right after the count
        assert_eq!(r.frame_rate, Some(0x55));
    }

    #[test]
    fn test_lsb_first_order() {
        let cfg = TouchConfig::compile(&[2, 6, 4, 7, 4, 3]).unwrap();
        let r = cfg.parse(&[0x21], 1, BitOrder::Lsb0);
        assert_eq!(r.objects[0].index, 1);
        assert_eq!(r.objects[0].classification, 2);
    }
}
