//! Function register layouts
//!
//! RMI functions describe their optional registers with presence flags held
//! in earlier registers. Two small interpreters walk those chains:
//!
//! - [`read_query_chain`] reads optional query registers in order, each one
//!   gated by flags in registers read before it
//! - [`RegisterLayout::build`] sums the sizes of present control or data
//!   registers to find the address of each one
//!
//! The tables live next to each function's parser. Their order is the
//! register order on the device and must not be changed.

pub mod f01;
pub mod f12;
pub mod f1a;
pub mod f34;
pub mod f54;
pub mod f55;

use std::collections::BTreeMap;
use synadiag_core::bits::bit;
use synadiag_core::{Result, Transport};

/// Optional query registers read so far, keyed by query number
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryMap {
    regs: BTreeMap<u16, Vec<u8>>,
}

impl QueryMap {
    pub fn insert(&mut self, number: u16, bytes: Vec<u8>) {
        self.regs.insert(number, bytes);
    }

    pub fn has(&self, number: u16) -> bool {
        self.regs.contains_key(&number)
    }

    /// Byte `index` of query `number`, 0 when absent
    pub fn byte(&self, number: u16, index: usize) -> u8 {
        self.regs
            .get(&number)
            .and_then(|r| r.get(index).copied())
            .unwrap_or(0)
    }

    /// Bit `n` of the first byte of query `number`, false when absent
    pub fn flag(&self, number: u16, n: u8) -> bool {
        bit(self.byte(number, 0), n)
    }

    pub fn numbers(&self) -> impl Iterator<Item = u16> + '_ {
        self.regs.keys().copied()
    }
}

/// Something that accumulates a query chain
pub trait QueryContext {
    fn chain_mut(&mut self) -> &mut QueryMap;
}

/// One optional query register
pub struct QueryField<C> {
    /// First query number covered by this entry
    pub number: u16,
    pub present: fn(&C) -> bool,
    /// Size in bytes
    pub size: fn(&C) -> u16,
}

/// Read every present query in `fields`, starting at `base + offset`
///
/// Returns the offset just past the last present query.
pub fn read_query_chain<T, C>(
    transport: &mut T,
    base: u16,
    mut offset: u16,
    ctx: &mut C,
    fields: &[QueryField<C>],
) -> Result<u16>
where
    T: Transport + ?Sized,
    C: QueryContext,
{
    for field in fields {
        if !(field.present)(ctx) {
            continue;
        }
        let size = (field.size)(ctx);
        if size > 0 {
            let mut buf = vec![0u8; size as usize];
            transport.read_register(base + offset, &mut buf)?;
            log::trace!(
                "query {} @0x{:04X}: {:02X?}",
                field.number,
                base + offset,
                buf
            );
            ctx.chain_mut().insert(field.number, buf);
        }
        offset += size;
    }
    Ok(offset)
}

/// One control or data register
pub struct RegisterField<C> {
    /// Register number (first of a group when `size` covers several)
    pub number: u16,
    pub present: fn(&C) -> bool,
    /// Number of addresses occupied
    pub size: fn(&C) -> u16,
}

/// Address of every present register
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegisterLayout {
    addrs: BTreeMap<u16, u16>,
    end: u16,
}

impl RegisterLayout {
    /// Lay out `fields` from `base`
    pub fn build<C>(base: u16, ctx: &C, fields: &[RegisterField<C>]) -> Self {
        let mut addrs = BTreeMap::new();
        let mut addr = base;
        for field in fields {
            if (field.present)(ctx) {
                addrs.insert(field.number, addr);
                addr += (field.size)(ctx);
            }
        }
        Self { addrs, end: addr }
    }

    /// Address of register `number` if present
    pub fn address(&self, number: u16) -> Option<u16> {
        self.addrs.get(&number).copied()
    }

    pub fn is_present(&self, number: u16) -> bool {
        self.addrs.contains_key(&number)
    }

    /// First address past the last present register
    pub fn end(&self) -> u16 {
        self.end
    }
}

/// Presence bitmap as used by F12: register `n` is present when bit `n % 8`
/// of byte `n / 8` is set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PresenceMap {
    bytes: Vec<u8>,
}

impl PresenceMap {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn is_present(&self, n: usize) -> bool {
        self.bytes
            .get(n / 8)
            .map(|b| bit(*b, (n % 8) as u8))
            .unwrap_or(false)
    }

    /// Number of present registers below `n`, i.e. the offset of `n`
    pub fn offset_of(&self, n: usize) -> u16 {
        (0..n).filter(|&i| self.is_present(i)).count() as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synadiag_dummy::DummyRegisters;

    #[derive(Default)]
    struct Ctx {
        chain: QueryMap,
        wide: bool,
    }

    impl QueryContext for Ctx {
        fn chain_mut(&mut self) -> &mut QueryMap {
            &mut self.chain
        }
    }

    const CHAIN: &[QueryField<Ctx>] = &[
        QueryField {
            number: 1,
            present: |_| true,
            size: |_| 1,
        },
        QueryField {
            number: 2,
            present: |c| c.chain.flag(1, 0),
            size: |_| 1,
        },
        QueryField {
            number: 3,
            present: |c| c.chain.flag(1, 1),
            size: |_| 2,
        },
        QueryField {
            number: 5,
            present: |c| c.chain.flag(2, 7),
            size: |_| 1,
        },
    ];

    #[test]
    fn test_query_chain_follows_flags() {
        let mut regs = DummyRegisters::new();
        // q1 = 0b01 (q2 present, q3 absent), q2 = 0x80 (q5 present), q5 = 0xAA
        regs.load(0x0100, &[0x01, 0x80, 0xAA]);
        let mut ctx = Ctx::default();
        let end = read_query_chain(&mut regs, 0x0100, 0, &mut ctx, CHAIN).unwrap();
        assert_eq!(end, 3);
        assert!(ctx.chain.has(2));
        assert!(!ctx.chain.has(3));
        assert_eq!(ctx.chain.byte(5, 0), 0xAA);
    }

    #[test]
    fn test_register_layout_sums_present_sizes() {
        let fields: &[RegisterField<Ctx>] = &[
            RegisterField {
                number: 0,
                present: |_| true,
                size: |_| 1,
            },
            RegisterField {
                number: 1,
                present: |c| c.wide,
                size: |_| 4,
            },
            RegisterField {
                number: 2,
                present: |_| true,
                size: |_| 2,
            },
            RegisterField {
                number: 3,
                present: |_| true,
                size: |_| 1,
            },
        ];
        let narrow = RegisterLayout::build(0x20, &Ctx::default(), fields);
        assert_eq!(narrow.address(2), Some(0x21));
        assert_eq!(narrow.address(3), Some(0x23));
        assert_eq!(narrow.address(1), None);

        let wide_ctx = Ctx {
            wide: true,
            ..Default::default()
        };
        let wide = RegisterLayout::build(0x20, &wide_ctx, fields);
        assert_eq!(wide.address(3), Some(0x27));
        assert_eq!(wide.end(), 0x28);
    }

    #[test]
    fn test_presence_map() {
        let map = PresenceMap::new(vec![0b0000_0101, 0b0000_0001]);
        assert!(map.is_present(0));
        assert!(!map.is_present(1));
        assert!(map.is_present(8));
        assert_eq!(map.offset_of(8), 2);
        assert!(!map.is_present(40));
    }
}
