//! `t_infomask` / `t_infomask2`: the tuple header's 32 bits of flags plus
//! the packed attribute count.

use bitflags::bitflags;

bitflags! {
    /// Full 16-bit `t_infomask` flag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InfomaskFlags: u16 {
        const HEAP_HASNULL          = 0x0001;
        const HEAP_HASVARWIDTH      = 0x0002;
        const HEAP_HASEXTERNAL      = 0x0004;
        const HEAP_HASOID_OLD       = 0x0008;
        const HEAP_XMAX_KEYSHR_LOCK = 0x0010;
        const HEAP_COMBOCID         = 0x0020;
        const HEAP_XMAX_EXCL_LOCK   = 0x0040;
        const HEAP_XMAX_LOCK_ONLY   = 0x0080;
        const HEAP_XMIN_COMMITTED   = 0x0100;
        const HEAP_XMIN_INVALID     = 0x0200;
        const HEAP_XMAX_COMMITTED   = 0x0400;
        const HEAP_XMAX_INVALID     = 0x0800;
        const HEAP_XMAX_IS_MULTI    = 0x1000;
        const HEAP_UPDATED          = 0x2000;
        const HEAP_MOVED_OFF        = 0x4000;
        const HEAP_MOVED_IN         = 0x8000;
    }
}

/// `t_xmax`/lock-related bits, kept as a named constant rather than
/// recomputed at call sites.
pub const HEAP_XACT_MASK: u16 = 0xFFF0;

impl InfomaskFlags {
    /// Preserves any bits not covered by a named flag instead of silently
    /// dropping them, so an unrecognized-but-present bit still round-trips.
    pub fn from_raw(bits: u16) -> Self {
        InfomaskFlags::from_bits_retain(bits)
    }

    pub fn to_raw(self) -> u16 {
        self.bits()
    }
}

bitflags! {
    /// High 5 bits of `t_infomask2` (the low 11 bits are `natts`, see
    /// [`Infomask2`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Infomask2Flags: u16 {
        const HEAP_KEYS_UPDATED = 0x2000;
        const HEAP_HOT_UPDATED  = 0x4000;
        const HEAP_ONLY_TUPLE   = 0x8000;
    }
}

pub const HEAP_NATTS_MASK: u16 = 0x07FF;
pub const HEAP_FLAGS_MASK: u16 = 0xF800;

/// `t_infomask2`: low 11 bits are `natts`, high bits are flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Infomask2 {
    pub natts: u16,
    pub flags: Infomask2Flags,
}

impl Infomask2 {
    pub fn from_raw(raw: u16) -> Self {
        Infomask2 {
            natts: raw & HEAP_NATTS_MASK,
            flags: Infomask2Flags::from_bits_retain(raw & HEAP_FLAGS_MASK),
        }
    }

    pub fn to_raw(self) -> u16 {
        (self.natts & HEAP_NATTS_MASK) | (self.flags.bits() & HEAP_FLAGS_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infomask_round_trips_including_unnamed_bits() {
        for raw in [0u16, 0xFFFF, 0x1357, HEAP_XACT_MASK] {
            let flags = InfomaskFlags::from_raw(raw);
            assert_eq!(flags.to_raw(), raw);
        }
    }

    #[test]
    fn infomask2_splits_natts_and_flags() {
        let raw = 0x4003; // natts=3, HEAP_HOT_UPDATED set
        let parsed = Infomask2::from_raw(raw);
        assert_eq!(parsed.natts, 3);
        assert!(parsed.flags.contains(Infomask2Flags::HEAP_HOT_UPDATED));
        assert_eq!(parsed.to_raw(), raw);
    }

    #[test]
    fn infomask2_natts_max_2048_fits_mask() {
        // natts is logically bounded to 2048 attributes; the mask itself
        // only guarantees 11 bits (0..=2047), matching the field width.
        let raw = Infomask2 {
            natts: 2047,
            flags: Infomask2Flags::empty(),
        }
        .to_raw();
        assert_eq!(Infomask2::from_raw(raw).natts, 2047);
    }
}
