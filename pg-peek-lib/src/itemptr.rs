//! `ItemPointerData`: a 6-byte block+position tuple identifier.

pub const ITEM_POINTER_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemPointer {
    pub bi_hi: u16,
    pub bi_lo: u16,
    pub ip_posid: u16,
}

impl ItemPointer {
    pub fn from_bytes(bytes: [u8; ITEM_POINTER_SIZE]) -> Self {
        ItemPointer {
            bi_hi: u16::from_le_bytes([bytes[0], bytes[1]]),
            bi_lo: u16::from_le_bytes([bytes[2], bytes[3]]),
            ip_posid: u16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }

    pub fn to_bytes(self) -> [u8; ITEM_POINTER_SIZE] {
        let mut out = [0u8; ITEM_POINTER_SIZE];
        out[0..2].copy_from_slice(&self.bi_hi.to_le_bytes());
        out[2..4].copy_from_slice(&self.bi_lo.to_le_bytes());
        out[4..6].copy_from_slice(&self.ip_posid.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let ptr = ItemPointer {
            bi_hi: 0x1234,
            bi_lo: 0xABCD,
            ip_posid: 7,
        };
        assert_eq!(ItemPointer::from_bytes(ptr.to_bytes()), ptr);
    }
}
