//! The 23-byte MVCC tuple header, its dynamic null bitmap, and the
//! header+padding+payload assembly that makes up one on-page tuple.

use crate::bitmap::NullBitmap;
use crate::error::Result;
use crate::infomask::{Infomask2, Infomask2Flags, InfomaskFlags};
use crate::itemptr::{ItemPointer, ITEM_POINTER_SIZE};

pub const TUPLE_HEADER_FIXED_SIZE: usize = 23;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleHeader {
    pub t_xmin: u32,
    pub t_xmax: u32,
    /// Aliases `t_cid`/`t_xvac`; the source fields overlap on disk.
    pub t_cid: u32,
    pub t_ctid: ItemPointer,
    pub t_infomask2: Infomask2,
    pub t_infomask: InfomaskFlags,
    pub t_hoff: u8,
    pub nullmap: NullBitmap,
}

impl TupleHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let t_xmin = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let t_xmax = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let t_cid = u32::from_le_bytes(bytes[8..12].try_into().unwrap());

        let mut ctid_bytes = [0u8; ITEM_POINTER_SIZE];
        ctid_bytes.copy_from_slice(&bytes[12..18]);
        let t_ctid = ItemPointer::from_bytes(ctid_bytes);

        let infomask2_raw = u16::from_le_bytes(bytes[18..20].try_into().unwrap());
        let t_infomask2 = Infomask2::from_raw(infomask2_raw);

        let infomask_raw = u16::from_le_bytes(bytes[20..22].try_into().unwrap());
        let t_infomask = InfomaskFlags::from_raw(infomask_raw);

        let t_hoff = bytes[22];

        let nullmap = if t_infomask.contains(InfomaskFlags::HEAP_HASNULL) {
            let bitmap_size = NullBitmap::byte_size_for(t_infomask2.natts);
            NullBitmap::from_bytes(&bytes[TUPLE_HEADER_FIXED_SIZE..TUPLE_HEADER_FIXED_SIZE + bitmap_size])
        } else {
            NullBitmap::default()
        };

        Ok(TupleHeader {
            t_xmin,
            t_xmax,
            t_cid,
            t_ctid,
            t_infomask2,
            t_infomask,
            t_hoff,
            nullmap,
        })
    }

    pub fn has_nulls(&self) -> bool {
        self.t_infomask.contains(InfomaskFlags::HEAP_HASNULL)
    }

    pub fn nullmap_byte_size(&self) -> usize {
        if self.has_nulls() {
            self.nullmap.byte_size()
        } else {
            1
        }
    }

    /// Fixed header + null bitmap (or single padding byte).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TUPLE_HEADER_FIXED_SIZE + self.nullmap_byte_size());
        out.extend_from_slice(&self.t_xmin.to_le_bytes());
        out.extend_from_slice(&self.t_xmax.to_le_bytes());
        out.extend_from_slice(&self.t_cid.to_le_bytes());
        out.extend_from_slice(&self.t_ctid.to_bytes());
        out.extend_from_slice(&self.t_infomask2.to_raw().to_le_bytes());
        out.extend_from_slice(&self.t_infomask.to_raw().to_le_bytes());
        out.push(self.t_hoff);

        if self.has_nulls() {
            out.extend_from_slice(self.nullmap.as_bytes());
        } else {
            out.push(0u8);
        }

        out
    }

    /// `TUPLE_HEADER_FIXED_SIZE + align_up(bitmap size if any, 8)`.
    /// Recomputed whenever the null-bitmap presence/size may have
    /// changed, so the payload always starts on an 8-byte boundary.
    pub fn recompute_t_hoff(&mut self) {
        let bitmap_len = if self.has_nulls() { self.nullmap.byte_size() } else { 0 };
        let raw = TUPLE_HEADER_FIXED_SIZE + bitmap_len;
        self.t_hoff = align_up(raw, 8) as u8;
    }

    pub fn set_hot_updated(&mut self) {
        self.t_infomask2.flags |= Infomask2Flags::HEAP_HOT_UPDATED;
    }
}

pub fn align_up(n: usize, to: usize) -> usize {
    ((n + to - 1) / to) * to
}

/// One on-page tuple: header, alignment padding up to `t_hoff`, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub header: TupleHeader,
    pub payload: Vec<u8>,
}

impl Tuple {
    /// Parse a tuple occupying `total_length` bytes starting at `offset`
    /// within `page_bytes`.
    pub fn parse(page_bytes: &[u8], offset: usize, total_length: usize) -> Result<Self> {
        let header = TupleHeader::parse(&page_bytes[offset..offset + TUPLE_HEADER_FIXED_SIZE])?;
        let payload_start = offset + header.t_hoff as usize;
        let payload_end = offset + total_length;
        let payload = page_bytes[payload_start..payload_end].to_vec();
        Ok(Tuple { header, payload })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let header_bytes = self.header.to_bytes();
        let mut out = Vec::with_capacity(self.header.t_hoff as usize + self.payload.len());
        out.extend_from_slice(&header_bytes);
        let pad = (self.header.t_hoff as usize).saturating_sub(header_bytes.len());
        out.extend(std::iter::repeat(0u8).take(pad));
        out.extend_from_slice(&self.payload);
        out
    }
}
