//! Page header, line-pointer array, and the reverse-packed tuple payload
//! region.

use bitflags::bitflags;

use crate::error::{PgPeekError, Result};
use crate::itemid::{ItemId, LpFlags};
use crate::tuple::{align_up, Tuple};

pub const PAGE_HEADER_SIZE: usize = 24;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PdFlags: u16 {
        const PD_HAS_FREE_LINES = 0x0001;
        const PD_PAGE_FULL       = 0x0002;
        const PD_ALL_VISIBLE     = 0x0004;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdPageVersion {
    PrePostgres73,
    Postgres73_74,
    Postgres80,
    Postgres81_82,
    Postgres83Plus,
}

impl PdPageVersion {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(PdPageVersion::PrePostgres73),
            1 => Ok(PdPageVersion::Postgres73_74),
            2 => Ok(PdPageVersion::Postgres80),
            3 => Ok(PdPageVersion::Postgres81_82),
            4 => Ok(PdPageVersion::Postgres83Plus),
            other => Err(PgPeekError::InvalidPdVersion(other)),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            PdPageVersion::PrePostgres73 => 0,
            PdPageVersion::Postgres73_74 => 1,
            PdPageVersion::Postgres80 => 2,
            PdPageVersion::Postgres81_82 => 3,
            PdPageVersion::Postgres83Plus => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    pub pd_lsn: u64,
    /// Read but always zeroed on write; no checksum recomputation.
    pub pd_checksum: u16,
    pub pd_flags: PdFlags,
    pub pd_lower: u16,
    pub pd_upper: u16,
    pub pd_special: u16,
    pub page_size: u16,
    pub version: PdPageVersion,
    pub pd_prune_xid: u32,
}

impl PageHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let pd_lsn = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let pd_checksum = u16::from_le_bytes(bytes[8..10].try_into().unwrap());
        let pd_flags = PdFlags::from_bits_retain(u16::from_le_bytes(bytes[10..12].try_into().unwrap()));
        let pd_lower = u16::from_le_bytes(bytes[12..14].try_into().unwrap());
        let pd_upper = u16::from_le_bytes(bytes[14..16].try_into().unwrap());
        let pd_special = u16::from_le_bytes(bytes[16..18].try_into().unwrap());
        let pd_pagesize_version = u16::from_le_bytes(bytes[18..20].try_into().unwrap());
        let page_size = pd_pagesize_version & 0xFF00;
        let version = PdPageVersion::from_byte((pd_pagesize_version & 0x00FF) as u8)?;
        let pd_prune_xid = u32::from_le_bytes(bytes[20..24].try_into().unwrap());

        Ok(PageHeader {
            pd_lsn,
            pd_checksum,
            pd_flags,
            pd_lower,
            pd_upper,
            pd_special,
            page_size,
            version,
            pd_prune_xid,
        })
    }

    pub fn page_length(&self) -> usize {
        self.page_size as usize
    }

    pub fn to_bytes(&self) -> [u8; PAGE_HEADER_SIZE] {
        let mut out = [0u8; PAGE_HEADER_SIZE];
        out[0..8].copy_from_slice(&self.pd_lsn.to_le_bytes());
        out[8..10].copy_from_slice(&0u16.to_le_bytes()); // checksum zeroed
        out[10..12].copy_from_slice(&self.pd_flags.bits().to_le_bytes());
        out[12..14].copy_from_slice(&self.pd_lower.to_le_bytes());
        out[14..16].copy_from_slice(&self.pd_upper.to_le_bytes());
        out[16..18].copy_from_slice(&self.pd_special.to_le_bytes());
        let pagesize_version = self.page_size | self.version.to_byte() as u16;
        out[18..20].copy_from_slice(&pagesize_version.to_le_bytes());
        out[20..24].copy_from_slice(&self.pd_prune_xid.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub header: PageHeader,
    pub item_ids: Vec<ItemId>,
    pub tuples: Vec<Option<Tuple>>,
}

impl Page {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header = PageHeader::parse(&bytes[0..PAGE_HEADER_SIZE])?;
        let page_length = header.page_length();
        check_geometry(&header, page_length)?;

        let num_item_ids = (header.pd_lower as usize - PAGE_HEADER_SIZE) / 4;
        let mut item_ids = Vec::with_capacity(num_item_ids);
        for i in 0..num_item_ids {
            let start = PAGE_HEADER_SIZE + i * 4;
            let mut word = [0u8; 4];
            word.copy_from_slice(&bytes[start..start + 4]);
            let item_id = ItemId::from_bytes(word)?;
            if item_id.lp_off != 0 {
                let off = item_id.lp_off as usize;
                let len = item_id.lp_len as usize;
                if off < header.pd_upper as usize
                    || off >= page_length
                    || off + len > page_length
                {
                    return Err(PgPeekError::PageGeometryInvariantViolated(format!(
                        "item {i} offset {off} length {len} out of bounds"
                    )));
                }
            }
            item_ids.push(item_id);
        }

        let mut tuples = Vec::with_capacity(item_ids.len());
        for item_id in &item_ids {
            if item_id.lp_len > 0 {
                let tuple = Tuple::parse(bytes, item_id.lp_off as usize, item_id.lp_len as usize)?;
                tuples.push(Some(tuple));
            } else {
                tuples.push(None);
            }
        }

        Ok(Page {
            header,
            item_ids,
            tuples,
        })
    }

    pub fn page_length(&self) -> usize {
        self.header.page_length()
    }

    /// Reconstruct the page as a byte block equal to the declared page
    /// length.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let page_length = self.page_length();
        let mut out = Vec::with_capacity(page_length);

        out.extend_from_slice(&self.header.to_bytes());
        for item_id in &self.item_ids {
            out.extend_from_slice(&item_id.to_bytes());
        }

        let gap = self.header.pd_upper as usize - self.header.pd_lower as usize;
        out.extend(std::iter::repeat(0u8).take(gap));

        for tuple in self.tuples.iter().rev() {
            if let Some(tuple) = tuple {
                let tuple_bytes = tuple.to_bytes();
                out.extend_from_slice(&tuple_bytes);
                let padded = align_up(tuple_bytes.len(), 8);
                out.extend(std::iter::repeat(0u8).take(padded - tuple_bytes.len()));
            }
        }

        if out.len() > page_length {
            return Err(PgPeekError::PageLengthMismatch {
                declared: page_length,
                produced: out.len(),
            });
        }
        out.extend(std::iter::repeat(0u8).take(page_length - out.len()));

        if out.len() != page_length {
            return Err(PgPeekError::PageLengthMismatch {
                declared: page_length,
                produced: out.len(),
            });
        }

        Ok(out)
    }
}

fn check_geometry(header: &PageHeader, page_length: usize) -> Result<()> {
    if (PAGE_HEADER_SIZE..=page_length).contains(&(header.pd_lower as usize))
        && header.pd_lower <= header.pd_upper
        && (header.pd_upper as usize) <= page_length
    {
        if (header.pd_lower as usize - PAGE_HEADER_SIZE) % 4 != 0 {
            return Err(PgPeekError::PageGeometryInvariantViolated(
                "pd_lower is not 4-byte aligned past the header".into(),
            ));
        }
        Ok(())
    } else {
        Err(PgPeekError::PageGeometryInvariantViolated(format!(
            "expected {PAGE_HEADER_SIZE} <= pd_lower ({}) <= pd_upper ({}) <= page_length ({page_length})",
            header.pd_lower, header.pd_upper
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infomask::Infomask2;
    use crate::infomask::InfomaskFlags;
    use crate::itemptr::ItemPointer;
    use crate::tuple::TupleHeader;

    fn empty_page(page_length: u16) -> Page {
        let header = PageHeader {
            pd_lsn: 0,
            pd_checksum: 0,
            pd_flags: PdFlags::empty(),
            pd_lower: PAGE_HEADER_SIZE as u16,
            pd_upper: page_length,
            pd_special: page_length,
            page_size: page_length,
            version: PdPageVersion::Postgres83Plus,
            pd_prune_xid: 0,
        };
        Page {
            header,
            item_ids: vec![],
            tuples: vec![],
        }
    }

    #[test]
    fn empty_page_round_trips() {
        let page = empty_page(8192);
        let bytes = page.to_bytes().unwrap();
        assert_eq!(bytes.len(), 8192);
        let parsed = Page::parse(&bytes).unwrap();
        assert_eq!(parsed.item_ids.len(), 0);
    }

    #[test]
    fn page_with_one_tuple_round_trips() {
        let mut page = empty_page(8192);
        let mut tuple_header = TupleHeader {
            t_xmin: 1,
            t_xmax: 0,
            t_cid: 0,
            t_ctid: ItemPointer::default(),
            t_infomask2: Infomask2 {
                natts: 0,
                flags: crate::infomask::Infomask2Flags::empty(),
            },
            t_infomask: InfomaskFlags::empty(),
            t_hoff: 0,
            nullmap: Default::default(),
        };
        tuple_header.recompute_t_hoff();
        let tuple = Tuple {
            header: tuple_header,
            payload: b"hello".to_vec(),
        };
        let tuple_bytes_len = tuple.to_bytes().len();
        let padded_len = align_up(tuple_bytes_len, 8);

        page.header.pd_lower += 4;
        page.header.pd_upper -= padded_len as u16;
        page.item_ids.push(ItemId {
            lp_off: page.header.pd_upper,
            lp_flags: LpFlags::Normal,
            lp_len: padded_len as u16,
        });
        page.tuples.push(Some(tuple));

        let bytes = page.to_bytes().unwrap();
        let parsed = Page::parse(&bytes).unwrap();
        assert_eq!(parsed.tuples.len(), 1);
        assert_eq!(parsed.tuples[0].as_ref().unwrap().payload, b"hello");
    }
}
