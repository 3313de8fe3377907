//! A whole relation file: an ordered sequence of pages, plus the
//! MVCC-aware in-place update algorithm that rewrites a tuple inline,
//! appends a superseding copy in the same page, or spills to a fresh
//! page when neither fits.

use std::fs;
use std::path::Path;

use crate::error::{PgPeekError, Result};
use crate::infomask::{Infomask2Flags, InfomaskFlags};
use crate::itemid::{ItemId, LpFlags};
use crate::page::{Page, PAGE_HEADER_SIZE};
use crate::row::{self, DecodedField};
use crate::schema::Schema;
use crate::tuple::{align_up, Tuple, TUPLE_HEADER_FIXED_SIZE};

/// A single item slot as seen by a listing operation: present when the
/// line pointer has a body, absent (unused slot) otherwise.
pub struct ItemView {
    pub index: usize,
    /// `None` for an unused line pointer; `Some(Err(_))` when decoding
    /// failed for this item specifically. Listing reports and skips
    /// per-item decode errors rather than aborting the whole page.
    pub decoded: Option<Result<Vec<DecodedField>>>,
}

/// New value supplied to [`Segment::update_item`]: either a typed row
/// (CSV-ish string values, `"NULL"` marking a null field) or a raw
/// replacement payload installed verbatim.
pub enum UpdateValue {
    Row(Vec<String>),
    Raw(Vec<u8>),
}

/// A loaded relation segment: pages in file order, plus the schema used
/// to decode/encode tuple payloads.
pub struct Segment {
    pub pages: Vec<Page>,
    pub schema: Schema,
}

impl Segment {
    pub fn open(path: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PgPeekError::InvalidPath(path.display().to_string())
            } else {
                PgPeekError::IoError(e)
            }
        })?;
        Self::from_bytes(&bytes, schema)
    }

    pub fn from_bytes(bytes: &[u8], schema: Schema) -> Result<Self> {
        let mut pages = Vec::new();
        let mut offset = 0usize;
        while offset < bytes.len() {
            let page = Page::parse(&bytes[offset..])?;
            let page_length = page.page_length();
            offset += page_length;
            pages.push(page);
        }
        Ok(Segment { pages, schema })
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, page_idx: usize) -> Result<&Page> {
        self.pages.get(page_idx).ok_or(PgPeekError::NoSuchPage(page_idx))
    }

    /// Every item slot of a page, each decoded against the segment's
    /// schema; decode failures are reported per-item, not propagated.
    pub fn list_page(&self, page_idx: usize) -> Result<Vec<ItemView>> {
        let page = self.page(page_idx)?;
        Ok(page
            .tuples
            .iter()
            .enumerate()
            .map(|(index, tuple)| ItemView {
                index,
                decoded: tuple
                    .as_ref()
                    .map(|t| row::deserialize(&t.payload, &t.header, &self.schema)),
            })
            .collect())
    }

    pub fn list_pages(&self) -> Result<Vec<(usize, Vec<ItemView>)>> {
        (0..self.pages.len()).map(|p| Ok((p, self.list_page(p)?))).collect()
    }

    fn tuple(&self, page_idx: usize, item_idx: usize) -> Result<&Tuple> {
        let page = self.page(page_idx)?;
        page.tuples
            .get(item_idx)
            .and_then(|t| t.as_ref())
            .ok_or(PgPeekError::NoSuchItem { page: page_idx, item: item_idx })
    }

    /// Decode a single item's fields, propagating any decode error
    /// directly (an explicit single-item read is not a bulk listing).
    pub fn read_item(&self, page_idx: usize, item_idx: usize) -> Result<Vec<DecodedField>> {
        let tuple = self.tuple(page_idx, item_idx)?;
        row::deserialize(&tuple.payload, &tuple.header, &self.schema)
    }

    /// The raw tuple payload bytes, independent of schema — used by
    /// `raw_update`'s verbatim-replacement path and by raw-mode reads.
    pub fn item_payload(&self, page_idx: usize, item_idx: usize) -> Result<&[u8]> {
        Ok(&self.tuple(page_idx, item_idx)?.payload)
    }

    /// Decide inline vs. new-item vs. new-page and mutate the segment in
    /// place. On error the segment is left untouched.
    pub fn update_item(&mut self, page_idx: usize, item_idx: usize, value: UpdateValue) -> Result<()> {
        let old_tuple = self.tuple(page_idx, item_idx)?;

        let (new_payload, new_header) = match value {
            UpdateValue::Row(values) => {
                if !matches!(&self.schema, Schema::Typed(_)) {
                    return Err(PgPeekError::UnsupportedFieldType(
                        "typed update requires a schema".to_string(),
                    ));
                }
                row::serialize(&values, &self.schema, &old_tuple.header)?
            }
            UpdateValue::Raw(bytes) => (bytes, old_tuple.header.clone()),
        };

        let old_payload_len = old_tuple.payload.len();

        if new_payload.len() <= old_payload_len {
            self.update_item_inline(page_idx, item_idx, new_payload, new_header)
        } else {
            self.update_item_new_item(page_idx, item_idx, new_payload, new_header)
        }
    }

    /// Overwrite the target slot in place. No page-geometry change.
    fn update_item_inline(
        &mut self,
        page_idx: usize,
        item_idx: usize,
        new_payload: Vec<u8>,
        new_header: crate::tuple::TupleHeader,
    ) -> Result<()> {
        let page = &mut self.pages[page_idx];
        let nullmap_byte_size = new_header.nullmap_byte_size();
        page.item_ids[item_idx].lp_len =
            (new_payload.len() + TUPLE_HEADER_FIXED_SIZE + nullmap_byte_size) as u16;
        page.tuples[item_idx] = Some(Tuple { header: new_header, payload: new_payload });
        Ok(())
    }

    /// Deep-copy the target tuple, mark the old one stale, and append the
    /// new version to the same page (or fall through to a new page when
    /// it doesn't fit).
    fn update_item_new_item(
        &mut self,
        page_idx: usize,
        item_idx: usize,
        new_payload: Vec<u8>,
        new_header: crate::tuple::TupleHeader,
    ) -> Result<()> {
        let mut new_item = Tuple { header: new_header, payload: new_payload };
        new_item.header.t_infomask |= InfomaskFlags::HEAP_XMAX_INVALID | InfomaskFlags::HEAP_UPDATED;

        let mut new_lp = self.pages[page_idx].item_ids[item_idx];

        {
            let old_header = &mut self.pages[page_idx].tuples[item_idx].as_mut().unwrap().header;
            old_header.t_infomask.remove(InfomaskFlags::HEAP_UPDATED | InfomaskFlags::HEAP_XMAX_INVALID);
            old_header.t_infomask2.flags |= Infomask2Flags::HEAP_HOT_UPDATED;
            old_header.t_xmax = old_header.t_xmin;
            old_header.t_xmin -= 1;

            new_item.header.t_xmin = old_header.t_xmax;
            new_item.header.t_xmax = 0;
        }
        self.pages[page_idx].item_ids[item_idx].lp_flags = LpFlags::Dead;

        let new_byte_length = align_up(new_item.to_bytes().len(), 8);
        new_lp.lp_len = new_byte_length as u16;

        let page = &self.pages[page_idx];
        let free_space = page.header.pd_upper as usize - page.header.pd_lower as usize;

        if new_byte_length > free_space {
            self.update_item_new_page(page_idx, new_lp, new_item, new_byte_length);
        } else {
            let page = &mut self.pages[page_idx];
            page.header.pd_lower += 4;
            page.header.pd_upper -= new_byte_length as u16;
            new_lp.lp_off = page.header.pd_upper;
            page.item_ids.push(new_lp);
            page.tuples.push(Some(new_item));
        }
        Ok(())
    }

    /// The new tuple doesn't fit in the source page; clone the page's
    /// metadata into a fresh one-slot page and append it to the segment.
    fn update_item_new_page(&mut self, page_idx: usize, mut new_lp: ItemId, new_item: Tuple, new_byte_length: usize) {
        let mut new_page = self.pages[page_idx].clone();
        new_page.header.pd_flags = crate::page::PdFlags::empty();
        new_page.header.pd_lower = (PAGE_HEADER_SIZE + 4) as u16;
        new_page.header.pd_upper = (new_page.page_length() - new_byte_length) as u16;
        new_lp.lp_off = new_page.header.pd_upper;
        new_page.item_ids = vec![new_lp];
        new_page.tuples = vec![Some(new_item)];
        self.pages.push(new_page);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for page in &self.pages {
            out.extend(page.to_bytes()?);
        }
        Ok(out)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(PgPeekError::IoError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infomask::Infomask2;
    use crate::itemptr::ItemPointer;
    use crate::schema::{Alignment, Column};
    use crate::tuple::TupleHeader;

    fn page_with_one_tuple(page_length: u16, payload: &[u8]) -> Page {
        let mut header = TupleHeader {
            t_xmin: 100,
            t_xmax: 0,
            t_cid: 0,
            t_ctid: ItemPointer::default(),
            t_infomask2: Infomask2 { natts: 2, flags: Infomask2Flags::empty() },
            t_infomask: InfomaskFlags::empty(),
            t_hoff: 0,
            nullmap: Default::default(),
        };
        header.recompute_t_hoff();
        let tuple = Tuple { header, payload: payload.to_vec() };
        let tuple_len = align_up(tuple.to_bytes().len(), 8);

        let pd_upper = page_length - tuple_len as u16;
        let page_header = crate::page::PageHeader {
            pd_lsn: 0,
            pd_checksum: 0,
            pd_flags: crate::page::PdFlags::empty(),
            pd_lower: (PAGE_HEADER_SIZE + 4) as u16,
            pd_upper,
            pd_special: page_length,
            page_size: page_length,
            version: crate::page::PdPageVersion::Postgres83Plus,
            pd_prune_xid: 0,
        };
        Page {
            header: page_header,
            item_ids: vec![ItemId { lp_off: pd_upper, lp_flags: LpFlags::Normal, lp_len: tuple_len as u16 }],
            tuples: vec![Some(tuple)],
        }
    }

    fn schema_id_name() -> Schema {
        Schema::Typed(vec![
            Column { name: "id".into(), type_tag: "int4".into(), length: 4, alignment: Alignment::Int },
            Column { name: "name".into(), type_tag: "varchar".into(), length: -1, alignment: Alignment::Int },
        ])
    }

    fn payload_for(id: i32, name: &str) -> Vec<u8> {
        let (payload, _) =
            row::serialize(&[id.to_string(), name.to_string()], &schema_id_name(), &{
                let mut h = TupleHeader {
                    t_xmin: 1,
                    t_xmax: 0,
                    t_cid: 0,
                    t_ctid: ItemPointer::default(),
                    t_infomask2: Infomask2 { natts: 2, flags: Infomask2Flags::empty() },
                    t_infomask: InfomaskFlags::empty(),
                    t_hoff: 0,
                    nullmap: Default::default(),
                };
                h.recompute_t_hoff();
                h
            })
            .unwrap();
        payload
    }

    #[test]
    fn inline_update_preserves_page_geometry() {
        let payload = payload_for(42, "LongerName");
        let page = page_with_one_tuple(8192, &payload);
        let mut segment = Segment { pages: vec![page], schema: schema_id_name() };

        let before_lower = segment.pages[0].header.pd_lower;
        let before_upper = segment.pages[0].header.pd_upper;

        segment
            .update_item(0, 0, UpdateValue::Row(vec!["42".to_string(), "Sh".to_string()]))
            .unwrap();

        assert_eq!(segment.pages[0].header.pd_lower, before_lower);
        assert_eq!(segment.pages[0].header.pd_upper, before_upper);
        assert_eq!(segment.pages[0].item_ids.len(), 1);

        let decoded = segment.read_item(0, 0).unwrap();
        assert_eq!(decoded[0].value, row::Field::Int(42));
        assert_eq!(decoded[1].value, row::Field::Bytes(b"Sh".to_vec()));
    }

    #[test]
    fn new_item_update_grows_lower_and_shrinks_upper() {
        let payload = payload_for(1, "abc");
        let page = page_with_one_tuple(8192, &payload);
        let mut segment = Segment { pages: vec![page], schema: schema_id_name() };

        let before_lower = segment.pages[0].header.pd_lower;
        let before_upper = segment.pages[0].header.pd_upper;
        let original_xmin = segment.pages[0].tuples[0].as_ref().unwrap().header.t_xmin;

        let long_name = "x".repeat(200);
        segment
            .update_item(0, 0, UpdateValue::Row(vec!["1".to_string(), long_name.clone()]))
            .unwrap();

        assert_eq!(segment.pages[0].header.pd_lower, before_lower + 4);
        assert_eq!(segment.pages[0].item_ids.len(), 2);
        assert!(segment.pages[0].header.pd_upper < before_upper);

        let old_lp = segment.pages[0].item_ids[0];
        assert_eq!(old_lp.lp_flags, LpFlags::Dead);

        let old_header = &segment.pages[0].tuples[0].as_ref().unwrap().header;
        assert_eq!(old_header.t_xmin, original_xmin - 1);
        assert_eq!(old_header.t_xmax, original_xmin);
        assert!(old_header.t_infomask2.flags.contains(Infomask2Flags::HEAP_HOT_UPDATED));

        let new_lp = segment.pages[0].item_ids[1];
        assert_eq!(new_lp.lp_off, segment.pages[0].header.pd_upper);

        let new_header = &segment.pages[0].tuples[1].as_ref().unwrap().header;
        assert!(new_header.t_infomask.contains(InfomaskFlags::HEAP_XMAX_INVALID | InfomaskFlags::HEAP_UPDATED));
        assert_eq!(new_header.t_xmin, original_xmin);
        assert_eq!(new_header.t_xmax, 0);

        let decoded = segment.read_item(0, 1).unwrap();
        assert_eq!(decoded[1].value, row::Field::Bytes(long_name.into_bytes()));
    }

    #[test]
    fn update_forcing_new_page_appends_a_page() {
        // Tiny page: header + one slot + an already-packed tuple leaves
        // no free space for growth, forcing the new-page branch.
        let payload = payload_for(1, "ab");
        let exact_len = PAGE_HEADER_SIZE + 4 + align_up(
            Tuple { header: {
                let mut h = TupleHeader {
                    t_xmin: 100, t_xmax: 0, t_cid: 0, t_ctid: ItemPointer::default(),
                    t_infomask2: Infomask2 { natts: 2, flags: Infomask2Flags::empty() },
                    t_infomask: InfomaskFlags::empty(), t_hoff: 0, nullmap: Default::default(),
                };
                h.recompute_t_hoff();
                h
            }, payload: payload.clone() }.to_bytes().len(),
            8,
        );
        let page = page_with_one_tuple(exact_len as u16, &payload);
        let mut segment = Segment { pages: vec![page], schema: schema_id_name() };

        segment
            .update_item(0, 0, UpdateValue::Row(vec!["1".to_string(), "a much longer replacement string".to_string()]))
            .unwrap();

        assert_eq!(segment.num_pages(), 2);
        assert_eq!(segment.pages[1].item_ids.len(), 1);
        let old_lp = segment.pages[0].item_ids[0];
        assert_eq!(old_lp.lp_flags, LpFlags::Dead);
        let decoded = segment.read_item(1, 0).unwrap();
        assert_eq!(decoded[1].value, row::Field::Bytes(b"a much longer replacement string".to_vec()));
    }

    #[test]
    fn no_such_page_and_item_errors() {
        let page = page_with_one_tuple(8192, &payload_for(1, "a"));
        let segment = Segment { pages: vec![page], schema: schema_id_name() };
        assert!(matches!(segment.page(5), Err(PgPeekError::NoSuchPage(5))));
        assert!(matches!(
            segment.read_item(0, 9),
            Err(PgPeekError::NoSuchItem { page: 0, item: 9 })
        ));
    }
}
