//! Reading the xattr index between two positions.

use crate::cursor::{Advance, Cursor, Query};
use crate::format::WireFormat;
use crate::gate::{CallGate, Exchange};
use crate::key::CompositeKey;
use crate::record::{IndexEntry, Opcode, ReadXattrIndex};
use crate::serialize::{self, Record};
use crate::utils::Result;

/// Entries asked for per call unless changed
pub const DEFAULT_BATCH: usize = 128;

/// Xattr index entries from a start position up to an inclusive bound.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct XattrIndex {
    last: IndexEntry,
}

impl XattrIndex {
    pub fn new(last: IndexEntry) -> XattrIndex {
        XattrIndex { last }
    }

    pub fn set_last(&mut self, last: IndexEntry) {
        self.last = last;
    }
}

impl Default for XattrIndex {
    fn default() -> Self {
        XattrIndex::new(IndexEntry::MAX)
    }
}

impl Query for XattrIndex {
    type Pos = IndexEntry;
    type Item = IndexEntry;

    const OPCODE: Opcode = Opcode::ReadXattrIndex;
    const NAME: &'static str = "read xattr index";

    fn buffer_len(&self, batch: usize, format: WireFormat) -> usize {
        IndexEntry::size(format) * batch
    }

    fn request(
        &self,
        pos: &IndexEntry,
        xchg: &Exchange<'_>,
        batch: usize,
        format: WireFormat,
    ) -> Result<Vec<u8>> {
        let req = ReadXattrIndex {
            flags: 0,
            first: *pos,
            last: self.last,
            ptr: xchg.output_ptr(),
            nr: batch as u64,
        };
        serialize::to_bytes(&req, format)
    }

    fn decode(
        &self,
        count: usize,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Vec<IndexEntry>> {
        serialize::decode_array(xchg.output(), count, format)
    }

    fn advance(
        &self,
        _pos: &IndexEntry,
        items: &mut Vec<IndexEntry>,
        _xchg: &Exchange<'_>,
        _format: WireFormat,
    ) -> Result<Advance<IndexEntry>> {
        Ok(match items.last().and_then(|e| e.increment()) {
            Some(next) if next <= self.last => Advance::To(next),
            _ => Advance::Done,
        })
    }
}

/// Cursor over the xattr index
pub type IndexReader<G> = Cursor<G, XattrIndex>;

/// Read index entries from `first` through `last`.
pub fn xattr_index<G: CallGate>(gate: G, first: IndexEntry, last: IndexEntry) -> IndexReader<G> {
    Cursor::new(gate, XattrIndex::new(last), first, DEFAULT_BATCH)
}
