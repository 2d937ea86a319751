//! Inode walk over the metadata or data sequence index.

use crate::cursor::{Advance, Cursor, Query};
use crate::format::WireFormat;
use crate::gate::{CallGate, Exchange};
use crate::key::CompositeKey;
use crate::record::{InodeEntry, Opcode, SeqIndex, WalkInodes};
use crate::serialize::{self, Record};
use crate::utils::Result;

/// Entries asked for per call unless changed
pub const DEFAULT_BATCH: usize = 128;

/// Walk of one sequence index between two inclusive bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InodeWalk {
    index: SeqIndex,
    last: InodeEntry,
}

impl InodeWalk {
    pub fn new(index: SeqIndex) -> InodeWalk {
        InodeWalk {
            index,
            last: InodeEntry::MAX,
        }
    }

    pub fn index(&self) -> SeqIndex {
        self.index
    }

    /// Stop after `last` instead of the end of the index.
    pub fn set_last(&mut self, last: InodeEntry) {
        self.last = last;
    }
}

impl Query for InodeWalk {
    type Pos = InodeEntry;
    type Item = InodeEntry;

    const OPCODE: Opcode = Opcode::WalkInodes;
    const NAME: &'static str = "walk inodes";

    fn buffer_len(&self, batch: usize, format: WireFormat) -> usize {
        InodeEntry::size(format) * batch
    }

    fn max_batch(&self) -> usize {
        u32::MAX as usize
    }

    fn request(
        &self,
        pos: &InodeEntry,
        xchg: &Exchange<'_>,
        batch: usize,
        format: WireFormat,
    ) -> Result<Vec<u8>> {
        let walk = WalkInodes {
            first: *pos,
            last: self.last,
            entries_ptr: xchg.output_ptr(),
            nr_entries: batch as u32,
            index: self.index as u8,
        };
        serialize::to_bytes(&walk, format)
    }

    fn decode(
        &self,
        count: usize,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Vec<InodeEntry>> {
        serialize::decode_array(xchg.output(), count, format)
    }

    fn advance(
        &self,
        _pos: &InodeEntry,
        items: &mut Vec<InodeEntry>,
        _xchg: &Exchange<'_>,
        _format: WireFormat,
    ) -> Result<Advance<InodeEntry>> {
        Ok(match items.last().and_then(|e| e.increment()) {
            Some(next) if next <= self.last => Advance::To(next),
            _ => Advance::Done,
        })
    }
}

/// Cursor over an inode sequence index
pub type InodeWalker<G> = Cursor<G, InodeWalk>;

/// Walk inodes by metadata change sequence from `first` to `last`.
pub fn by_meta_seq<G: CallGate>(gate: G, first: InodeEntry, last: InodeEntry) -> InodeWalker<G> {
    by_index(gate, SeqIndex::Meta, first, last)
}

/// Walk inodes by data change sequence from `first` to `last`.
pub fn by_data_seq<G: CallGate>(gate: G, first: InodeEntry, last: InodeEntry) -> InodeWalker<G> {
    by_index(gate, SeqIndex::Data, first, last)
}

fn by_index<G: CallGate>(
    gate: G,
    index: SeqIndex,
    first: InodeEntry,
    last: InodeEntry,
) -> InodeWalker<G> {
    let mut walk = InodeWalk::new(index);
    walk.set_last(last);
    Cursor::new(gate, walk, first, DEFAULT_BATCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_index_and_bounds() {
        let mut walk = InodeWalk::new(SeqIndex::Data);
        walk.set_last(InodeEntry::new(50, 0));
        let mut out = vec![0u8; 48];
        let xchg = Exchange::new(&[], &mut out);
        let bytes = walk
            .request(&InodeEntry::new(3, 9), &xchg, 2, WireFormat::V2)
            .unwrap();
        let req: WalkInodes = serialize::from_bytes(&bytes, WireFormat::V2).unwrap();
        assert_eq!(req.first, InodeEntry::new(3, 9));
        assert_eq!(req.last, InodeEntry::new(50, 0));
        assert_eq!(req.nr_entries, 2);
        assert_eq!(req.index, 1);
        assert_eq!(req.entries_ptr, xchg.output_ptr());
    }

    #[test]
    fn stops_past_last_or_at_max() {
        let mut walk = InodeWalk::new(SeqIndex::Meta);
        walk.set_last(InodeEntry::new(5, 10));
        let xchg = Exchange::bare();
        let f = WireFormat::V2;

        let mut items = vec![InodeEntry::new(5, 9)];
        assert_eq!(
            walk.advance(&InodeEntry::MIN, &mut items, &xchg, f).unwrap(),
            Advance::To(InodeEntry::new(5, 10))
        );
        let mut items = vec![InodeEntry::new(5, 10)];
        assert_eq!(
            walk.advance(&InodeEntry::MIN, &mut items, &xchg, f).unwrap(),
            Advance::Done
        );

        let walk = InodeWalk::new(SeqIndex::Meta);
        let mut items = vec![InodeEntry::MAX];
        assert_eq!(
            walk.advance(&InodeEntry::MIN, &mut items, &xchg, f).unwrap(),
            Advance::Done
        );
    }
}
