//! `.totl.` xattr aggregates.
//!
//! Each total is keyed by a three word id. A single lookup reads one id
//! exactly; a group listing walks every id sharing the first two words.

use crate::cursor::{Advance, Cursor, Query};
use crate::format::WireFormat;
use crate::gate::{CallGate, Exchange};
use crate::key::CompositeKey;
use crate::record::{Opcode, ReadXattrTotals, XattrTotal};
use crate::serialize::{self, Record};
use crate::utils::Result;
use log::debug;

/// Read the total for exactly `id`.
///
/// An id with no total reads as zero total and zero count.
pub fn read_xattr_total<G: CallGate>(gate: &G, id: [u64; 3]) -> Result<XattrTotal> {
    let format = gate.format();
    let mut out = vec![0u8; XattrTotal::size(format)];
    let mut xchg = Exchange::new(&[], &mut out);
    let req = ReadXattrTotals {
        pos_name: id,
        totals_ptr: xchg.output_ptr(),
        totals_bytes: XattrTotal::size(format) as u64,
    };
    xchg.set_record(&req, format)?;

    let n = gate.call(Opcode::ReadXattrTotals, &mut xchg)?;
    if n > 0 {
        let found: XattrTotal = serialize::from_bytes(xchg.output(), format)?;
        if found.name == id {
            return Ok(found);
        }
    }
    Ok(XattrTotal {
        name: id,
        ..Default::default()
    })
}

/// Totals whose ids share the two leading words.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TotalsGroup {
    prefix: [u64; 2],
}

impl TotalsGroup {
    pub fn new(id1: u64, id2: u64) -> TotalsGroup {
        TotalsGroup { prefix: [id1, id2] }
    }

    /// First id in the group
    pub fn first(&self) -> [u64; 3] {
        [self.prefix[0], self.prefix[1], 0]
    }

    fn contains(&self, name: &[u64; 3]) -> bool {
        name[..2] == self.prefix
    }
}

impl Query for TotalsGroup {
    type Pos = [u64; 3];
    type Item = XattrTotal;

    const OPCODE: Opcode = Opcode::ReadXattrTotals;
    const NAME: &'static str = "totals group";

    fn buffer_len(&self, batch: usize, format: WireFormat) -> usize {
        XattrTotal::size(format) * batch
    }

    fn request(
        &self,
        pos: &[u64; 3],
        xchg: &Exchange<'_>,
        batch: usize,
        format: WireFormat,
    ) -> Result<Vec<u8>> {
        let req = ReadXattrTotals {
            pos_name: *pos,
            totals_ptr: xchg.output_ptr(),
            totals_bytes: (XattrTotal::size(format) * batch) as u64,
        };
        serialize::to_bytes(&req, format)
    }

    fn decode(
        &self,
        count: usize,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Vec<XattrTotal>> {
        serialize::decode_array(xchg.output(), count, format)
    }

    fn advance(
        &self,
        _pos: &[u64; 3],
        items: &mut Vec<XattrTotal>,
        _xchg: &Exchange<'_>,
        _format: WireFormat,
    ) -> Result<Advance<[u64; 3]>> {
        if let Some(i) = items.iter().position(|t| !self.contains(&t.name)) {
            debug!("totals group {:?} ends at {:?}", self.prefix, items[i].name);
            items.truncate(i);
            return Ok(Advance::Done);
        }
        let Some(last) = items.last() else {
            return Ok(Advance::Done);
        };
        Ok(match last.name[2].increment() {
            Some(id3) => Advance::To([self.prefix[0], self.prefix[1], id3]),
            None => Advance::Done,
        })
    }
}

/// Cursor over one totals group
pub type TotalsGrouper<G> = Cursor<G, TotalsGroup>;

/// List the totals of group `{id1, id2, *}`, `count` per call.
pub fn totals_group<G: CallGate>(gate: G, id1: u64, id2: u64, count: usize) -> TotalsGrouper<G> {
    let group = TotalsGroup::new(id1, id2);
    let first = group.first();
    Cursor::new(gate, group, first, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(a: u64, b: u64, c: u64) -> XattrTotal {
        XattrTotal {
            name: [a, b, c],
            total: a + b + c,
            count: 1,
        }
    }

    #[test]
    fn mismatched_prefix_truncates() {
        let g = TotalsGroup::new(1, 2);
        let xchg = Exchange::bare();
        let mut items = vec![total(1, 2, 5), total(1, 2, 9), total(1, 3, 0), total(1, 2, 10)];
        let adv = g
            .advance(&g.first(), &mut items, &xchg, WireFormat::V2)
            .unwrap();
        assert_eq!(adv, Advance::Done);
        assert_eq!(items, vec![total(1, 2, 5), total(1, 2, 9)]);
    }

    #[test]
    fn third_word_at_max_ends_the_group() {
        let g = TotalsGroup::new(1, 2);
        let xchg = Exchange::bare();
        let mut items = vec![total(1, 2, 3)];
        assert_eq!(
            g.advance(&g.first(), &mut items, &xchg, WireFormat::V2)
                .unwrap(),
            Advance::To([1, 2, 4])
        );
        let mut items = vec![XattrTotal {
            name: [1, 2, u64::MAX],
            ..Default::default()
        }];
        assert_eq!(
            g.advance(&g.first(), &mut items, &xchg, WireFormat::V2)
                .unwrap(),
            Advance::Done
        );
        assert_eq!(items.len(), 1);
    }
}
