//! Search for inodes that carry an xattr.
//!
//! The search index is append only, so a reply can come back empty while
//! more inodes remain. Only the end flag the kernel writes back into the
//! request ends the listing.

use crate::cursor::{Advance, Cursor, Query};
use crate::format::WireFormat;
use crate::gate::{CallGate, Exchange};
use crate::key::CompositeKey;
use crate::record::{Opcode, SearchFlags, SearchXattrs, XATTR_NAME_MAX};
use crate::serialize::{self, Record};
use crate::utils::Result;
use crate::{io_err, res};

/// Inode numbers asked for per call unless changed; a 1MiB buffer
pub const DEFAULT_BATCH: usize = 128 * 1024;

/// Inodes holding an xattr with an exact name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XattrSearch {
    name: Vec<u8>,
    last: u64,
}

impl XattrSearch {
    pub fn new(name: &[u8]) -> Result<XattrSearch> {
        if name.is_empty() || name.len() > XATTR_NAME_MAX {
            return res!(io_err!(
                InvalidInput,
                format!("xattr name must be 1 to {} bytes", XATTR_NAME_MAX)
            ));
        }
        Ok(XattrSearch {
            name: name.to_vec(),
            last: u64::MAX,
        })
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }
}

impl Query for XattrSearch {
    type Pos = u64;
    type Item = u64;

    const OPCODE: Opcode = Opcode::SearchXattrs;
    const NAME: &'static str = "search xattrs";

    fn buffer_len(&self, batch: usize, format: WireFormat) -> usize {
        u64::size(format) * batch
    }

    fn input(&self) -> &[u8] {
        &self.name
    }

    fn request(&self, pos: &u64, xchg: &Exchange<'_>, batch: usize, format: WireFormat) -> Result<Vec<u8>> {
        let sx = SearchXattrs {
            next_ino: *pos,
            last_ino: self.last,
            name_ptr: xchg.input_ptr(),
            inodes_ptr: xchg.output_ptr(),
            output_flags: SearchFlags::empty(),
            nr_inodes: batch as u64,
            name_bytes: self.name.len() as u16,
        };
        serialize::to_bytes(&sx, format)
    }

    fn end_of_results(&self, _count: usize, xchg: &Exchange<'_>, format: WireFormat) -> Result<bool> {
        let sx: SearchXattrs = serialize::from_bytes(xchg.record(), format)?;
        Ok(sx.output_flags.contains(SearchFlags::END))
    }

    fn decode(&self, count: usize, xchg: &Exchange<'_>, format: WireFormat) -> Result<Vec<u64>> {
        serialize::decode_array(xchg.output(), count, format)
    }

    fn advance(
        &self,
        _pos: &u64,
        items: &mut Vec<u64>,
        _xchg: &Exchange<'_>,
        _format: WireFormat,
    ) -> Result<Advance<u64>> {
        Ok(match items.last().and_then(|ino| ino.increment()) {
            Some(next) => Advance::To(next),
            None => Advance::Done,
        })
    }
}

/// Cursor over the inodes holding one xattr
pub type XattrSearcher<G> = Cursor<G, XattrSearch>;

/// Search from inode 0 for inodes that have the xattr `name`.
pub fn search_xattrs<G: CallGate>(gate: G, name: &[u8]) -> Result<XattrSearcher<G>> {
    Ok(Cursor::new(gate, XattrSearch::new(name)?, 0, DEFAULT_BATCH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_length_is_checked() {
        assert!(XattrSearch::new(b"").is_err());
        assert!(XattrSearch::new(&[b'a'; 256]).is_err());
        assert!(XattrSearch::new(&[b'a'; 255]).is_ok());
    }

    #[test]
    fn end_flag_comes_from_the_written_back_record() {
        let f = WireFormat::V2;
        let q = XattrSearch::new(b"scoutfs.srch.tag").unwrap();
        let mut out = vec![0u8; 8];
        let mut xchg = Exchange::new(q.input(), &mut out);
        let req = q.request(&7, &xchg, 1, f).unwrap();
        xchg.set_raw_record(req);
        assert!(!q.end_of_results(0, &xchg, f).unwrap());

        xchg.record_mut()[32] = 1;
        assert!(q.end_of_results(0, &xchg, f).unwrap());
    }
}
