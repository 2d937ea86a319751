//! Listing every xattr name of a file, hidden ones included.

use crate::cursor::{Advance, Cursor, Query};
use crate::format::WireFormat;
use crate::gate::{CallGate, Exchange};
use crate::record::{ListXattrHidden, Opcode, XattrPos};
use crate::serialize;
use crate::utils::Result;

/// Name buffer size in bytes unless changed
pub const DEFAULT_BUFFER: usize = 256 * 1024;

/// Names of all xattrs of the gate's file.
///
/// The batch size is the name buffer size in bytes. The kernel returns the
/// number of bytes of NUL terminated names it wrote and updates the resume
/// positions in the request.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HiddenXattrs;

impl Query for HiddenXattrs {
    type Pos = XattrPos;
    type Item = Vec<u8>;

    const OPCODE: Opcode = Opcode::ListXattrHidden;
    const NAME: &'static str = "listxattr hidden";

    fn buffer_len(&self, batch: usize, _format: WireFormat) -> usize {
        batch
    }

    fn max_batch(&self) -> usize {
        u32::MAX as usize
    }

    fn request(
        &self,
        pos: &XattrPos,
        xchg: &Exchange<'_>,
        batch: usize,
        format: WireFormat,
    ) -> Result<Vec<u8>> {
        let req = ListXattrHidden {
            id_pos: pos.id_pos,
            buf_ptr: xchg.output_ptr(),
            buf_bytes: batch as u32,
            hash_pos: pos.hash_pos,
        };
        serialize::to_bytes(&req, format)
    }

    fn decode(
        &self,
        count: usize,
        xchg: &Exchange<'_>,
        _format: WireFormat,
    ) -> Result<Vec<Vec<u8>>> {
        let Some(names) = xchg.output().get(..count) else {
            return Err(crate::error::Error::Framing {
                record: "xattr names",
                needed: count,
                got: xchg.output().len(),
            });
        };
        Ok(split_names(names))
    }

    fn advance(
        &self,
        _pos: &XattrPos,
        _items: &mut Vec<Vec<u8>>,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Advance<XattrPos>> {
        let req: ListXattrHidden = serialize::from_bytes(xchg.record(), format)?;
        Ok(Advance::To(XattrPos {
            id_pos: req.id_pos,
            hash_pos: req.hash_pos,
        }))
    }
}

/// Names in a buffer of NUL terminated names; an unterminated tail is dropped.
fn split_names(buf: &[u8]) -> Vec<Vec<u8>> {
    let mut names: Vec<Vec<u8>> = buf.split(|&b| b == 0).map(<[u8]>::to_vec).collect();
    names.pop();
    names
}

/// Cursor over a file's xattr names
pub type XattrLister<G> = Cursor<G, HiddenXattrs>;

/// List the xattr names of the file the gate was opened on.
pub fn list_xattr_hidden<G: CallGate>(gate: G) -> XattrLister<G> {
    Cursor::new(gate, HiddenXattrs, XattrPos::default(), DEFAULT_BUFFER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_split_on_nul() {
        assert_eq!(
            split_names(b"user.a\0scoutfs.hide.b\0"),
            vec![b"user.a".to_vec(), b"scoutfs.hide.b".to_vec()]
        );
        assert_eq!(split_names(b"user.a\0trunc"), vec![b"user.a".to_vec()]);
        assert!(split_names(b"").is_empty());
    }
}
