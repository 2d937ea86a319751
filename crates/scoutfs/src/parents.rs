//! Directory entries that refer to an inode.
//!
//! Each returned entry carries its own position in its parent, which is the
//! resume point. An entry flagged last ends the listing regardless of how
//! many entries the call returned.

use crate::cursor::{Advance, Cursor, Query};
use crate::format::WireFormat;
use crate::gate::{CallGate, Exchange};
use crate::key::CompositeKey;
use crate::record::{BackReference, DirPos, GetReferringEntries, Opcode};
use crate::serialize::{self, DIRENT_HEADER};
use crate::utils::Result;

/// Entry buffer size in bytes unless changed
pub const DEFAULT_BUFFER: usize = 4 * 1024 * 1024;

/// Referring entries of one inode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReferringEntries {
    ino: u64,
}

impl ReferringEntries {
    pub fn new(ino: u64) -> ReferringEntries {
        ReferringEntries { ino }
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }
}

/// The batch size of this listing is the entry buffer size in bytes, since
/// entries vary in length.
impl Query for ReferringEntries {
    type Pos = DirPos;
    type Item = BackReference;

    const OPCODE: Opcode = Opcode::GetReferringEntries;
    const NAME: &'static str = "get referring entries";

    fn buffer_len(&self, batch: usize, _format: WireFormat) -> usize {
        batch.max(DIRENT_HEADER + u8::MAX as usize)
    }

    fn request(
        &self,
        pos: &DirPos,
        xchg: &Exchange<'_>,
        _batch: usize,
        format: WireFormat,
    ) -> Result<Vec<u8>> {
        let req = GetReferringEntries {
            ino: self.ino,
            dir_ino: pos.dir_ino,
            dir_pos: pos.dir_pos,
            entries_ptr: xchg.output_ptr(),
            entries_bytes: xchg.output().len() as u64,
        };
        serialize::to_bytes(&req, format)
    }

    fn decode(
        &self,
        count: usize,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Vec<BackReference>> {
        serialize::decode_dirents(xchg.output(), count, format)
    }

    fn advance(
        &self,
        _pos: &DirPos,
        items: &mut Vec<BackReference>,
        _xchg: &Exchange<'_>,
        _format: WireFormat,
    ) -> Result<Advance<DirPos>> {
        Ok(match items.last() {
            Some(last) if !last.is_last() => match last.pos().increment() {
                Some(next) => Advance::To(next),
                None => Advance::Done,
            },
            _ => Advance::Done,
        })
    }
}

/// Cursor over the entries referring to an inode
pub type Parents<G> = Cursor<G, ReferringEntries>;

/// List entries referring to `ino`, reading through a 4MiB buffer.
pub fn referring_entries<G: CallGate>(gate: G, ino: u64) -> Parents<G> {
    Cursor::new(gate, ReferringEntries::new(ino), DirPos::MIN, DEFAULT_BUFFER)
}

/// Every directory entry referring to `ino`.
pub fn parents<G: CallGate>(gate: G, ino: u64) -> Result<Vec<BackReference>> {
    referring_entries(gate, ino).collect_all()
}
