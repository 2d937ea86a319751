//! Resolving inode numbers to paths.

use crate::cursor::{Advance, Cursor, Query};
use crate::error::Error;
use crate::format::WireFormat;
use crate::gate::{CallGate, Exchange};
use crate::key::CompositeKey;
use crate::record::{DirPos, InoPath, Opcode, PATH_MAX, PathResult};
use crate::serialize::{self, Decodable, PATH_RESULT_HEADER};
use crate::utils::Result;
use std::io;

/// Result buffer size: header plus the longest path
pub const RESULT_BYTES: usize = PATH_RESULT_HEADER + PATH_MAX;

fn request(ino: u64, pos: DirPos, xchg: &Exchange<'_>, format: WireFormat) -> Result<Vec<u8>> {
    let req = InoPath {
        ino,
        dir_ino: pos.dir_ino,
        dir_pos: pos.dir_pos,
        result_ptr: xchg.output_ptr(),
        result_bytes: xchg.output().len() as u16,
    };
    serialize::to_bytes(&req, format)
}

fn decode_result(buf: &[u8], format: WireFormat) -> Result<PathResult> {
    if buf.len() < PATH_RESULT_HEADER {
        return Err(Error::Framing {
            record: "path result",
            needed: PATH_RESULT_HEADER,
            got: buf.len(),
        });
    }
    let path_bytes = u16::from_le_bytes([buf[16], buf[17]]) as usize;
    if buf.len() < PATH_RESULT_HEADER + path_bytes {
        return Err(Error::Framing {
            record: "path result",
            needed: PATH_RESULT_HEADER + path_bytes,
            got: buf.len(),
        });
    }
    Ok(PathResult::decode(&mut io::Cursor::new(buf), format)?)
}

/// First path to `ino`, relative to the mount root.
pub fn ino_path<G: CallGate>(gate: &G, ino: u64) -> Result<PathResult> {
    let format = gate.format();
    let mut out = vec![0u8; RESULT_BYTES];
    let mut xchg = Exchange::new(&[], &mut out);
    let req = request(ino, DirPos::MIN, &xchg, format)?;
    xchg.set_raw_record(req);
    gate.call(Opcode::InoPath, &mut xchg)?;
    decode_result(xchg.output(), format)
}

/// Every path to one inode, one per call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InoPaths {
    ino: u64,
}

impl InoPaths {
    pub fn new(ino: u64) -> InoPaths {
        InoPaths { ino }
    }
}

impl Query for InoPaths {
    type Pos = DirPos;
    type Item = PathResult;

    const OPCODE: Opcode = Opcode::InoPath;
    const NAME: &'static str = "ino paths";

    fn buffer_len(&self, _batch: usize, _format: WireFormat) -> usize {
        RESULT_BYTES
    }

    fn request(
        &self,
        pos: &DirPos,
        xchg: &Exchange<'_>,
        _batch: usize,
        format: WireFormat,
    ) -> Result<Vec<u8>> {
        request(self.ino, *pos, xchg, format)
    }

    /// A successful call always produces exactly one path.
    fn count(&self, _ret: usize, _xchg: &Exchange<'_>, _format: WireFormat) -> Result<usize> {
        Ok(1)
    }

    fn decode(
        &self,
        _count: usize,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Vec<PathResult>> {
        Ok(vec![decode_result(xchg.output(), format)?])
    }

    fn advance(
        &self,
        _pos: &DirPos,
        items: &mut Vec<PathResult>,
        _xchg: &Exchange<'_>,
        _format: WireFormat,
    ) -> Result<Advance<DirPos>> {
        let next = items.last().and_then(|r| {
            DirPos {
                dir_ino: r.dir_ino,
                dir_pos: r.dir_pos,
            }
            .increment()
        });
        Ok(next.map_or(Advance::Done, Advance::To))
    }

    fn ends_on(&self, err: &Error) -> bool {
        matches!(err, Error::NotFound)
    }
}

/// Cursor over the paths to an inode
pub type PathWalker<G> = Cursor<G, InoPaths>;

pub fn path_walker<G: CallGate>(gate: G, ino: u64) -> PathWalker<G> {
    Cursor::new(gate, InoPaths::new(ino), DirPos::MIN, 1)
}

/// Every path to `ino`. An inode with no links has no paths.
pub fn ino_paths<G: CallGate>(gate: G, ino: u64) -> Result<Vec<PathResult>> {
    path_walker(gate, ino).collect_all()
}
