//! Single request operations: no cursor, one call each.

use crate::gate::{CallGate, Exchange, call_growing};
use crate::record::*;
use crate::serialize::{self, Record};
use crate::utils::{self, Result};
use crate::{io_err, res};
use log::debug;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::os::fd::AsRawFd;

/// Allocator descriptions asked for before growing
pub const ALLOC_DETAIL_BATCH: usize = 4096;

/// Call `op` with `rec` and decode the record the kernel wrote back.
fn exchange<G: CallGate, T: Record>(gate: &G, op: Opcode, rec: &T) -> Result<T> {
    let format = gate.format();
    let mut xchg = Exchange::bare();
    xchg.set_record(rec, format)?;
    gate.call(op, &mut xchg)?;
    serialize::from_bytes(xchg.record(), format)
}

fn send<G: CallGate, T: Record>(gate: &G, op: Opcode, rec: &T) -> Result<usize> {
    let mut xchg = Exchange::bare();
    xchg.set_record(rec, gate.format())?;
    gate.call(op, &mut xchg)
}

/// scoutfs metadata of the gate's inode.
pub fn stat_more<G: CallGate>(gate: &G) -> Result<StatMore> {
    exchange(gate, Opcode::StatMore, &StatMore::default())
}

/// Set size, data version and times of the gate's inode as a restore tool
/// would.
pub fn setattr_more<G: CallGate>(gate: &G, attrs: &SetattrMore) -> Result<()> {
    send(gate, Opcode::SetattrMore, attrs).map(drop)
}

/// Extended attributes of the gate's inode; only the fields in `mask` are
/// meaningful in the result.
pub fn get_attr_x<G: CallGate>(gate: &G, mask: AttrXMask) -> Result<InodeAttrX> {
    exchange(
        gate,
        Opcode::GetAttrX,
        &InodeAttrX {
            mask,
            ..Default::default()
        },
    )
}

/// Set the fields of `attrs` named by its mask.
pub fn set_attr_x<G: CallGate>(gate: &G, attrs: &InodeAttrX) -> Result<()> {
    send(gate, Opcode::SetAttrX, attrs).map(drop)
}

pub fn project_id<G: CallGate>(gate: &G) -> Result<u64> {
    Ok(get_attr_x(gate, AttrXMask::PROJECT_ID)?.project_id)
}

pub fn set_project_id<G: CallGate>(gate: &G, project_id: u64) -> Result<()> {
    set_attr_x(
        gate,
        &InodeAttrX {
            mask: AttrXMask::PROJECT_ID,
            project_id,
            ..Default::default()
        },
    )
}

/// Free the extents of a byte range and mark it offline. Offset and length
/// must be multiples of `BLOCK_SIZE`.
pub fn release<G: CallGate>(gate: &G, offset: u64, length: u64, version: u64) -> Result<()> {
    let rel = Release {
        offset,
        length,
        version,
    };
    send(gate, Opcode::Release, &rel).map(drop)
}

/// Release a whole file of `size` bytes.
pub fn release_file<G: CallGate>(gate: &G, size: u64, version: u64) -> Result<()> {
    release(gate, 0, utils::round_up(size, BLOCK_SIZE), version)
}

/// Write `data` into offline extents at `offset`, returning bytes staged.
pub fn stage<G: CallGate>(gate: &G, version: u64, offset: u64, data: &[u8]) -> Result<usize> {
    let Ok(length) = i32::try_from(data.len()) else {
        return res!(io_err!(InvalidInput, "stage buffer too large"));
    };
    let mut xchg = Exchange::new(data, &mut []);
    let st = Stage {
        data_version: version,
        buf_ptr: xchg.input_ptr(),
        offset,
        length,
    };
    xchg.set_record(&st, gate.format())?;
    gate.call(Opcode::Stage, &mut xchg)
}

/// Move extents from another file into the gate's file.
pub fn move_blocks<G: CallGate>(gate: &G, mb: &MoveBlocks) -> Result<()> {
    debug!(
        "move {} bytes from fd {} at {} to {}",
        mb.len, mb.from_fd, mb.from_off, mb.to_off
    );
    send(gate, Opcode::MoveBlocks, mb).map(drop)
}

fn truncate_source(from: &File) -> Result<()> {
    from.set_len(0)?;
    let mut f = from;
    f.seek(SeekFrom::Start(0))?;
    Ok(())
}

/// Append all of `from`'s extents to the gate's file, which is `to_size`
/// bytes long, then truncate `from`.
pub fn move_data<G: CallGate>(gate: &G, from: &File, to_size: u64) -> Result<()> {
    move_blocks(
        gate,
        &MoveBlocks {
            from_fd: from.as_raw_fd() as u64,
            from_off: 0,
            len: from.metadata()?.len(),
            to_off: to_size,
            data_version: 0,
            flags: MoveFlags::empty(),
        },
    )?;
    truncate_source(from)
}

/// Move all of `from`'s extents into offline extents of the gate's file at
/// `offset`, then truncate `from`.
pub fn stage_move<G: CallGate>(gate: &G, from: &File, offset: u64, version: u64) -> Result<()> {
    move_blocks(
        gate,
        &MoveBlocks {
            from_fd: from.as_raw_fd() as u64,
            from_off: 0,
            len: from.metadata()?.len(),
            to_off: offset,
            data_version: version,
            flags: MoveFlags::STAGE,
        },
    )?;
    truncate_source(from)
}

/// Move `len` bytes of extents at `from_off` of `from` into offline extents
/// at `to_off`. The source is left as is.
pub fn stage_move_at<G: CallGate, F: AsRawFd>(
    gate: &G,
    from: &F,
    len: u64,
    from_off: u64,
    to_off: u64,
    version: u64,
) -> Result<()> {
    move_blocks(
        gate,
        &MoveBlocks {
            from_fd: from.as_raw_fd() as u64,
            from_off,
            len,
            to_off,
            data_version: version,
            flags: MoveFlags::STAGE,
        },
    )
}

pub fn statfs_more<G: CallGate>(gate: &G) -> Result<StatfsMore> {
    exchange(gate, Opcode::StatfsMore, &StatfsMore::default())
}

/// Identity of a mounted volume.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FsIds {
    pub fsid: u64,
    pub rid: u64,
    /// `f.<fsid>.r.<rid>` with each id cut to six hex digits, as used in
    /// sysfs and kernel messages
    pub short_id: String,
    pub committed_seq: u64,
}

pub fn short_id(fsid: u64, rid: u64) -> String {
    let (f, r) = (format!("{:016x}", fsid), format!("{:016x}", rid));
    format!("f.{}.r.{}", &f[..6], &r[..6])
}

pub fn fs_ids<G: CallGate>(gate: &G) -> Result<FsIds> {
    let st = statfs_more(gate)?;
    Ok(FsIds {
        fsid: st.fsid,
        rid: st.rid,
        short_id: short_id(st.fsid, st.rid),
        committed_seq: st.committed_seq,
    })
}

/// Block totals and free counts of a volume.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_meta_blocks: u64,
    pub free_meta_blocks: u64,
    pub total_data_blocks: u64,
    pub free_data_blocks: u64,
}

/// Every free space allocator of the volume.
pub fn alloc_detail<G: CallGate>(gate: &G) -> Result<Vec<AllocDetailEntry>> {
    let format = gate.format();
    let entry = AllocDetailEntry::size(format);
    call_growing(ALLOC_DETAIL_BATCH * entry, |buf| {
        let nr = (buf.len() / entry) as u64;
        let mut xchg = Exchange::new(&[], buf);
        let ad = AllocDetail {
            ptr: xchg.output_ptr(),
            nr,
        };
        xchg.set_record(&ad, format)?;
        let n = gate.call(Opcode::AllocDetail, &mut xchg)?;
        serialize::decode_array(xchg.output(), n, format)
    })
}

pub fn disk_usage<G: CallGate>(gate: &G) -> Result<DiskUsage> {
    let st = statfs_more(gate)?;
    let (meta, data): (Vec<_>, Vec<_>) = alloc_detail(gate)?
        .into_iter()
        .partition(|e| e.flags.contains(AllocFlags::META));
    Ok(DiskUsage {
        total_meta_blocks: st.total_meta_blocks,
        free_meta_blocks: meta.iter().map(|e| e.blocks).sum(),
        total_data_blocks: st.total_data_blocks,
        free_data_blocks: data.iter().map(|e| e.blocks).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_use_six_hex_digits() {
        assert_eq!(
            short_id(0x0123456789abcdef, 0xfedcba9876543210),
            "f.012345.r.fedcba"
        );
        assert_eq!(short_id(0, 0x1), "f.000000.r.000000");
    }
}
