//! Serialize/deserialize ioctl records into/from their fixed binary layout.
//!
//! Every field is written explicitly in declared order, little-endian, with
//! padding emitted as zero bytes, so the bytes handed to the kernel never
//! depend on how the compiler lays out a struct.

use crate::{error::Error, format::WireFormat, io_err, record::*, res, utils};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Result};
use std::mem;
use std::ops::Shl;

macro_rules! decode {
    ($decoder:expr, $format:expr) => {
        Decodable::decode(&mut $decoder, $format)?
    };

    ($typ:ident, $buf:expr, $format:expr) => {
        $typ::from_bits_retain(decode!($buf, $format))
    };
}

fn read_exact<R: Read + ?Sized>(r: &mut R, size: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0; size];
    r.read_exact(&mut buf[..]).and(Ok(buf))
}

/// Fixed header of a path result, before the path bytes
pub const PATH_RESULT_HEADER: usize = 24;

/// Fixed header of a referring directory entry, before the name bytes
pub const DIRENT_HEADER: usize = 29;

/// A serializing specific result to overload operators on `Result`
///
/// # Overloaded operators
/// <<
pub struct SResult<T>(Result<T>);

impl<W> SResult<Encoder<W>> {
    /// Finish a `<<` chain, returning the bytes written.
    pub fn done(self) -> Result<usize> {
        self.0.map(|enc| enc.bytes)
    }
}

/// A wrapper class of WriteBytesExt to provide operator overloads
/// for serializing
///
/// Operator '<<' serializes the right hand side argument into
/// the left hand side encoder
#[derive(Clone, Debug)]
pub struct Encoder<W> {
    writer: W,
    bytes: usize,
    format: WireFormat,
}

impl<W: WriteBytesExt> Encoder<W> {
    pub fn new(writer: W, format: WireFormat) -> Encoder<W> {
        Encoder {
            writer,
            bytes: 0,
            format,
        }
    }

    /// Return total bytes written
    pub fn bytes_written(&self) -> usize {
        self.bytes
    }

    /// Encode data, equivalent to: encoder << data
    pub fn encode<T: Encodable>(&mut self, data: &T) -> Result<usize> {
        let bytes = data.encode(&mut self.writer, self.format)?;
        self.bytes += bytes;
        Ok(bytes)
    }

    /// Get inner writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<'a, T: Encodable, W: WriteBytesExt> Shl<&'a T> for Encoder<W> {
    type Output = SResult<Encoder<W>>;
    fn shl(mut self, rhs: &'a T) -> Self::Output {
        match self.encode(rhs) {
            Ok(_) => SResult(Ok(self)),
            Err(e) => SResult(Err(e)),
        }
    }
}

impl<'a, T: Encodable, W: WriteBytesExt> Shl<&'a T> for SResult<Encoder<W>> {
    type Output = Self;
    fn shl(self, rhs: &'a T) -> Self::Output {
        match self.0 {
            Ok(mut encoder) => match encoder.encode(rhs) {
                Ok(_) => SResult(Ok(encoder)),
                Err(e) => SResult(Err(e)),
            },
            Err(e) => SResult(Err(e)),
        }
    }
}

/// `N` bytes of explicit padding: written as zeroes, skipped when read
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Pad<const N: usize>;

/// Trait representing a type which can be serialized into binary
pub trait Encodable {
    /// Encode self to w and returns the number of bytes encoded
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize>;
}

/// Trait representing a type which can be deserialized from binary
pub trait Decodable: Sized {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self>;
}

/// A record with a fixed length in a given format
pub trait Record: Encodable + Decodable {
    /// Name used in framing errors
    const NAME: &'static str;

    /// Encoded length in bytes
    fn size(format: WireFormat) -> usize;
}

macro_rules! record {
    ($typ:ty, $name:expr, $size:expr) => {
        record!($typ, $name, $size, $size);
    };

    ($typ:ty, $name:expr, $size:expr, $packed:expr) => {
        impl Record for $typ {
            const NAME: &'static str = $name;
            fn size(format: WireFormat) -> usize {
                match format {
                    WireFormat::V1 => $packed,
                    WireFormat::V2 => $size,
                }
            }
        }
    };
}

record!(u64, "inode number", 8);
record!(InodeEntry, "walk inodes entry", 24, 20);
record!(WalkInodes, "walk inodes", 72, 53);
record!(InoPath, "ino path", 40);
record!(Release, "release", 24);
record!(Stage, "stage", 32);
record!(StatMore, "stat more", 56);
record!(DataWaitingEntry, "data waiting entry", 24, 17);
record!(DataWaiting, "data waiting", 40, 26);
record!(DataWaitErr, "data wait err", 48);
record!(SetattrMore, "setattr more", 48);
record!(ListXattrHidden, "listxattr hidden", 24);
record!(SearchXattrs, "search xattrs", 56);
record!(StatfsMore, "statfs more", 48);
record!(AllocDetail, "alloc detail", 16);
record!(AllocDetailEntry, "alloc detail entry", 24);
record!(MoveBlocks, "move blocks", 48);
record!(ReadXattrTotals, "read xattr totals", 40);
record!(XattrTotal, "xattr total", 40);
record!(GetReferringEntries, "get referring entries", 40);
record!(QuotaRule, "quota rule", 48);
record!(GetQuotaRules, "get quota rules", 32);
record!(IndexEntry, "xattr index entry", 24);
record!(ReadXattrIndex, "read xattr index", 72);
record!(InodeAttrX, "inode attr x", 104);
record!(FileHandle, "file handle", 24);

impl Encodable for u8 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, _: WireFormat) -> Result<usize> {
        w.write_u8(*self).and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for u16 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, _: WireFormat) -> Result<usize> {
        w.write_u16::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for u32 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, _: WireFormat) -> Result<usize> {
        w.write_u32::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for u64 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, _: WireFormat) -> Result<usize> {
        w.write_u64::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for i32 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, _: WireFormat) -> Result<usize> {
        w.write_i32::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for i64 {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, _: WireFormat) -> Result<usize> {
        w.write_i64::<LittleEndian>(*self)
            .and(Ok(mem::size_of::<Self>()))
    }
}

impl<const N: usize> Encodable for Pad<N> {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, _: WireFormat) -> Result<usize> {
        w.write_all(&[0u8; N]).and(Ok(N))
    }
}

impl<T: Encodable, const N: usize> Encodable for [T; N] {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        let mut bytes = 0;
        for e in self {
            bytes += e.encode(w, format)?;
        }
        Ok(bytes)
    }
}

impl Encodable for Time {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format) << &self.sec << &self.nsec).done()
    }
}

impl Encodable for InodeEntry {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        let enc = Encoder::new(w, format);
        match format {
            WireFormat::V1 => enc << &self.major << &self.minor << &self.ino,
            WireFormat::V2 => enc << &self.major << &self.ino << &self.minor << &Pad::<4>,
        }
        .done()
    }
}

impl Encodable for WalkInodes {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        let enc = Encoder::new(w, format)
            << &self.first
            << &self.last
            << &self.entries_ptr
            << &self.nr_entries
            << &self.index;
        match format {
            WireFormat::V1 => enc,
            WireFormat::V2 => enc << &Pad::<11>,
        }
        .done()
    }
}

impl Encodable for InoPath {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.ino
            << &self.dir_ino
            << &self.dir_pos
            << &self.result_ptr
            << &self.result_bytes
            << &Pad::<6>)
            .done()
    }
}

impl Encodable for PathResult {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        let Ok(path_bytes) = u16::try_from(self.path.len() + 1) else {
            return res!(io_err!(InvalidInput, "path longer than a path result holds"));
        };
        let bytes = (Encoder::new(&mut *w, format)
            << &self.dir_ino
            << &self.dir_pos
            << &path_bytes
            << &Pad::<6>)
            .done()?;
        w.write_all(&self.path)?;
        w.write_u8(0)?;
        Ok(bytes + path_bytes as usize)
    }
}

impl Encodable for Release {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format) << &self.offset << &self.length << &self.version).done()
    }
}

impl Encodable for Stage {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.data_version
            << &self.buf_ptr
            << &self.offset
            << &self.length
            << &Pad::<4>)
            .done()
    }
}

impl Encodable for StatMore {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.meta_seq
            << &self.data_seq
            << &self.data_version
            << &self.online_blocks
            << &self.offline_blocks
            << &self.crtime
            << &Pad::<4>)
            .done()
    }
}

impl Encodable for DataWaitingEntry {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        let enc = Encoder::new(w, format) << &self.ino << &self.iblock << &self.op.bits();
        match format {
            WireFormat::V1 => enc,
            WireFormat::V2 => enc << &Pad::<7>,
        }
        .done()
    }
}

impl Encodable for DataWaiting {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        match format {
            WireFormat::V1 => {
                Encoder::new(w, format)
                    << &self.after_ino
                    << &self.after_iblock
                    << &self.ents_ptr
                    << &self.ents_nr
            }
            WireFormat::V2 => {
                Encoder::new(w, format)
                    << &self.flags
                    << &self.after_ino
                    << &self.after_iblock
                    << &self.ents_ptr
                    << &self.ents_nr
                    << &Pad::<6>
            }
        }
        .done()
    }
}

impl Encodable for DataWaitErr {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.ino
            << &self.version
            << &self.offset
            << &self.count
            << &self.op
            << &self.err)
            .done()
    }
}

impl Encodable for SetattrMore {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.data_version
            << &self.i_size
            << &self.flags.bits()
            << &self.ctime.sec
            << &self.ctime.nsec
            << &self.crtime.nsec
            << &self.crtime.sec)
            .done()
    }
}

impl Encodable for ListXattrHidden {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.id_pos
            << &self.buf_ptr
            << &self.buf_bytes
            << &self.hash_pos)
            .done()
    }
}

impl Encodable for SearchXattrs {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.next_ino
            << &self.last_ino
            << &self.name_ptr
            << &self.inodes_ptr
            << &self.output_flags.bits()
            << &self.nr_inodes
            << &self.name_bytes
            << &Pad::<6>)
            .done()
    }
}

impl Encodable for StatfsMore {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.fsid
            << &self.rid
            << &self.committed_seq
            << &self.total_meta_blocks
            << &self.total_data_blocks
            << &self.reserved_meta_blocks)
            .done()
    }
}

impl Encodable for AllocDetail {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format) << &self.ptr << &self.nr).done()
    }
}

impl Encodable for AllocDetailEntry {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.id
            << &self.blocks
            << &self.typ
            << &self.flags.bits()
            << &Pad::<6>)
            .done()
    }
}

impl Encodable for MoveBlocks {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.from_fd
            << &self.from_off
            << &self.len
            << &self.to_off
            << &self.data_version
            << &self.flags.bits())
            .done()
    }
}

impl Encodable for ReadXattrTotals {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format) << &self.pos_name << &self.totals_ptr << &self.totals_bytes)
            .done()
    }
}

impl Encodable for XattrTotal {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format) << &self.name << &self.total << &self.count).done()
    }
}

impl Encodable for GetReferringEntries {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.ino
            << &self.dir_ino
            << &self.dir_pos
            << &self.entries_ptr
            << &self.entries_bytes)
            .done()
    }
}

impl Encodable for BackReference {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        let Ok(name_len) = u8::try_from(self.name.len()) else {
            return res!(io_err!(InvalidInput, "dirent name longer than 255 bytes"));
        };
        let entry_bytes = utils::round_up((DIRENT_HEADER + self.name.len()) as u64, 8) as u16;
        (Encoder::new(&mut *w, format)
            << &self.dir_ino
            << &self.dir_pos
            << &self.ino
            << &entry_bytes
            << &self.flags.bits()
            << &self.d_type
            << &name_len)
            .done()?;
        w.write_all(&self.name)?;
        let pad = entry_bytes as usize - DIRENT_HEADER - self.name.len();
        w.write_all(&vec![0; pad])?;
        Ok(entry_bytes as usize)
    }
}

impl Encodable for QuotaRule {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.name_val
            << &self.limit
            << &self.prio
            << &self.op
            << &self.rule_flags.bits()
            << &self.name_source
            << &self.name_flags
            << &Pad::<7>)
            .done()
    }
}

impl Encodable for QuotaIterator {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        self.0.encode(w, format)
    }
}

impl Encodable for GetQuotaRules {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format) << &self.iterator << &self.ptr << &self.nr).done()
    }
}

impl Encodable for IndexEntry {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format) << &self.minor << &self.ino << &self.major << &Pad::<7>).done()
    }
}

impl Encodable for ReadXattrIndex {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.flags
            << &self.first
            << &self.last
            << &self.ptr
            << &self.nr)
            .done()
    }
}

impl Encodable for InodeAttrX {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        (Encoder::new(w, format)
            << &self.mask.bits()
            << &self.flags.bits()
            << &self.meta_seq
            << &self.data_seq
            << &self.data_version
            << &self.online_blocks
            << &self.offline_blocks
            << &self.ctime.sec
            << &self.ctime.nsec
            << &self.crtime.nsec
            << &self.crtime.sec
            << &self.size
            << &self.bits.bits()
            << &self.project_id)
            .done()
    }
}

impl Encodable for FileHandle {
    fn encode<W: WriteBytesExt>(&self, w: &mut W, format: WireFormat) -> Result<usize> {
        let handle_bytes = (2 * mem::size_of::<u64>()) as u32;
        (Encoder::new(w, format)
            << &handle_bytes
            << &FILEID_SCOUTFS
            << &self.ino
            << &self.parent_ino)
            .done()
    }
}

impl Decodable for u8 {
    fn decode<R: ReadBytesExt>(r: &mut R, _: WireFormat) -> Result<Self> {
        r.read_u8()
    }
}

impl Decodable for u16 {
    fn decode<R: ReadBytesExt>(r: &mut R, _: WireFormat) -> Result<Self> {
        r.read_u16::<LittleEndian>()
    }
}

impl Decodable for u32 {
    fn decode<R: ReadBytesExt>(r: &mut R, _: WireFormat) -> Result<Self> {
        r.read_u32::<LittleEndian>()
    }
}

impl Decodable for u64 {
    fn decode<R: ReadBytesExt>(r: &mut R, _: WireFormat) -> Result<Self> {
        r.read_u64::<LittleEndian>()
    }
}

impl Decodable for i32 {
    fn decode<R: ReadBytesExt>(r: &mut R, _: WireFormat) -> Result<Self> {
        r.read_i32::<LittleEndian>()
    }
}

impl Decodable for i64 {
    fn decode<R: ReadBytesExt>(r: &mut R, _: WireFormat) -> Result<Self> {
        r.read_i64::<LittleEndian>()
    }
}

impl<const N: usize> Decodable for Pad<N> {
    fn decode<R: ReadBytesExt>(r: &mut R, _: WireFormat) -> Result<Self> {
        r.read_exact(&mut [0u8; N]).and(Ok(Pad))
    }
}

impl<T: Decodable + Default + Copy, const N: usize> Decodable for [T; N] {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let mut arr = [T::default(); N];
        for slot in arr.iter_mut() {
            *slot = decode!(*r, format);
        }
        Ok(arr)
    }
}

impl Decodable for Time {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(Time {
            sec: decode!(*r, format),
            nsec: decode!(*r, format),
        })
    }
}

impl Decodable for InodeEntry {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        match format {
            WireFormat::V1 => Ok(InodeEntry {
                major: decode!(*r, format),
                minor: decode!(*r, format),
                ino: decode!(*r, format),
            }),
            WireFormat::V2 => {
                let (major, ino, minor, _): (u64, u64, u32, Pad<4>) = (
                    decode!(*r, format),
                    decode!(*r, format),
                    decode!(*r, format),
                    decode!(*r, format),
                );
                Ok(InodeEntry { major, minor, ino })
            }
        }
    }
}

impl Decodable for WalkInodes {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let walk = WalkInodes {
            first: decode!(*r, format),
            last: decode!(*r, format),
            entries_ptr: decode!(*r, format),
            nr_entries: decode!(*r, format),
            index: decode!(*r, format),
        };
        if format == WireFormat::V2 {
            let _: Pad<11> = decode!(*r, format);
        }
        Ok(walk)
    }
}

impl Decodable for InoPath {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let ip = InoPath {
            ino: decode!(*r, format),
            dir_ino: decode!(*r, format),
            dir_pos: decode!(*r, format),
            result_ptr: decode!(*r, format),
            result_bytes: decode!(*r, format),
        };
        let _: Pad<6> = decode!(*r, format);
        Ok(ip)
    }
}

impl Decodable for PathResult {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let (dir_ino, dir_pos, path_bytes, _): (u64, u64, u16, Pad<6>) = (
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
        );
        let raw = read_exact(r, path_bytes as usize)?;
        let start = raw.iter().position(|&b| b != 0).unwrap_or(raw.len());
        let end = raw.iter().rposition(|&b| b != 0).map_or(start, |i| i + 1);
        Ok(PathResult {
            dir_ino,
            dir_pos,
            path: raw[start..end].to_vec(),
        })
    }
}

impl Decodable for Release {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(Release {
            offset: decode!(*r, format),
            length: decode!(*r, format),
            version: decode!(*r, format),
        })
    }
}

impl Decodable for Stage {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let stage = Stage {
            data_version: decode!(*r, format),
            buf_ptr: decode!(*r, format),
            offset: decode!(*r, format),
            length: decode!(*r, format),
        };
        let _: Pad<4> = decode!(*r, format);
        Ok(stage)
    }
}

impl Decodable for StatMore {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let stat = StatMore {
            meta_seq: decode!(*r, format),
            data_seq: decode!(*r, format),
            data_version: decode!(*r, format),
            online_blocks: decode!(*r, format),
            offline_blocks: decode!(*r, format),
            crtime: decode!(*r, format),
        };
        let _: Pad<4> = decode!(*r, format);
        Ok(stat)
    }
}

impl Decodable for DataWaitingEntry {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let ent = DataWaitingEntry {
            ino: decode!(*r, format),
            iblock: decode!(*r, format),
            op: decode!(DataWaitOp, *r, format),
        };
        if format == WireFormat::V2 {
            let _: Pad<7> = decode!(*r, format);
        }
        Ok(ent)
    }
}

impl Decodable for DataWaiting {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        match format {
            WireFormat::V1 => Ok(DataWaiting {
                flags: 0,
                after_ino: decode!(*r, format),
                after_iblock: decode!(*r, format),
                ents_ptr: decode!(*r, format),
                ents_nr: decode!(*r, format),
            }),
            WireFormat::V2 => {
                let dw = DataWaiting {
                    flags: decode!(*r, format),
                    after_ino: decode!(*r, format),
                    after_iblock: decode!(*r, format),
                    ents_ptr: decode!(*r, format),
                    ents_nr: decode!(*r, format),
                };
                let _: Pad<6> = decode!(*r, format);
                Ok(dw)
            }
        }
    }
}

impl Decodable for DataWaitErr {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(DataWaitErr {
            ino: decode!(*r, format),
            version: decode!(*r, format),
            offset: decode!(*r, format),
            count: decode!(*r, format),
            op: decode!(*r, format),
            err: decode!(*r, format),
        })
    }
}

impl Decodable for SetattrMore {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let (data_version, i_size, flags): (u64, u64, SetattrFlags) = (
            decode!(*r, format),
            decode!(*r, format),
            decode!(SetattrFlags, *r, format),
        );
        let (ctime_sec, ctime_nsec, crtime_nsec, crtime_sec): (u64, u32, u32, u64) = (
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
        );
        Ok(SetattrMore {
            data_version,
            i_size,
            flags,
            ctime: Time {
                sec: ctime_sec,
                nsec: ctime_nsec,
            },
            crtime: Time {
                sec: crtime_sec,
                nsec: crtime_nsec,
            },
        })
    }
}

impl Decodable for ListXattrHidden {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(ListXattrHidden {
            id_pos: decode!(*r, format),
            buf_ptr: decode!(*r, format),
            buf_bytes: decode!(*r, format),
            hash_pos: decode!(*r, format),
        })
    }
}

impl Decodable for SearchXattrs {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let sx = SearchXattrs {
            next_ino: decode!(*r, format),
            last_ino: decode!(*r, format),
            name_ptr: decode!(*r, format),
            inodes_ptr: decode!(*r, format),
            output_flags: decode!(SearchFlags, *r, format),
            nr_inodes: decode!(*r, format),
            name_bytes: decode!(*r, format),
        };
        let _: Pad<6> = decode!(*r, format);
        Ok(sx)
    }
}

impl Decodable for StatfsMore {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(StatfsMore {
            fsid: decode!(*r, format),
            rid: decode!(*r, format),
            committed_seq: decode!(*r, format),
            total_meta_blocks: decode!(*r, format),
            total_data_blocks: decode!(*r, format),
            reserved_meta_blocks: decode!(*r, format),
        })
    }
}

impl Decodable for AllocDetail {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(AllocDetail {
            ptr: decode!(*r, format),
            nr: decode!(*r, format),
        })
    }
}

impl Decodable for AllocDetailEntry {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let ent = AllocDetailEntry {
            id: decode!(*r, format),
            blocks: decode!(*r, format),
            typ: decode!(*r, format),
            flags: decode!(AllocFlags, *r, format),
        };
        let _: Pad<6> = decode!(*r, format);
        Ok(ent)
    }
}

impl Decodable for MoveBlocks {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(MoveBlocks {
            from_fd: decode!(*r, format),
            from_off: decode!(*r, format),
            len: decode!(*r, format),
            to_off: decode!(*r, format),
            data_version: decode!(*r, format),
            flags: decode!(MoveFlags, *r, format),
        })
    }
}

impl Decodable for ReadXattrTotals {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(ReadXattrTotals {
            pos_name: decode!(*r, format),
            totals_ptr: decode!(*r, format),
            totals_bytes: decode!(*r, format),
        })
    }
}

impl Decodable for XattrTotal {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(XattrTotal {
            name: decode!(*r, format),
            total: decode!(*r, format),
            count: decode!(*r, format),
        })
    }
}

impl Decodable for GetReferringEntries {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(GetReferringEntries {
            ino: decode!(*r, format),
            dir_ino: decode!(*r, format),
            dir_pos: decode!(*r, format),
            entries_ptr: decode!(*r, format),
            entries_bytes: decode!(*r, format),
        })
    }
}

impl Decodable for BackReference {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let (dir_ino, dir_pos, ino): (u64, u64, u64) =
            (decode!(*r, format), decode!(*r, format), decode!(*r, format));
        let entry_bytes: u16 = decode!(*r, format);
        let flags = decode!(DirentFlags, *r, format);
        let (d_type, name_len): (u8, u8) = (decode!(*r, format), decode!(*r, format));
        let name = read_exact(r, name_len as usize)?;
        let Some(pad) = (entry_bytes as usize).checked_sub(DIRENT_HEADER + name.len()) else {
            return res!(io_err!(InvalidData, "dirent shorter than its name"));
        };
        read_exact(r, pad)?;
        Ok(BackReference {
            dir_ino,
            dir_pos,
            ino,
            flags,
            d_type,
            name,
        })
    }
}

impl Decodable for QuotaRule {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let rule = QuotaRule {
            name_val: decode!(*r, format),
            limit: decode!(*r, format),
            prio: decode!(*r, format),
            op: decode!(*r, format),
            rule_flags: decode!(QuotaRuleFlags, *r, format),
            name_source: decode!(*r, format),
            name_flags: decode!(*r, format),
        };
        let _: Pad<7> = decode!(*r, format);
        Ok(rule)
    }
}

impl Decodable for QuotaIterator {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(QuotaIterator(decode!(*r, format)))
    }
}

impl Decodable for GetQuotaRules {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(GetQuotaRules {
            iterator: decode!(*r, format),
            ptr: decode!(*r, format),
            nr: decode!(*r, format),
        })
    }
}

impl Decodable for IndexEntry {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let (minor, ino, major, _): (u64, u64, u8, Pad<7>) = (
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
        );
        Ok(IndexEntry { major, minor, ino })
    }
}

impl Decodable for ReadXattrIndex {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        Ok(ReadXattrIndex {
            flags: decode!(*r, format),
            first: decode!(*r, format),
            last: decode!(*r, format),
            ptr: decode!(*r, format),
            nr: decode!(*r, format),
        })
    }
}

impl Decodable for InodeAttrX {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let mask = decode!(AttrXMask, *r, format);
        let flags = decode!(AttrXFlags, *r, format);
        let (meta_seq, data_seq, data_version, online_blocks, offline_blocks): (
            u64,
            u64,
            u64,
            u64,
            u64,
        ) = (
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
        );
        let (ctime_sec, ctime_nsec, crtime_nsec, crtime_sec): (u64, u32, u32, u64) = (
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
            decode!(*r, format),
        );
        Ok(InodeAttrX {
            mask,
            flags,
            meta_seq,
            data_seq,
            data_version,
            online_blocks,
            offline_blocks,
            ctime: Time {
                sec: ctime_sec,
                nsec: ctime_nsec,
            },
            crtime: Time {
                sec: crtime_sec,
                nsec: crtime_nsec,
            },
            size: decode!(*r, format),
            bits: decode!(AttrXBits, *r, format),
            project_id: decode!(*r, format),
        })
    }
}

impl Decodable for FileHandle {
    fn decode<R: ReadBytesExt>(r: &mut R, format: WireFormat) -> Result<Self> {
        let (_handle_bytes, handle_type): (u32, i32) = (decode!(*r, format), decode!(*r, format));
        if handle_type != FILEID_SCOUTFS {
            return res!(io_err!(InvalidData, "not a scoutfs file handle"));
        }
        Ok(FileHandle {
            ino: decode!(*r, format),
            parent_ino: decode!(*r, format),
        })
    }
}

/// Encode a record into a fresh buffer.
pub fn to_bytes<T: Encodable>(rec: &T, format: WireFormat) -> utils::Result<Vec<u8>> {
    let mut buf = Vec::new();
    rec.encode(&mut buf, format)?;
    Ok(buf)
}

/// Decode one fixed record from the front of `buf`.
pub fn from_bytes<T: Record>(buf: &[u8], format: WireFormat) -> utils::Result<T> {
    let needed = T::size(format);
    if buf.len() < needed {
        return Err(Error::Framing {
            record: T::NAME,
            needed,
            got: buf.len(),
        });
    }
    Ok(T::decode(&mut Cursor::new(&buf[..needed]), format)?)
}

/// Decode `count` consecutive fixed records from the front of `buf`.
pub fn decode_array<T: Record>(buf: &[u8], count: usize, format: WireFormat) -> utils::Result<Vec<T>> {
    let needed = T::size(format).saturating_mul(count);
    if buf.len() < needed {
        return Err(Error::Framing {
            record: T::NAME,
            needed,
            got: buf.len(),
        });
    }
    let mut r = Cursor::new(&buf[..needed]);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(T::decode(&mut r, format)?);
    }
    Ok(out)
}

/// Decode up to `count` referring entries, stopping after one flagged last.
pub fn decode_dirents(buf: &[u8], count: usize, format: WireFormat) -> utils::Result<Vec<BackReference>> {
    let mut out = Vec::with_capacity(count);
    let mut off = 0;
    while out.len() < count {
        let rest = &buf[off..];
        if rest.len() < DIRENT_HEADER {
            return Err(Error::Framing {
                record: "dirent",
                needed: DIRENT_HEADER,
                got: rest.len(),
            });
        }
        let entry_bytes = u16::from_le_bytes([rest[24], rest[25]]) as usize;
        if entry_bytes < DIRENT_HEADER + rest[28] as usize || rest.len() < entry_bytes {
            return Err(Error::Framing {
                record: "dirent",
                needed: entry_bytes.max(DIRENT_HEADER + rest[28] as usize),
                got: rest.len(),
            });
        }
        let ent = BackReference::decode(&mut Cursor::new(&rest[..entry_bytes]), format)?;
        off += entry_bytes;
        let last = ent.is_last();
        out.push(ent);
        if last {
            break;
        }
    }
    Ok(out)
}

#[test]
fn encoder_test1() {
    let expected: Vec<u8> = (0..10).collect();
    let mut encoder = Vec::new();
    for i in 0..10 {
        (i as u8).encode(&mut encoder, WireFormat::V2).unwrap();
    }
    assert_eq!(expected, encoder);
}

#[test]
fn decoder_test1() {
    let expected: Vec<u8> = (0..10).collect();
    let mut decoder = Cursor::new(expected.clone());
    let mut actual: Vec<u8> = Vec::new();
    while let Ok(i) = Decodable::decode(&mut decoder, WireFormat::V2) {
        actual.push(i);
    }
    assert_eq!(expected, actual);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_len<T: Record + Default>(format: WireFormat) -> usize {
        to_bytes(&T::default(), format).unwrap().len()
    }

    #[test]
    fn every_record_encodes_to_its_declared_size() {
        for f in [WireFormat::V1, WireFormat::V2] {
            assert_eq!(encoded_len::<InodeEntry>(f), InodeEntry::size(f));
            assert_eq!(encoded_len::<WalkInodes>(f), WalkInodes::size(f));
            assert_eq!(encoded_len::<InoPath>(f), InoPath::size(f));
            assert_eq!(encoded_len::<Release>(f), Release::size(f));
            assert_eq!(encoded_len::<Stage>(f), Stage::size(f));
            assert_eq!(encoded_len::<StatMore>(f), StatMore::size(f));
            assert_eq!(encoded_len::<DataWaitingEntry>(f), DataWaitingEntry::size(f));
            assert_eq!(encoded_len::<DataWaiting>(f), DataWaiting::size(f));
            assert_eq!(encoded_len::<DataWaitErr>(f), DataWaitErr::size(f));
            assert_eq!(encoded_len::<SetattrMore>(f), SetattrMore::size(f));
            assert_eq!(encoded_len::<ListXattrHidden>(f), ListXattrHidden::size(f));
            assert_eq!(encoded_len::<SearchXattrs>(f), SearchXattrs::size(f));
            assert_eq!(encoded_len::<StatfsMore>(f), StatfsMore::size(f));
            assert_eq!(encoded_len::<AllocDetail>(f), AllocDetail::size(f));
            assert_eq!(encoded_len::<AllocDetailEntry>(f), AllocDetailEntry::size(f));
            assert_eq!(encoded_len::<MoveBlocks>(f), MoveBlocks::size(f));
            assert_eq!(encoded_len::<ReadXattrTotals>(f), ReadXattrTotals::size(f));
            assert_eq!(encoded_len::<XattrTotal>(f), XattrTotal::size(f));
            assert_eq!(encoded_len::<GetReferringEntries>(f), GetReferringEntries::size(f));
            assert_eq!(encoded_len::<QuotaRule>(f), QuotaRule::size(f));
            assert_eq!(encoded_len::<GetQuotaRules>(f), GetQuotaRules::size(f));
            assert_eq!(encoded_len::<IndexEntry>(f), IndexEntry::size(f));
            assert_eq!(encoded_len::<ReadXattrIndex>(f), ReadXattrIndex::size(f));
            assert_eq!(encoded_len::<InodeAttrX>(f), InodeAttrX::size(f));
            assert_eq!(encoded_len::<FileHandle>(f), FileHandle::size(f));
        }
    }

    #[test]
    fn inode_entry_layouts() {
        let e = InodeEntry {
            major: 0x0102030405060708,
            minor: 0x11223344,
            ino: 0xa1a2a3a4a5a6a7a8,
        };

        let v2 = to_bytes(&e, WireFormat::V2).unwrap();
        assert_eq!(&v2[0..8], &0x0102030405060708u64.to_le_bytes());
        assert_eq!(&v2[8..16], &0xa1a2a3a4a5a6a7a8u64.to_le_bytes());
        assert_eq!(&v2[16..20], &0x11223344u32.to_le_bytes());
        assert_eq!(&v2[20..24], &[0, 0, 0, 0]);

        let v1 = to_bytes(&e, WireFormat::V1).unwrap();
        assert_eq!(&v1[8..12], &0x11223344u32.to_le_bytes());
        assert_eq!(&v1[12..20], &0xa1a2a3a4a5a6a7a8u64.to_le_bytes());

        assert_eq!(from_bytes::<InodeEntry>(&v2, WireFormat::V2).unwrap(), e);
        assert_eq!(from_bytes::<InodeEntry>(&v1, WireFormat::V1).unwrap(), e);
    }

    #[test]
    fn entries_survive_encode_then_decode() {
        let f = WireFormat::V2;
        let total = XattrTotal {
            name: [1, 2, 3],
            total: 400,
            count: 5,
        };
        assert_eq!(from_bytes::<XattrTotal>(&to_bytes(&total, f).unwrap(), f).unwrap(), total);

        let wait = DataWaitingEntry {
            ino: 77,
            iblock: 9,
            op: DataWaitOp::READ | DataWaitOp::CHANGE_SIZE,
        };
        for f in [WireFormat::V1, WireFormat::V2] {
            let bytes = to_bytes(&wait, f).unwrap();
            assert_eq!(from_bytes::<DataWaitingEntry>(&bytes, f).unwrap(), wait);
        }

        let rule = QuotaRule {
            name_val: [7, 8, 1000],
            limit: 1 << 30,
            prio: 4,
            op: QuotaOp::Data as u8,
            rule_flags: QuotaRuleFlags::TOTL_COUNT,
            name_source: [0, 0, NameSource::Uid as u8],
            name_flags: [0, 0, NAME_FLAG_SELECT],
        };
        let bytes = to_bytes(&rule, f).unwrap();
        assert_eq!(&bytes[41..48], &[0u8; 7]);
        assert_eq!(from_bytes::<QuotaRule>(&bytes, f).unwrap(), rule);

        let attr = InodeAttrX {
            mask: AttrXMask::CTIME | AttrXMask::PROJECT_ID,
            ctime: Time { sec: 10, nsec: 20 },
            crtime: Time { sec: 30, nsec: 40 },
            project_id: 12,
            ..Default::default()
        };
        assert_eq!(from_bytes::<InodeAttrX>(&to_bytes(&attr, f).unwrap(), f).unwrap(), attr);

        let path = PathResult {
            dir_ino: 3,
            dir_pos: 4,
            path: b"a/b/c".to_vec(),
        };
        let bytes = to_bytes(&path, f).unwrap();
        assert_eq!(bytes.len(), PATH_RESULT_HEADER + 6);
        let got = PathResult::decode(&mut Cursor::new(bytes), f).unwrap();
        assert_eq!(got, path);
    }

    #[test]
    fn padding_is_zeroed() {
        let f = WireFormat::V2;
        let walk = WalkInodes {
            first: InodeEntry::new(1, 2),
            last: InodeEntry::new(!0, !0),
            entries_ptr: !0,
            nr_entries: !0,
            index: 1,
        };
        let bytes = to_bytes(&walk, f).unwrap();
        assert_eq!(&bytes[20..24], &[0; 4]);
        assert_eq!(&bytes[44..48], &[0; 4]);
        assert_eq!(&bytes[61..72], &[0; 11]);
    }

    #[test]
    fn short_buffer_is_a_framing_error() {
        let f = WireFormat::V2;
        let bytes = to_bytes(&XattrTotal::default(), f).unwrap();
        match from_bytes::<XattrTotal>(&bytes[..39], f) {
            Err(Error::Framing { needed, got, .. }) => assert_eq!((needed, got), (40, 39)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(decode_array::<XattrTotal>(&bytes, 2, f).unwrap_err().is_framing());
    }

    #[test]
    fn dirent_padding_is_consumed() {
        let f = WireFormat::V2;
        let a = BackReference {
            dir_ino: 1,
            dir_pos: 10,
            ino: 99,
            d_type: 8,
            name: b"first".to_vec(),
            ..Default::default()
        };
        let b = BackReference {
            dir_ino: 2,
            dir_pos: 20,
            ino: 99,
            flags: DirentFlags::LAST,
            d_type: 8,
            name: b"second-name".to_vec(),
        };
        let mut buf = to_bytes(&a, f).unwrap();
        assert_eq!(buf.len(), 40);
        buf.extend(to_bytes(&b, f).unwrap());
        buf.extend([0xff; 16]);

        let got = decode_dirents(&buf, 5, f).unwrap();
        assert_eq!(got, vec![a, b]);
    }

    #[test]
    fn dirent_shorter_than_name_is_rejected() {
        let f = WireFormat::V2;
        let mut buf = to_bytes(
            &BackReference {
                name: b"abc".to_vec(),
                ..Default::default()
            },
            f,
        )
        .unwrap();
        buf[24] = 30;
        assert!(decode_dirents(&buf, 1, f).unwrap_err().is_framing());
    }

    #[test]
    fn file_handle_layout() {
        let fh = FileHandle {
            ino: 5,
            parent_ino: 0,
        };
        let bytes = to_bytes(&fh, WireFormat::V2).unwrap();
        assert_eq!(&bytes[0..4], &16u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &0x81i32.to_le_bytes());
        assert_eq!(&bytes[8..16], &5u64.to_le_bytes());
        assert_eq!(to_bytes(&fh, WireFormat::V1).unwrap(), bytes);
    }
}
