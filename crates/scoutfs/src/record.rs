//! scoutfs ioctl record types and constants.
//!
//! Each request and response that crosses the ioctl boundary has a fixed
//! little-endian layout. The types here hold the decoded fields; the byte
//! layout itself lives in [`crate::serialize`].

use bitflags::bitflags;
use enum_primitive::*;

/// ioctl type byte shared by every scoutfs request
pub const IOC_MAGIC: u8 = 0xe8;

/// Longest xattr name the search ioctl accepts
pub const XATTR_NAME_MAX: usize = 255;

/// Room the kernel may use for a single resolved path
pub const PATH_MAX: usize = 4096;

/// Block size used for release and move alignment
pub const BLOCK_SIZE: u64 = 4096;

/// Handle type understood by `open_by_handle_at(2)` on scoutfs
pub const FILEID_SCOUTFS: i32 = 0x81;

enum_from_primitive! {
    #[doc = "ioctl numbers, the `nr` part of each request code"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum Opcode {
        WalkInodes          = 1,
        InoPath,
        Release,
        Stage,
        StatMore,
        DataWaiting,
        SetattrMore,
        ListXattrHidden,
        SearchXattrs,
        StatfsMore,
        DataWaitErr,
        AllocDetail,
        MoveBlocks,
        ReadXattrTotals     = 15,
        GetReferringEntries = 17,
        GetAttrX,
        SetAttrX,
        GetQuotaRules,
        AddQuotaRule,
        DelQuotaRule,
        ReadXattrIndex,
    }
}

/// Data direction encoded into a request code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Userspace hands the record to the kernel.
    Write,
    /// The kernel fills the record.
    Read,
    /// Both.
    ReadWrite,
}

impl Opcode {
    pub fn direction(&self) -> Direction {
        match *self {
            Opcode::StatMore
            | Opcode::StatfsMore
            | Opcode::GetQuotaRules
            | Opcode::ReadXattrIndex => Direction::Read,
            Opcode::ListXattrHidden => Direction::ReadWrite,
            _ => Direction::Write,
        }
    }
}

enum_from_primitive! {
    #[doc = "Sequence index walked by the inode walk ioctl"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum SeqIndex {
        Meta = 0,
        Data,
    }
}

impl Default for SeqIndex {
    fn default() -> Self {
        SeqIndex::Meta
    }
}

/// Position in an inode sequence index.
///
/// Fields are declared most significant first, so the derived ordering is
/// the index order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InodeEntry {
    pub major: u64,
    pub minor: u32,
    pub ino: u64,
}

impl InodeEntry {
    pub fn new(major: u64, ino: u64) -> InodeEntry {
        InodeEntry {
            major,
            minor: 0,
            ino,
        }
    }
}

/// Request for `Opcode::WalkInodes`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WalkInodes {
    pub first: InodeEntry,
    pub last: InodeEntry,
    pub entries_ptr: u64,
    pub nr_entries: u32,
    pub index: u8,
}

/// Request for `Opcode::InoPath`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InoPath {
    pub ino: u64,
    pub dir_ino: u64,
    pub dir_pos: u64,
    pub result_ptr: u64,
    pub result_bytes: u16,
}

/// One path to an inode, as written into the ino path result buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathResult {
    /// Directory holding the final path component
    pub dir_ino: u64,
    /// Position of the entry within that directory
    pub dir_pos: u64,
    /// Path relative to the mount root, trailing NULs removed
    pub path: Vec<u8>,
}

/// Request for `Opcode::Release`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Release {
    pub offset: u64,
    pub length: u64,
    pub version: u64,
}

/// Request for `Opcode::Stage`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stage {
    pub data_version: u64,
    pub buf_ptr: u64,
    pub offset: u64,
    pub length: i32,
}

/// Seconds and nanoseconds
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    pub sec: u64,
    pub nsec: u32,
}

impl From<std::time::SystemTime> for Time {
    fn from(t: std::time::SystemTime) -> Time {
        let d = t
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Time {
            sec: d.as_secs(),
            nsec: d.subsec_nanos(),
        }
    }
}

/// scoutfs specific inode metadata, filled by `Opcode::StatMore`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatMore {
    pub meta_seq: u64,
    pub data_seq: u64,
    pub data_version: u64,
    pub online_blocks: u64,
    pub offline_blocks: u64,
    pub crtime: Time,
}

bitflags! {
    /// Operations a task can be waiting on offline data for
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct DataWaitOp: u8 {
        const READ        = 0x1;
        const WRITE       = 0x2;
        const CHANGE_SIZE = 0x4;
    }
}

/// Position in the data waiting queue.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    pub ino: u64,
    pub iblock: u64,
}

/// A task blocked on an offline block
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DataWaitingEntry {
    pub ino: u64,
    pub iblock: u64,
    pub op: DataWaitOp,
}

impl DataWaitingEntry {
    pub fn key(&self) -> BlockKey {
        BlockKey {
            ino: self.ino,
            iblock: self.iblock,
        }
    }
}

/// Request for `Opcode::DataWaiting`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DataWaiting {
    pub flags: u64,
    pub after_ino: u64,
    pub after_iblock: u64,
    pub ents_ptr: u64,
    pub ents_nr: u16,
}

/// Request for `Opcode::DataWaitErr`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DataWaitErr {
    pub ino: u64,
    pub version: u64,
    pub offset: u64,
    pub count: u64,
    pub op: u64,
    pub err: i64,
}

bitflags! {
    /// Flags for `SetattrMore`
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SetattrFlags: u64 {
        #[doc = "Size is set but the file is left with no online extents"]
        const OFFLINE = 0x1;
    }
}

/// Request for `Opcode::SetattrMore`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SetattrMore {
    pub data_version: u64,
    pub i_size: u64,
    pub flags: SetattrFlags,
    pub ctime: Time,
    pub crtime: Time,
}

/// Request for `Opcode::ListXattrHidden`; the kernel writes the positions back
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ListXattrHidden {
    pub id_pos: u64,
    pub buf_ptr: u64,
    pub buf_bytes: u32,
    pub hash_pos: u32,
}

/// Resume point of a hidden xattr listing
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct XattrPos {
    pub id_pos: u64,
    pub hash_pos: u32,
}

bitflags! {
    /// Output flags of `SearchXattrs`
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SearchFlags: u64 {
        #[doc = "No inodes past the returned ones hold the xattr"]
        const END = 0x1;
    }
}

/// Request for `Opcode::SearchXattrs`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchXattrs {
    pub next_ino: u64,
    pub last_ino: u64,
    pub name_ptr: u64,
    pub inodes_ptr: u64,
    pub output_flags: SearchFlags,
    pub nr_inodes: u64,
    pub name_bytes: u16,
}

/// Volume wide identity and totals, filled by `Opcode::StatfsMore`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatfsMore {
    pub fsid: u64,
    pub rid: u64,
    pub committed_seq: u64,
    pub total_meta_blocks: u64,
    pub total_data_blocks: u64,
    pub reserved_meta_blocks: u64,
}

/// Request for `Opcode::AllocDetail`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocDetail {
    pub ptr: u64,
    pub nr: u64,
}

bitflags! {
    /// Flags of an allocator description
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct AllocFlags: u8 {
        #[doc = "Allocator holds metadata blocks"]
        const META = 0x1;
    }
}

/// One free space allocator
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocDetailEntry {
    pub id: u64,
    pub blocks: u64,
    pub typ: u8,
    pub flags: AllocFlags,
}

bitflags! {
    /// Flags for `MoveBlocks`
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct MoveFlags: u64 {
        #[doc = "Fill offline extents in the destination instead of appending"]
        const STAGE = 0x1;
    }
}

/// Request for `Opcode::MoveBlocks`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MoveBlocks {
    pub from_fd: u64,
    pub from_off: u64,
    pub len: u64,
    pub to_off: u64,
    pub data_version: u64,
    pub flags: MoveFlags,
}

/// Request for `Opcode::ReadXattrTotals`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadXattrTotals {
    pub pos_name: [u64; 3],
    pub totals_ptr: u64,
    pub totals_bytes: u64,
}

/// Sum and count of the `.totl.` xattrs sharing one id triple
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct XattrTotal {
    pub name: [u64; 3],
    pub total: u64,
    pub count: u64,
}

/// Request for `Opcode::GetReferringEntries`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GetReferringEntries {
    pub ino: u64,
    pub dir_ino: u64,
    pub dir_pos: u64,
    pub entries_ptr: u64,
    pub entries_bytes: u64,
}

/// Position of an entry in its parent directory.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirPos {
    pub dir_ino: u64,
    pub dir_pos: u64,
}

bitflags! {
    /// Flags of a referring directory entry
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct DirentFlags: u8 {
        #[doc = "No more entries refer to the inode"]
        const LAST = 0x1;
    }
}

/// A directory entry that refers to an inode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackReference {
    /// Parent directory inode
    pub dir_ino: u64,
    /// Entry position within the parent
    pub dir_pos: u64,
    /// Inode the entry refers to
    pub ino: u64,
    pub flags: DirentFlags,
    /// Entry type, matching the `DT_*` values of readdir(3)
    pub d_type: u8,
    /// Entry name as stored in the parent
    pub name: Vec<u8>,
}

impl BackReference {
    pub fn pos(&self) -> DirPos {
        DirPos {
            dir_ino: self.dir_ino,
            dir_pos: self.dir_pos,
        }
    }

    pub fn is_last(&self) -> bool {
        self.flags.contains(DirentFlags::LAST)
    }
}

enum_from_primitive! {
    #[doc = "What a quota rule counts"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum QuotaOp {
        Inode = 0,
        Data,
    }
}

enum_from_primitive! {
    #[doc = "Where one word of a quota rule name comes from"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum NameSource {
        Literal = 0,
        Project,
        Uid,
        Gid,
    }
}

/// Name flag: the rule applies to one selected id rather than all of them
pub const NAME_FLAG_SELECT: u8 = 0x1;

bitflags! {
    /// Flags of a quota rule
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct QuotaRuleFlags: u8 {
        #[doc = "Limit the xattr count rather than the total"]
        const TOTL_COUNT = 0x1;
    }
}

/// One quota rule, as stored by the filesystem.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct QuotaRule {
    pub name_val: [u64; 3],
    pub limit: u64,
    pub prio: u8,
    /// Raw `QuotaOp` value
    pub op: u8,
    pub rule_flags: QuotaRuleFlags,
    /// Raw `NameSource` values
    pub name_source: [u8; 3],
    pub name_flags: [u8; 3],
}

/// Opaque iteration state handed back by the kernel for quota listings.
///
/// Never interpret or order it; it is only copied into the next request.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct QuotaIterator(pub [u64; 2]);

/// Request for `Opcode::GetQuotaRules`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GetQuotaRules {
    pub iterator: QuotaIterator,
    pub ptr: u64,
    pub nr: u64,
}

/// Position in the xattr index.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexEntry {
    pub major: u8,
    pub minor: u64,
    pub ino: u64,
}

/// Request for `Opcode::ReadXattrIndex`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadXattrIndex {
    pub flags: u64,
    pub first: IndexEntry,
    pub last: IndexEntry,
    pub ptr: u64,
    pub nr: u64,
}

bitflags! {
    /// Fields of `InodeAttrX` to get or set
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct AttrXMask: u64 {
        const META_SEQ        = 0x001;
        const DATA_SEQ        = 0x002;
        const DATA_VERSION    = 0x004;
        const ONLINE_BLOCKS   = 0x008;
        const OFFLINE_BLOCKS  = 0x010;
        const CTIME           = 0x020;
        const CRTIME          = 0x040;
        const SIZE            = 0x080;
        const RETENTION       = 0x100;
        const PROJECT_ID      = 0x200;
    }
}

bitflags! {
    /// Flag bits of `InodeAttrX`
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct AttrXFlags: u64 {
        #[doc = "Size is set without online extents"]
        const SIZE_OFFLINE = 0x1;
    }
}

bitflags! {
    /// Inode attribute bits carried in `InodeAttrX::bits`
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct AttrXBits: u64 {
        #[doc = "Inode is under retention and cannot be modified"]
        const RETENTION = 0x1;
    }
}

/// Extended inode attributes for `Opcode::GetAttrX` and `Opcode::SetAttrX`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InodeAttrX {
    pub mask: AttrXMask,
    pub flags: AttrXFlags,
    pub meta_seq: u64,
    pub data_seq: u64,
    pub data_version: u64,
    pub online_blocks: u64,
    pub offline_blocks: u64,
    pub ctime: Time,
    pub crtime: Time,
    pub size: u64,
    pub bits: AttrXBits,
    pub project_id: u64,
}

/// `struct file_handle` for `open_by_handle_at(2)` with a scoutfs fid
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FileHandle {
    pub ino: u64,
    pub parent_ino: u64,
}
