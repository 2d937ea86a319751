//! Wire format generations.
//!
//! The kernel's ioctl records changed layout once: the first generation
//! declared the inode walk and data waiting records packed, the current one
//! pads every record to eight byte alignment. The two are not compatible and
//! nothing on the wire says which one a kernel speaks, so the generation is
//! picked when the crate is built (`wire-v1` feature) and can only be
//! overridden per handle with [`crate::gate::Ioctl::with_format`].

use crate::record::*;
use crate::serialize::Record;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WireFormat {
    /// First generation, packed walk and data waiting records
    V1,
    /// Current generation, explicit padding everywhere
    V2,
}

impl WireFormat {
    /// Format compiled into this build.
    #[cfg(feature = "wire-v1")]
    pub const BUILD: WireFormat = WireFormat::V1;
    /// Format compiled into this build.
    #[cfg(not(feature = "wire-v1"))]
    pub const BUILD: WireFormat = WireFormat::V2;

    /// Records are laid out without alignment padding.
    pub fn is_packed(self) -> bool {
        self == WireFormat::V1
    }

    /// Size of the request record passed for `op`.
    pub fn request_size(self, op: Opcode) -> usize {
        match op {
            Opcode::WalkInodes => WalkInodes::size(self),
            Opcode::InoPath => InoPath::size(self),
            Opcode::Release => Release::size(self),
            Opcode::Stage => Stage::size(self),
            Opcode::StatMore => StatMore::size(self),
            Opcode::DataWaiting => DataWaiting::size(self),
            Opcode::SetattrMore => SetattrMore::size(self),
            Opcode::ListXattrHidden => ListXattrHidden::size(self),
            Opcode::SearchXattrs => SearchXattrs::size(self),
            Opcode::StatfsMore => StatfsMore::size(self),
            Opcode::DataWaitErr => DataWaitErr::size(self),
            Opcode::AllocDetail => AllocDetail::size(self),
            Opcode::MoveBlocks => MoveBlocks::size(self),
            Opcode::ReadXattrTotals => ReadXattrTotals::size(self),
            Opcode::GetReferringEntries => GetReferringEntries::size(self),
            Opcode::GetAttrX | Opcode::SetAttrX => InodeAttrX::size(self),
            Opcode::GetQuotaRules => GetQuotaRules::size(self),
            Opcode::AddQuotaRule | Opcode::DelQuotaRule => QuotaRule::size(self),
            Opcode::ReadXattrIndex => ReadXattrIndex::size(self),
        }
    }

    /// Full `ioctl(2)` request number for `op` in this format.
    pub fn request_code(self, op: Opcode) -> u64 {
        let (ty, nr, size) = (IOC_MAGIC, op as u8, self.request_size(op));
        let code = match op.direction() {
            Direction::Write => nix::request_code_write!(ty, nr, size),
            Direction::Read => nix::request_code_read!(ty, nr, size),
            Direction::ReadWrite => nix::request_code_readwrite!(ty, nr, size),
        };
        code as u64
    }
}

impl Default for WireFormat {
    fn default() -> Self {
        WireFormat::BUILD
    }
}
