//! Opening inodes by number, without a path lookup.

use crate::gate::{CallGate, Ioctl};
use crate::record::{BackReference, FileHandle, PathResult};
use crate::serialize;
use crate::utils::Result;
use log::trace;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Something that can open an inode of the filesystem by number.
pub trait OpenByHandle {
    fn open_ino(&self, ino: u64, flags: OFlag) -> Result<OwnedFd>;
}

impl<T: OpenByHandle + ?Sized> OpenByHandle for &T {
    fn open_ino(&self, ino: u64, flags: OFlag) -> Result<OwnedFd> {
        (**self).open_ino(ino, flags)
    }
}

/// `open_by_handle_at(2)` relative to the gate's descriptor.
///
/// Needs `CAP_DAC_READ_SEARCH`.
impl OpenByHandle for Ioctl<'_> {
    fn open_ino(&self, ino: u64, flags: OFlag) -> Result<OwnedFd> {
        let handle = serialize::to_bytes(&FileHandle { ino, parent_ino: 0 }, self.format())?;
        trace!("open_by_handle_at ino {} flags {:?}", ino, flags);

        #[allow(unsafe_code)]
        let ret = unsafe {
            nix::libc::syscall(
                nix::libc::SYS_open_by_handle_at,
                self.fd().as_raw_fd(),
                handle.as_ptr(),
                flags.bits(),
            )
        };
        let fd = Errno::result(ret)?;

        // The kernel just handed us this descriptor and nothing else owns it.
        #[allow(unsafe_code)]
        let owned = unsafe { OwnedFd::from_raw_fd(fd as RawFd) };
        Ok(owned)
    }
}

/// Open inode `ino` as a `File`.
pub fn open_by_id<O: OpenByHandle>(opener: &O, ino: u64, flags: OFlag) -> Result<File> {
    Ok(File::from(opener.open_ino(ino, flags)?))
}

fn dir_flags() -> OFlag {
    OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC
}

impl BackReference {
    /// Open the directory holding this entry.
    pub fn open_dir<O: OpenByHandle>(&self, opener: &O) -> Result<File> {
        open_by_id(opener, self.dir_ino, dir_flags())
    }
}

impl PathResult {
    /// Open the directory holding the final path component.
    pub fn open_dir<O: OpenByHandle>(&self, opener: &O) -> Result<File> {
        open_by_id(opener, self.dir_ino, dir_flags())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder(RefCell<Vec<(u64, OFlag)>>);

    impl OpenByHandle for Recorder {
        fn open_ino(&self, ino: u64, flags: OFlag) -> Result<OwnedFd> {
            self.0.borrow_mut().push((ino, flags));
            Ok(File::open("/")?.into())
        }
    }

    #[test]
    fn entries_open_their_parent() {
        let rec = Recorder(RefCell::new(Vec::new()));
        let br = BackReference {
            dir_ino: 12,
            ino: 40,
            ..Default::default()
        };
        br.open_dir(&rec).unwrap();
        let pr = PathResult {
            dir_ino: 13,
            ..Default::default()
        };
        pr.open_dir(&rec).unwrap();

        let seen = rec.0.borrow();
        assert_eq!(seen[0].0, 12);
        assert_eq!(seen[1].0, 13);
        assert!(seen[0].1.contains(OFlag::O_DIRECTORY));
    }
}
