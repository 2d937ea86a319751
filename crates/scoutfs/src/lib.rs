#![deny(unsafe_code)]
//! Client library for the scoutfs clustered filesystem.
//!
//! scoutfs exposes its internal indexes (inode sequence order, xattr search
//! and totals, quota rules, pending data waiters, directory back references)
//! only through ioctls on an open file or directory of a mounted volume. Each
//! ioctl takes one fixed layout record and returns at most one bounded batch,
//! so every listing is a loop of calls that resumes from the last position.
//!
//! # Overview
//!
//! - [`serialize`] encodes and decodes the records, bit exact to the kernel's
//!   layout in the selected [`format::WireFormat`].
//! - [`gate`] issues the ioctl. [`gate::CallGate`] is the seam: [`gate::Ioctl`]
//!   talks to the kernel, tests substitute their own.
//! - [`key`] orders and increments composite resume keys.
//! - [`cursor`] drives any [`cursor::Query`] batch by batch.
//! - The listing modules instantiate it: [`walk`], [`search`], [`totals`],
//!   [`waiters`], [`quota`], [`parents`], [`paths`], [`index`], [`xattr`].
//! - [`ops`] and [`quorum`] hold the one shot requests.
//!
//! # Example
//!
//! ```no_run
//! use scoutfs::{gate::Ioctl, walk, InodeEntry, Result};
//! use scoutfs::key::CompositeKey;
//! use std::fs::File;
//! use std::os::fd::AsFd;
//!
//! fn main() -> Result<()> {
//!     let mnt = File::open("/mnt/scoutfs")?;
//!     let gate = Ioctl::new(mnt.as_fd());
//!     let mut walker = walk::by_meta_seq(gate, InodeEntry::MIN, InodeEntry::MAX);
//!     loop {
//!         let batch = walker.next_batch()?;
//!         if batch.is_empty() {
//!             break;
//!         }
//!         for e in batch {
//!             println!("seq {} ino {}", e.major, e.ino);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Wire formats
//!
//! The kernel record layout changed once. The default build speaks the
//! current padded layout; the `wire-v1` feature selects the packed first
//! generation. Nothing is negotiated at run time.
//!
//! # Errors
//!
//! Every operation returns [`Result`]. The errnos callers usually branch on
//! (`EAGAIN`, `EINVAL`, `ENOENT`, `EOVERFLOW`) have their own [`Error`]
//! variants; the rest pass through as [`Error::No`].
//!
//! # Safety
//!
//! Unsafe code is limited to the `ioctl(2)` and `open_by_handle_at(2)` calls.
#[macro_use]
pub mod utils;
pub mod cursor;
pub mod error;
pub mod format;
pub mod gate;
pub mod handle;
pub mod index;
pub mod key;
pub mod ops;
pub mod parents;
pub mod paths;
pub mod quorum;
pub mod quota;
pub mod record;
pub mod search;
pub mod serialize;
pub mod totals;
pub mod waiters;
pub mod walk;
pub mod xattr;

pub use crate::error::Error;
pub use crate::error::errno;
pub use crate::error::string as errstr;
pub use crate::format::WireFormat;
pub use crate::record::*;
pub use crate::utils::Result;
