//! The single call through which every request reaches the filesystem.

use crate::error::Error;
use crate::format::WireFormat;
use crate::record::Opcode;
use crate::serialize::{self, Encodable};
use crate::utils::Result;
use log::{trace, warn};
use nix::errno::Errno;
use std::os::fd::{AsRawFd, BorrowedFd};

/// Largest number of times `call_growing` doubles its buffer
pub const MAX_DOUBLINGS: u32 = 16;

/// One request in flight.
///
/// The encoded record is mutable because the kernel writes results back into
/// several of them. The input and output buffers are borrowed for as long as
/// the exchange lives, which keeps the addresses embedded in the record valid
/// for the duration of the call.
#[derive(Debug)]
pub struct Exchange<'a> {
    record: Vec<u8>,
    input: &'a [u8],
    output: &'a mut [u8],
    input_ptr: u64,
    output_ptr: u64,
}

impl<'a> Exchange<'a> {
    pub fn new(input: &'a [u8], output: &'a mut [u8]) -> Exchange<'a> {
        let input_ptr = if input.is_empty() {
            0
        } else {
            input.as_ptr() as u64
        };
        let output_ptr = if output.is_empty() {
            0
        } else {
            output.as_mut_ptr() as u64
        };
        Exchange {
            record: Vec::new(),
            input,
            output,
            input_ptr,
            output_ptr,
        }
    }

    /// Exchange with no buffers besides the record itself.
    pub fn bare() -> Exchange<'static> {
        Exchange::new(&[], &mut [])
    }

    /// Encode `rec` as the request record.
    pub fn set_record<T: Encodable>(&mut self, rec: &T, format: WireFormat) -> Result<()> {
        self.record = serialize::to_bytes(rec, format)?;
        Ok(())
    }

    /// Use already encoded bytes as the request record.
    pub fn set_raw_record(&mut self, record: Vec<u8>) {
        self.record = record;
    }

    pub fn record(&self) -> &[u8] {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut [u8] {
        &mut self.record
    }

    pub fn input(&self) -> &[u8] {
        self.input
    }

    pub fn output(&self) -> &[u8] {
        &*self.output
    }

    pub fn output_mut(&mut self) -> &mut [u8] {
        &mut *self.output
    }

    /// Address to embed for the input buffer, zero if there is none
    pub fn input_ptr(&self) -> u64 {
        self.input_ptr
    }

    /// Address to embed for the output buffer, zero if there is none
    pub fn output_ptr(&self) -> u64 {
        self.output_ptr
    }

    pub fn into_record(self) -> Vec<u8> {
        self.record
    }
}

/// Something that can carry a request to the filesystem and return its
/// count.
pub trait CallGate {
    /// Wire format the gate's records are encoded in.
    fn format(&self) -> WireFormat;

    /// Issue `op` with the request in `xchg`, returning the non-negative
    /// count. Errors are classified from the returned errno.
    fn call(&self, op: Opcode, xchg: &mut Exchange<'_>) -> Result<usize>;
}

impl<G: CallGate + ?Sized> CallGate for &G {
    fn format(&self) -> WireFormat {
        (**self).format()
    }

    fn call(&self, op: Opcode, xchg: &mut Exchange<'_>) -> Result<usize> {
        (**self).call(op, xchg)
    }
}

/// `ioctl(2)` on an open scoutfs file or directory.
///
/// The descriptor is borrowed; it is never closed here.
#[derive(Copy, Clone, Debug)]
pub struct Ioctl<'fd> {
    fd: BorrowedFd<'fd>,
    format: WireFormat,
}

impl<'fd> Ioctl<'fd> {
    pub fn new(fd: BorrowedFd<'fd>) -> Ioctl<'fd> {
        Ioctl {
            fd,
            format: WireFormat::BUILD,
        }
    }

    /// Speak `format` instead of the compiled-in format.
    pub fn with_format(fd: BorrowedFd<'fd>, format: WireFormat) -> Ioctl<'fd> {
        Ioctl { fd, format }
    }

    pub fn fd(&self) -> BorrowedFd<'fd> {
        self.fd
    }
}

impl CallGate for Ioctl<'_> {
    fn format(&self) -> WireFormat {
        self.format
    }

    fn call(&self, op: Opcode, xchg: &mut Exchange<'_>) -> Result<usize> {
        let size = self.format.request_size(op);
        if xchg.record.len() != size {
            return Err(Error::Framing {
                record: "ioctl request",
                needed: size,
                got: xchg.record.len(),
            });
        }

        let code = self.format.request_code(op);
        trace!("ioctl {:?} code={:#x} fd={}", op, code, self.fd.as_raw_fd());

        #[allow(unsafe_code)]
        let ret = unsafe {
            nix::libc::ioctl(self.fd.as_raw_fd(), code as _, xchg.record.as_mut_ptr())
        };
        let ret = Errno::result(ret).inspect_err(|e| trace!("ioctl {:?}: {}", op, e))?;

        trace!("ioctl {:?} returned {}", op, ret);
        Ok(ret as usize)
    }
}

/// Run `attempt` with a zeroed buffer of `len` bytes, doubling the buffer
/// each time it fails with `Error::Overflow`.
///
/// Nothing from a failed attempt is kept: every retry starts from a fresh
/// buffer. Gives up with `Error::Overflow` after `MAX_DOUBLINGS` doublings.
pub fn call_growing<T, F>(mut len: usize, mut attempt: F) -> Result<T>
where
    F: FnMut(&mut [u8]) -> Result<T>,
{
    for doublings in 0..=MAX_DOUBLINGS {
        let mut buf = vec![0u8; len];
        match attempt(&mut buf) {
            Err(Error::Overflow) if doublings < MAX_DOUBLINGS => {
                warn!("result overflowed {} byte buffer, retrying with {}", len, len * 2);
                len = len.saturating_mul(2);
            }
            other => return other,
        }
    }
    Err(Error::Overflow)
}
