//! In-memory stand-in for the ioctl surface of a mounted volume.
#![allow(dead_code)]

use nix::errno::Errno;
use scoutfs::gate::{CallGate, Exchange};
use scoutfs::serialize::{self, Encodable, Record};
use scoutfs::*;
use std::cell::RefCell;

/// Opaque second word the fake hands back in quota iterators
pub const ITER_COOKIE: u64 = 0x5c0a7f5;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Volume contents the fake answers from. Lists are kept in index order.
#[derive(Default)]
pub struct FakeFs {
    pub format: WireFormat,
    pub meta_inodes: Vec<InodeEntry>,
    pub data_inodes: Vec<InodeEntry>,
    pub xattr_name: Vec<u8>,
    pub xattr_holders: Vec<u64>,
    /// Empty replies without the end flag before the search makes progress
    pub search_stalls: RefCell<usize>,
    pub totals: Vec<XattrTotal>,
    pub waiters: Vec<DataWaitingEntry>,
    pub rules: Vec<QuotaRule>,
    pub dirents: Vec<BackReference>,
    /// Inode number and one path to it
    pub paths: Vec<(u64, PathResult)>,
    pub index: Vec<IndexEntry>,
    pub hidden_names: Vec<Vec<u8>>,
    pub stat: StatMore,
    pub statfs: StatfsMore,
    pub attrs: InodeAttrX,
    pub allocators: Vec<AllocDetailEntry>,

    pub calls: RefCell<Vec<Opcode>>,
    pub quota_iters: RefCell<Vec<QuotaIterator>>,
    pub alloc_nrs: RefCell<Vec<u64>>,
    /// Requests the fake only records: opcode, record bytes, input bytes
    pub sent: RefCell<Vec<(Opcode, Vec<u8>, Vec<u8>)>>,
    pub fail_next: RefCell<Option<Error>>,
}

impl FakeFs {
    pub fn with_format(format: WireFormat) -> FakeFs {
        FakeFs {
            format,
            ..Default::default()
        }
    }

    pub fn calls_to(&self, op: Opcode) -> usize {
        self.calls.borrow().iter().filter(|&&o| o == op).count()
    }

    /// Decode the last recorded request of `op`.
    pub fn last_sent<T: Record>(&self, op: Opcode) -> T {
        let sent = self.sent.borrow();
        let (_, rec, _) = sent.iter().rev().find(|(o, _, _)| *o == op).unwrap();
        serialize::from_bytes(rec, self.format).unwrap()
    }

    pub fn last_input(&self, op: Opcode) -> Vec<u8> {
        let sent = self.sent.borrow();
        sent.iter().rev().find(|(o, _, _)| *o == op).unwrap().2.clone()
    }

    fn write_back<T: Encodable>(&self, xchg: &mut Exchange<'_>, rec: &T) -> Result<()> {
        let bytes = serialize::to_bytes(rec, self.format)?;
        xchg.record_mut().copy_from_slice(&bytes);
        Ok(())
    }

    fn write_records<T: Record>(&self, out: &mut [u8], recs: &[T]) -> Result<usize> {
        let size = T::size(self.format);
        for (i, r) in recs.iter().enumerate() {
            let bytes = serialize::to_bytes(r, self.format)?;
            out[i * size..(i + 1) * size].copy_from_slice(&bytes);
        }
        Ok(recs.len())
    }

    fn walk(&self, xchg: &mut Exchange<'_>) -> Result<usize> {
        let req: WalkInodes = serialize::from_bytes(xchg.record(), self.format)?;
        let inodes = match req.index {
            0 => &self.meta_inodes,
            1 => &self.data_inodes,
            _ => return Err(Error::InvalidArgument),
        };
        let found: Vec<InodeEntry> = inodes
            .iter()
            .filter(|e| **e >= req.first && **e <= req.last)
            .take(req.nr_entries as usize)
            .copied()
            .collect();
        self.write_records(xchg.output_mut(), &found)
    }

    fn search(&self, xchg: &mut Exchange<'_>) -> Result<usize> {
        let mut req: SearchXattrs = serialize::from_bytes(xchg.record(), self.format)?;
        if req.name_bytes as usize != xchg.input().len() {
            return Err(Error::InvalidArgument);
        }
        {
            let mut stalls = self.search_stalls.borrow_mut();
            if *stalls > 0 {
                *stalls -= 1;
                return Ok(0);
            }
        }
        let holders: &[u64] = if xchg.input() == &self.xattr_name[..] {
            &self.xattr_holders
        } else {
            &[]
        };
        let rest: Vec<u64> = holders
            .iter()
            .copied()
            .filter(|&ino| ino >= req.next_ino && ino <= req.last_ino)
            .collect();
        let n = rest.len().min(req.nr_inodes as usize);
        self.write_records(xchg.output_mut(), &rest[..n])?;
        if n == rest.len() {
            req.output_flags |= SearchFlags::END;
            self.write_back(xchg, &req)?;
        }
        Ok(n)
    }

    fn totals(&self, xchg: &mut Exchange<'_>) -> Result<usize> {
        let req: ReadXattrTotals = serialize::from_bytes(xchg.record(), self.format)?;
        let room = req.totals_bytes as usize / XattrTotal::size(self.format);
        let found: Vec<XattrTotal> = self
            .totals
            .iter()
            .filter(|t| t.name >= req.pos_name)
            .take(room)
            .copied()
            .collect();
        self.write_records(xchg.output_mut(), &found)
    }

    fn waiting(&self, xchg: &mut Exchange<'_>) -> Result<usize> {
        let req: DataWaiting = serialize::from_bytes(xchg.record(), self.format)?;
        let after = BlockKey {
            ino: req.after_ino,
            iblock: req.after_iblock,
        };
        let found: Vec<DataWaitingEntry> = self
            .waiters
            .iter()
            .filter(|w| w.key() > after)
            .take(req.ents_nr as usize)
            .copied()
            .collect();
        self.write_records(xchg.output_mut(), &found)
    }

    fn quota(&self, xchg: &mut Exchange<'_>) -> Result<usize> {
        let mut req: GetQuotaRules = serialize::from_bytes(xchg.record(), self.format)?;
        self.quota_iters.borrow_mut().push(req.iterator);
        let from = req.iterator.0[0] as usize;
        let found: Vec<QuotaRule> = self
            .rules
            .iter()
            .skip(from)
            .take(req.nr as usize)
            .copied()
            .collect();
        self.write_records(xchg.output_mut(), &found)?;
        req.iterator = QuotaIterator([(from + found.len()) as u64, ITER_COOKIE]);
        self.write_back(xchg, &req)?;
        Ok(found.len())
    }

    fn referring(&self, xchg: &mut Exchange<'_>) -> Result<usize> {
        let req: GetReferringEntries = serialize::from_bytes(xchg.record(), self.format)?;
        let start = DirPos {
            dir_ino: req.dir_ino,
            dir_pos: req.dir_pos,
        };
        let out = xchg.output_mut();
        let room = out.len().min(req.entries_bytes as usize);
        let (mut off, mut n) = (0, 0);
        for ent in self.dirents.iter().filter(|e| e.ino == req.ino && e.pos() >= start) {
            let bytes = serialize::to_bytes(ent, self.format)?;
            if off + bytes.len() > room {
                if n == 0 {
                    return Err(Error::Overflow);
                }
                break;
            }
            out[off..off + bytes.len()].copy_from_slice(&bytes);
            off += bytes.len();
            n += 1;
        }
        Ok(n)
    }

    fn ino_path(&self, xchg: &mut Exchange<'_>) -> Result<usize> {
        let req: InoPath = serialize::from_bytes(xchg.record(), self.format)?;
        let start = DirPos {
            dir_ino: req.dir_ino,
            dir_pos: req.dir_pos,
        };
        let Some((_, found)) = self.paths.iter().find(|(ino, p)| {
            *ino == req.ino
                && DirPos {
                    dir_ino: p.dir_ino,
                    dir_pos: p.dir_pos,
                } >= start
        }) else {
            return Err(Error::NotFound);
        };
        let bytes = serialize::to_bytes(found, self.format)?;
        if bytes.len() > req.result_bytes as usize {
            return Err(Error::Overflow);
        }
        xchg.output_mut()[..bytes.len()].copy_from_slice(&bytes);
        Ok(0)
    }

    fn read_index(&self, xchg: &mut Exchange<'_>) -> Result<usize> {
        let req: ReadXattrIndex = serialize::from_bytes(xchg.record(), self.format)?;
        let found: Vec<IndexEntry> = self
            .index
            .iter()
            .filter(|e| **e >= req.first && **e <= req.last)
            .take(req.nr as usize)
            .copied()
            .collect();
        self.write_records(xchg.output_mut(), &found)
    }

    fn hidden(&self, xchg: &mut Exchange<'_>) -> Result<usize> {
        let mut req: ListXattrHidden = serialize::from_bytes(xchg.record(), self.format)?;
        let out = xchg.output_mut();
        let room = out.len().min(req.buf_bytes as usize);
        let mut next = req.id_pos as usize;
        let mut off = 0;
        for name in self.hidden_names.iter().skip(next) {
            if off + name.len() + 1 > room {
                if off == 0 {
                    return Err(Error::No(Errno::ERANGE));
                }
                break;
            }
            out[off..off + name.len()].copy_from_slice(name);
            out[off + name.len()] = 0;
            off += name.len() + 1;
            next += 1;
        }
        req.id_pos = next as u64;
        req.hash_pos = 0xabc;
        self.write_back(xchg, &req)?;
        Ok(off)
    }

    fn alloc_detail(&self, xchg: &mut Exchange<'_>) -> Result<usize> {
        let req: AllocDetail = serialize::from_bytes(xchg.record(), self.format)?;
        self.alloc_nrs.borrow_mut().push(req.nr);
        if (req.nr as usize) < self.allocators.len() {
            xchg.output_mut().fill(0xff);
            return Err(Error::Overflow);
        }
        self.write_records(xchg.output_mut(), &self.allocators)
    }

    fn record_only(&self, op: Opcode, xchg: &Exchange<'_>) -> Result<usize> {
        self.sent
            .borrow_mut()
            .push((op, xchg.record().to_vec(), xchg.input().to_vec()));
        Ok(0)
    }
}

impl CallGate for FakeFs {
    fn format(&self) -> WireFormat {
        self.format
    }

    fn call(&self, op: Opcode, xchg: &mut Exchange<'_>) -> Result<usize> {
        self.calls.borrow_mut().push(op);
        if let Some(e) = self.fail_next.borrow_mut().take() {
            return Err(e);
        }
        if xchg.record().len() != self.format.request_size(op) {
            return Err(Error::InvalidArgument);
        }

        match op {
            Opcode::WalkInodes => self.walk(xchg),
            Opcode::SearchXattrs => self.search(xchg),
            Opcode::ReadXattrTotals => self.totals(xchg),
            Opcode::DataWaiting => self.waiting(xchg),
            Opcode::GetQuotaRules => self.quota(xchg),
            Opcode::GetReferringEntries => self.referring(xchg),
            Opcode::InoPath => self.ino_path(xchg),
            Opcode::ReadXattrIndex => self.read_index(xchg),
            Opcode::ListXattrHidden => self.hidden(xchg),
            Opcode::AllocDetail => self.alloc_detail(xchg),
            Opcode::StatMore => {
                self.write_back(xchg, &self.stat)?;
                Ok(0)
            }
            Opcode::StatfsMore => {
                self.write_back(xchg, &self.statfs)?;
                Ok(0)
            }
            Opcode::GetAttrX => {
                let req: InodeAttrX = serialize::from_bytes(xchg.record(), self.format)?;
                let attrs = InodeAttrX {
                    mask: req.mask,
                    ..self.attrs
                };
                self.write_back(xchg, &attrs)?;
                Ok(0)
            }
            Opcode::Stage => {
                self.record_only(op, xchg)?;
                Ok(xchg.input().len())
            }
            Opcode::Release
            | Opcode::SetattrMore
            | Opcode::SetAttrX
            | Opcode::DataWaitErr
            | Opcode::MoveBlocks
            | Opcode::AddQuotaRule
            | Opcode::DelQuotaRule => self.record_only(op, xchg),
        }
    }
}
