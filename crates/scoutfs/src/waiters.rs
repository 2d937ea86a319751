//! Tasks blocked waiting for offline file data.
//!
//! The queue is resumed "after" a block: the request carries the last
//! `(ino, iblock)` seen and the kernel returns strictly later waiters, so the
//! resume key is the last entry itself rather than its successor.

use crate::cursor::{Advance, Cursor, Query};
use crate::format::WireFormat;
use crate::gate::{CallGate, Exchange};
use crate::record::{BlockKey, DataWaitErr, DataWaitOp, DataWaiting, DataWaitingEntry, Opcode};
use crate::serialize::{self, Record};
use crate::utils::Result;
use log::debug;

/// Waiters asked for per call unless changed
pub const DEFAULT_BATCH: usize = 128;

/// Pending data waiters after a block position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DataWaiters;

impl Query for DataWaiters {
    type Pos = BlockKey;
    type Item = DataWaitingEntry;

    const OPCODE: Opcode = Opcode::DataWaiting;
    const NAME: &'static str = "data waiting";

    fn buffer_len(&self, batch: usize, format: WireFormat) -> usize {
        DataWaitingEntry::size(format) * batch
    }

    fn max_batch(&self) -> usize {
        u16::MAX as usize
    }

    fn request(
        &self,
        pos: &BlockKey,
        xchg: &Exchange<'_>,
        batch: usize,
        format: WireFormat,
    ) -> Result<Vec<u8>> {
        let dw = DataWaiting {
            flags: 0,
            after_ino: pos.ino,
            after_iblock: pos.iblock,
            ents_ptr: xchg.output_ptr(),
            ents_nr: batch as u16,
        };
        serialize::to_bytes(&dw, format)
    }

    fn decode(
        &self,
        count: usize,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Vec<DataWaitingEntry>> {
        serialize::decode_array(xchg.output(), count, format)
    }

    fn advance(
        &self,
        _pos: &BlockKey,
        items: &mut Vec<DataWaitingEntry>,
        _xchg: &Exchange<'_>,
        _format: WireFormat,
    ) -> Result<Advance<BlockKey>> {
        Ok(match items.last() {
            Some(e) => Advance::To(e.key()),
            None => Advance::Done,
        })
    }
}

/// Cursor over the data waiting queue
pub type Waiters<G> = Cursor<G, DataWaiters>;

/// List data waiters from the start of the queue.
pub fn data_waiters<G: CallGate>(gate: G) -> Waiters<G> {
    Cursor::new(gate, DataWaiters, BlockKey::default(), DEFAULT_BATCH)
}

/// Tell the task waiting on `ino` that its data cannot be provided.
///
/// `err` is the negative errno the waiter's read or write fails with.
pub fn send_data_wait_err<G: CallGate>(
    gate: &G,
    ino: u64,
    version: u64,
    offset: u64,
    count: u64,
    op: DataWaitOp,
    err: i64,
) -> Result<()> {
    let format = gate.format();
    let mut xchg = Exchange::bare();
    xchg.set_record(
        &DataWaitErr {
            ino,
            version,
            offset,
            count,
            op: op.bits() as u64,
            err,
        },
        format,
    )?;
    debug!("data wait err ino {} offset {} err {}", ino, offset, err);
    gate.call(Opcode::DataWaitErr, &mut xchg)?;
    Ok(())
}
