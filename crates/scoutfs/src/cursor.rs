//! Resumable batch enumeration.
//!
//! The filesystem never streams: each call fills at most one caller sized
//! buffer. A [`Cursor`] owns that buffer and the resume position, and a
//! [`Query`] describes how one particular listing builds its request, decodes
//! the reply, recognises its end and derives the next position.

use crate::error::Error;
use crate::format::WireFormat;
use crate::gate::{CallGate, Exchange};
use crate::record::Opcode;
use crate::utils::Result;
use crate::{io_err, res};
use log::debug;
use std::fmt;

/// Where a cursor goes after a decoded batch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Advance<P> {
    /// Resume from this position on the next call.
    To(P),
    /// Nothing is left; the batch just returned is the last.
    Done,
}

/// One kind of paginated listing.
pub trait Query {
    /// Resume position carried between calls
    type Pos: Copy + fmt::Debug;
    /// Decoded entry
    type Item;

    const OPCODE: Opcode;
    const NAME: &'static str;

    /// Output buffer bytes needed for `batch` entries.
    fn buffer_len(&self, batch: usize, format: WireFormat) -> usize;

    /// Largest batch the request record can express.
    fn max_batch(&self) -> usize {
        usize::MAX
    }

    /// Input bytes the request points at, if any.
    fn input(&self) -> &[u8] {
        &[]
    }

    /// Encode the request for a batch starting at `pos`.
    fn request(
        &self,
        pos: &Self::Pos,
        xchg: &Exchange<'_>,
        batch: usize,
        format: WireFormat,
    ) -> Result<Vec<u8>>;

    /// Number of entries described by the gate's return value.
    fn count(&self, ret: usize, _xchg: &Exchange<'_>, _format: WireFormat) -> Result<usize> {
        Ok(ret)
    }

    /// Whether this reply ends the listing. Without an explicit end marker
    /// an empty reply is the end.
    fn end_of_results(
        &self,
        count: usize,
        _xchg: &Exchange<'_>,
        _format: WireFormat,
    ) -> Result<bool> {
        Ok(count == 0)
    }

    /// Decode `count` entries from the output buffer.
    fn decode(
        &self,
        count: usize,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Vec<Self::Item>>;

    /// Position after a non-empty batch. May drop entries from `items` that
    /// fall outside the listing.
    fn advance(
        &self,
        pos: &Self::Pos,
        items: &mut Vec<Self::Item>,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Advance<Self::Pos>>;

    /// Errors that mean "no more entries" for this listing.
    fn ends_on(&self, _err: &Error) -> bool {
        false
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Active,
    Done,
}

/// Caller owned enumeration state over one gate.
pub struct Cursor<G, Q: Query> {
    gate: G,
    query: Q,
    start: Q::Pos,
    pos: Q::Pos,
    batch: usize,
    buf: Vec<u8>,
    state: State,
    started: bool,
}

impl<G, Q> fmt::Debug for Cursor<G, Q>
where
    Q: Query,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("query", &Q::NAME)
            .field("pos", &self.pos)
            .field("batch", &self.batch)
            .field("state", &self.state)
            .finish()
    }
}

impl<G: CallGate, Q: Query> Cursor<G, Q> {
    pub fn new(gate: G, query: Q, start: Q::Pos, batch: usize) -> Cursor<G, Q> {
        Cursor {
            gate,
            query,
            start,
            pos: start,
            batch,
            buf: Vec::new(),
            state: State::Active,
            started: false,
        }
    }

    fn check_unstarted(&self, what: &str) -> Result<()> {
        if self.started {
            return res!(io_err!(
                InvalidInput,
                format!("{} of {} fixed after first call", what, Q::NAME)
            ));
        }
        Ok(())
    }

    /// Change the number of entries asked for per call.
    pub fn set_batch_size(&mut self, batch: usize) -> Result<()> {
        self.check_unstarted("batch size")?;
        if batch == 0 || batch > self.query.max_batch() {
            return res!(io_err!(
                InvalidInput,
                format!("{} batch size {} out of range", Q::NAME, batch)
            ));
        }
        self.batch = batch;
        Ok(())
    }

    /// Change where the listing starts.
    pub fn set_start(&mut self, pos: Q::Pos) -> Result<()> {
        self.check_unstarted("start position")?;
        self.start = pos;
        self.pos = pos;
        Ok(())
    }

    /// Adjust listing specific parameters.
    pub fn configure<F: FnOnce(&mut Q)>(&mut self, f: F) -> Result<()> {
        self.check_unstarted("configuration")?;
        f(&mut self.query);
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        self.batch
    }

    pub fn position(&self) -> Q::Pos {
        self.pos
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Go back to the start position, allowing reconfiguration.
    pub fn reset(&mut self) {
        self.pos = self.start;
        self.state = State::Active;
        self.started = false;
    }

    /// Fetch the next batch.
    ///
    /// An empty batch with `is_done()` true means the listing is exhausted.
    /// A failed call changes nothing: the setters stay open and the call may
    /// be retried.
    pub fn next_batch(&mut self) -> Result<Vec<Q::Item>> {
        if self.state == State::Done {
            return Ok(Vec::new());
        }

        let format = self.gate.format();
        let len = self.query.buffer_len(self.batch, format);
        if self.buf.len() != len {
            self.buf = vec![0; len];
        }

        let mut xchg = Exchange::new(self.query.input(), &mut self.buf);
        let record = self.query.request(&self.pos, &xchg, self.batch, format)?;
        xchg.set_raw_record(record);

        let ret = match self.gate.call(Q::OPCODE, &mut xchg) {
            Ok(ret) => ret,
            Err(e) if self.query.ends_on(&e) => {
                debug!("{}: ended by {} at {:?}", Q::NAME, e, self.pos);
                self.started = true;
                self.state = State::Done;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        self.started = true;

        let count = self.query.count(ret, &xchg, format)?;
        let end = self.query.end_of_results(count, &xchg, format)?;
        if count == 0 {
            if end {
                self.state = State::Done;
            }
            debug!("{}: empty batch at {:?}, end={}", Q::NAME, self.pos, end);
            return Ok(Vec::new());
        }

        let mut items = self.query.decode(count, &xchg, format)?;
        match self.query.advance(&self.pos, &mut items, &xchg, format)? {
            Advance::To(next) => {
                self.pos = next;
                if end {
                    self.state = State::Done;
                }
            }
            Advance::Done => self.state = State::Done,
        }

        debug!(
            "{}: {} entries, next {:?}, done={}",
            Q::NAME,
            items.len(),
            self.pos,
            self.is_done()
        );
        Ok(items)
    }

    /// Iterate over batches until the listing is exhausted. Empty batches
    /// the listing reports as not final are yielded too.
    pub fn batches(&mut self) -> Batches<'_, G, Q> {
        Batches { cursor: self }
    }

    /// Gather every remaining entry.
    pub fn collect_all(&mut self) -> Result<Vec<Q::Item>> {
        let mut all = Vec::new();
        for batch in self.batches() {
            all.extend(batch?);
        }
        Ok(all)
    }
}

/// Iterator over the batches of a cursor.
pub struct Batches<'a, G, Q: Query> {
    cursor: &'a mut Cursor<G, Q>,
}

impl<G: CallGate, Q: Query> Iterator for Batches<'_, G, Q> {
    type Item = Result<Vec<Q::Item>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_done() {
            return None;
        }
        match self.cursor.next_batch() {
            Ok(batch) if batch.is_empty() && self.cursor.is_done() => None,
            other => Some(other),
        }
    }
}
