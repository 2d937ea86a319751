//! Quota rules: listing, match ordering, presentation, add and delete.

use crate::cursor::{Advance, Cursor, Query};
use crate::format::WireFormat;
use crate::gate::{CallGate, Exchange};
use crate::record::{
    GetQuotaRules, NAME_FLAG_SELECT, NameSource, Opcode, QuotaIterator, QuotaOp, QuotaRule,
    QuotaRuleFlags,
};
use crate::serialize::{self, Record};
use crate::utils::{self, Result};
use num_traits::FromPrimitive;
use std::cmp::Ordering;
use std::fmt;

/// Rules asked for per call unless changed
pub const DEFAULT_BATCH: usize = 64;

impl QuotaRule {
    /// Rule naming three literal words.
    pub fn literal(op: QuotaOp, id: [u64; 3], limit: u64, prio: u8) -> QuotaRule {
        QuotaRule::build(op, id, [NameSource::Literal; 3], 0, limit, prio)
    }

    /// Rule applying separately to every project, uid or gid in `source`.
    pub fn general(op: QuotaOp, id1: u64, id2: u64, source: NameSource, limit: u64, prio: u8) -> QuotaRule {
        QuotaRule::build(
            op,
            [id1, id2, 0],
            [NameSource::Literal, NameSource::Literal, source],
            0,
            limit,
            prio,
        )
    }

    /// Rule applying to the one project, uid or gid `value`.
    pub fn select(
        op: QuotaOp,
        id1: u64,
        id2: u64,
        source: NameSource,
        value: u64,
        limit: u64,
        prio: u8,
    ) -> QuotaRule {
        QuotaRule::build(
            op,
            [id1, id2, value],
            [NameSource::Literal, NameSource::Literal, source],
            NAME_FLAG_SELECT,
            limit,
            prio,
        )
    }

    fn build(op: QuotaOp, name_val: [u64; 3], source: [NameSource; 3], select: u8, limit: u64, prio: u8) -> QuotaRule {
        let rule_flags = match op {
            QuotaOp::Inode => QuotaRuleFlags::TOTL_COUNT,
            QuotaOp::Data => QuotaRuleFlags::empty(),
        };
        QuotaRule {
            name_val,
            limit,
            prio,
            op: op as u8,
            rule_flags,
            name_source: source.map(|s| s as u8),
            name_flags: [0, 0, select],
        }
    }

    pub fn quota_op(&self) -> Option<QuotaOp> {
        QuotaOp::from_u8(self.op)
    }

    /// Source of the final name word, which decides what the rule limits.
    pub fn source(&self) -> Option<NameSource> {
        NameSource::from_u8(self.name_source[2])
    }

    pub fn is_select(&self) -> bool {
        self.name_flags[2] == NAME_FLAG_SELECT
    }

    /// True when the rule applies to every id of its source.
    pub fn is_general(&self) -> bool {
        self.source() != Some(NameSource::Literal) && !self.is_select()
    }

    /// Short label for the rule's source.
    pub fn kind(&self) -> &'static str {
        match self.source() {
            Some(NameSource::Literal) => "Literal",
            Some(NameSource::Uid) => "UID",
            Some(NameSource::Gid) => "GID",
            Some(NameSource::Project) => "Proj",
            None => "-",
        }
    }

    /// Like `Display` with data limits in binary units.
    pub fn human_string(&self) -> String {
        let limit = match self.quota_op() {
            Some(QuotaOp::Data) => utils::human_bytes(self.limit),
            _ => self.limit.to_string(),
        };
        self.describe(Some(&limit), false)
    }

    /// Like `Display` without the limit.
    pub fn without_limit(&self) -> String {
        self.describe(None, true)
    }

    /// Every field, unformatted.
    pub fn raw(&self) -> String {
        format!(
            "Op={}, Value={:?}, Source={:?}, Flags={:?}, Limit={}, Priority={}",
            self.op, self.name_val, self.name_source, self.name_flags, self.limit, self.prio
        )
    }

    /// `aligned` pads the source kind to four columns.
    fn describe(&self, limit: Option<&str>, aligned: bool) -> String {
        let op = match self.quota_op() {
            Some(QuotaOp::Inode) => "File",
            Some(QuotaOp::Data) => "Size",
            None => "Unknown",
        };
        let what = match self.source() {
            None => return self.raw(),
            Some(NameSource::Literal) => "Literal".to_string(),
            Some(_) if self.is_select() && aligned => {
                format!("{:<4} [{:>5}]", self.kind(), self.name_val[2])
            }
            Some(_) if self.is_select() => format!("{} [{:>5}]", self.kind(), self.name_val[2]),
            Some(_) if aligned => format!("{:<4} general", self.kind()),
            Some(_) => format!("{} general", self.kind()),
        };
        match limit {
            Some(limit) => format!("P: {:>3} {:<7} {} Limit: {}", self.prio, op, what, limit),
            None => format!("P: {:>3} {:<7} {}", self.prio, op, what),
        }
    }
}

impl fmt::Display for QuotaRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(Some(&self.limit.to_string()), true))
    }
}

/// Order in which the filesystem tries rules: higher priority first, then
/// each name word (value, source, flags) descending, then op, then limit.
pub fn match_order(a: &QuotaRule, b: &QuotaRule) -> Ordering {
    let words = |r: &QuotaRule| {
        [0, 1, 2].map(|i| (r.name_val[i], r.name_source[i], r.name_flags[i]))
    };
    b.prio
        .cmp(&a.prio)
        .then_with(|| words(b).cmp(&words(a)))
        .then(b.op.cmp(&a.op))
        .then(b.limit.cmp(&a.limit))
}

/// Rules in the order they would be matched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSet(Vec<QuotaRule>);

impl RuleSet {
    pub fn new(mut rules: Vec<QuotaRule>) -> RuleSet {
        rules.sort_by(match_order);
        RuleSet(rules)
    }

    pub fn rules(&self) -> &[QuotaRule] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<QuotaRule> {
        self.0
    }
}

impl From<Vec<QuotaRule>> for RuleSet {
    fn from(rules: Vec<QuotaRule>) -> RuleSet {
        RuleSet::new(rules)
    }
}

/// Listing of every stored quota rule, in no particular order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QuotaListing;

impl Query for QuotaListing {
    type Pos = QuotaIterator;
    type Item = QuotaRule;

    const OPCODE: Opcode = Opcode::GetQuotaRules;
    const NAME: &'static str = "get quota rules";

    fn buffer_len(&self, batch: usize, format: WireFormat) -> usize {
        QuotaRule::size(format) * batch
    }

    fn request(
        &self,
        pos: &QuotaIterator,
        xchg: &Exchange<'_>,
        batch: usize,
        format: WireFormat,
    ) -> Result<Vec<u8>> {
        let req = GetQuotaRules {
            iterator: *pos,
            ptr: xchg.output_ptr(),
            nr: batch as u64,
        };
        serialize::to_bytes(&req, format)
    }

    fn decode(
        &self,
        count: usize,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Vec<QuotaRule>> {
        serialize::decode_array(xchg.output(), count, format)
    }

    fn advance(
        &self,
        _pos: &QuotaIterator,
        _items: &mut Vec<QuotaRule>,
        xchg: &Exchange<'_>,
        format: WireFormat,
    ) -> Result<Advance<QuotaIterator>> {
        let req: GetQuotaRules = serialize::from_bytes(xchg.record(), format)?;
        Ok(Advance::To(req.iterator))
    }
}

/// Cursor over the stored quota rules
pub type QuotaRules<G> = Cursor<G, QuotaListing>;

/// List quota rules, `count` per call.
pub fn quota_rules<G: CallGate>(gate: G, count: usize) -> QuotaRules<G> {
    Cursor::new(gate, QuotaListing, QuotaIterator::default(), count)
}

/// Every quota rule, sorted in match order.
pub fn sorted_quota_rules<G: CallGate>(gate: G) -> Result<RuleSet> {
    Ok(RuleSet::new(quota_rules(gate, DEFAULT_BATCH).collect_all()?))
}

pub fn add_quota_rule<G: CallGate>(gate: &G, rule: &QuotaRule) -> Result<()> {
    quota_rule_call(gate, Opcode::AddQuotaRule, rule)
}

pub fn delete_quota_rule<G: CallGate>(gate: &G, rule: &QuotaRule) -> Result<()> {
    quota_rule_call(gate, Opcode::DelQuotaRule, rule)
}

fn quota_rule_call<G: CallGate>(gate: &G, op: Opcode, rule: &QuotaRule) -> Result<()> {
    let mut xchg = Exchange::bare();
    xchg.set_record(rule, gate.format())?;
    gate.call(op, &mut xchg)?;
    Ok(())
}
