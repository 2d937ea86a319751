//! Composite resume keys.
//!
//! Every range-bounded listing resumes from "the key after the last entry
//! seen". Keys compare lexicographically over their words, most significant
//! first, and increment by adding one to the least significant word and
//! carrying upwards.

use crate::record::{BlockKey, DirPos, IndexEntry, InodeEntry};

/// Totally ordered multi-word position with carry increment.
pub trait CompositeKey: Copy + Ord {
    /// Smallest key, every word zero
    const MIN: Self;
    /// Largest key, every word at its maximum
    const MAX: Self;

    /// Next key in order, or `None` when `self` is `MAX` and the key space
    /// is exhausted.
    fn increment(&self) -> Option<Self>;
}

macro_rules! composite_key {
    ($typ:ident { $($field:ident: $ftyp:ty),+ } carry $($low:ident),+) => {
        impl CompositeKey for $typ {
            const MIN: Self = $typ { $($field: <$ftyp>::MIN),+ };
            const MAX: Self = $typ { $($field: <$ftyp>::MAX),+ };

            fn increment(&self) -> Option<Self> {
                let mut next = *self;
                $(
                    match next.$low.checked_add(1) {
                        Some(v) => {
                            next.$low = v;
                            return Some(next);
                        }
                        None => next.$low = 0,
                    }
                )+
                None
            }
        }
    };
}

composite_key!(InodeEntry { major: u64, minor: u32, ino: u64 } carry ino, minor, major);
composite_key!(BlockKey { ino: u64, iblock: u64 } carry iblock, ino);
composite_key!(DirPos { dir_ino: u64, dir_pos: u64 } carry dir_pos, dir_ino);
composite_key!(IndexEntry { major: u8, minor: u64, ino: u64 } carry ino, minor, major);

impl CompositeKey for u64 {
    const MIN: Self = 0;
    const MAX: Self = u64::MAX;

    fn increment(&self) -> Option<Self> {
        self.checked_add(1)
    }
}

impl<const N: usize> CompositeKey for [u64; N] {
    const MIN: Self = [0; N];
    const MAX: Self = [u64::MAX; N];

    fn increment(&self) -> Option<Self> {
        let mut next = *self;
        for word in next.iter_mut().rev() {
            match word.checked_add(1) {
                Some(v) => {
                    *word = v;
                    return Some(next);
                }
                None => *word = 0,
            }
        }
        None
    }
}
