//! Quorum membership of the local mount, as published in sysfs.

use crate::gate::CallGate;
use crate::ops;
use crate::utils::Result;
use crate::{io_err, res};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Root of the per mount sysfs directories
pub const SYSFS_ROOT: &str = "/sys/fs/scoutfs";

/// Status file, relative to a mount's sysfs directory
pub const STATUS_FILE: &str = "quorum/status";

const LEADER_ROLE: &str = "(leader)";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuorumInfo {
    pub slot: i64,
    pub term: i64,
    pub role: String,
}

impl QuorumInfo {
    pub fn is_leader(&self) -> bool {
        self.role == LEADER_ROLE
    }
}

fn parse_int(key: &str, val: &str) -> Result<i64> {
    match val.parse() {
        Ok(v) => Ok(v),
        Err(e) => res!(io_err!(InvalidData, format!("parse {} {:?}: {}", key, val, e))),
    }
}

/// Parse a quorum status file. Unknown lines are ignored.
pub fn parse_status<R: BufRead>(r: R) -> Result<QuorumInfo> {
    let mut qi = QuorumInfo::default();
    for line in r.lines() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            return res!(io_err!(InvalidData, format!("parse line {:?}", line)));
        }
        match fields[0] {
            "quorum_slot_nr" => qi.slot = parse_int(fields[0], fields[1])?,
            "term" => qi.term = parse_int(fields[0], fields[1])?,
            "role" => match fields.get(2) {
                Some(role) => qi.role = role.to_string(),
                None => return res!(io_err!(InvalidData, format!("parse line {:?}", line))),
            },
            _ => {}
        }
    }
    Ok(qi)
}

/// Status file of the mount with `short_id` under `root`.
pub fn status_path(root: &Path, short_id: &str) -> PathBuf {
    root.join(short_id).join(STATUS_FILE)
}

pub fn read_status(path: &Path) -> Result<QuorumInfo> {
    parse_status(BufReader::new(File::open(path)?))
}

/// Quorum status of the mount the gate belongs to.
pub fn quorum_info<G: CallGate>(gate: &G) -> Result<QuorumInfo> {
    let ids = ops::fs_ids(gate)?;
    read_status(&status_path(Path::new(SYSFS_ROOT), &ids.short_id))
}
