mod common;

use common::FakeFs;
use scoutfs::ops::{self, ALLOC_DETAIL_BATCH};
use scoutfs::*;
use std::io::{Seek, Write};
use std::os::fd::AsRawFd;

fn allocators(n: u64) -> Vec<AllocDetailEntry> {
    (0..n)
        .map(|id| AllocDetailEntry {
            id,
            blocks: if id % 2 == 0 { 2 } else { 3 },
            typ: 1,
            flags: if id % 2 == 0 {
                AllocFlags::META
            } else {
                AllocFlags::empty()
            },
        })
        .collect()
}

#[test]
fn disk_usage_sums_allocators_by_kind() {
    common::init_logging();
    let fs = FakeFs {
        statfs: StatfsMore {
            total_meta_blocks: 1 << 20,
            total_data_blocks: 1 << 30,
            ..Default::default()
        },
        allocators: allocators(6),
        ..Default::default()
    };
    assert_eq!(
        ops::disk_usage(&fs).unwrap(),
        ops::DiskUsage {
            total_meta_blocks: 1 << 20,
            free_meta_blocks: 6,
            total_data_blocks: 1 << 30,
            free_data_blocks: 9,
        }
    );
    assert_eq!(*fs.alloc_nrs.borrow(), vec![ALLOC_DETAIL_BATCH as u64]);
}

#[test]
fn alloc_detail_grows_past_overflow() {
    let n = ALLOC_DETAIL_BATCH as u64 + 1;
    let fs = FakeFs {
        allocators: allocators(n),
        ..Default::default()
    };
    let got = ops::alloc_detail(&fs).unwrap();
    assert_eq!(got, allocators(n));
    assert_eq!(
        *fs.alloc_nrs.borrow(),
        vec![ALLOC_DETAIL_BATCH as u64, 2 * ALLOC_DETAIL_BATCH as u64]
    );

    let du = ops::disk_usage(&fs).unwrap();
    assert_eq!(du.free_meta_blocks, 2 * (n / 2 + 1));
    assert_eq!(du.free_data_blocks, 3 * (n / 2));
}

#[test]
fn fs_ids_are_derived_from_statfs() {
    let fs = FakeFs {
        statfs: StatfsMore {
            fsid: 0x0123456789abcdef,
            rid: 0xfedcba9876543210,
            committed_seq: 77,
            ..Default::default()
        },
        ..Default::default()
    };
    let ids = ops::fs_ids(&fs).unwrap();
    assert_eq!(ids.short_id, "f.012345.r.fedcba");
    assert_eq!(ids.committed_seq, 77);
}

#[test]
fn stat_more_reads_the_written_back_record() {
    let stat = StatMore {
        meta_seq: 10,
        data_seq: 11,
        data_version: 3,
        online_blocks: 4,
        offline_blocks: 5,
        crtime: Time { sec: 1700000000, nsec: 12 },
    };
    let fs = FakeFs {
        stat,
        ..Default::default()
    };
    assert_eq!(ops::stat_more(&fs).unwrap(), stat);
}

#[test]
fn project_id_goes_through_attr_x() {
    let fs = FakeFs {
        attrs: InodeAttrX {
            project_id: 9001,
            size: 123,
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(ops::project_id(&fs).unwrap(), 9001);

    ops::set_project_id(&fs, 42).unwrap();
    let sent: InodeAttrX = fs.last_sent(Opcode::SetAttrX);
    assert_eq!(sent.mask, AttrXMask::PROJECT_ID);
    assert_eq!(sent.project_id, 42);
}

#[test]
fn release_file_rounds_up_to_blocks() {
    let fs = FakeFs::default();
    ops::release_file(&fs, 5000, 8).unwrap();
    assert_eq!(
        fs.last_sent::<Release>(Opcode::Release),
        Release {
            offset: 0,
            length: 2 * BLOCK_SIZE,
            version: 8,
        }
    );
}

#[test]
fn stage_points_at_the_data() {
    let fs = FakeFs::default();
    assert_eq!(ops::stage(&fs, 4, 8192, b"archived").unwrap(), 8);
    let sent: Stage = fs.last_sent(Opcode::Stage);
    assert_eq!((sent.data_version, sent.offset, sent.length), (4, 8192, 8));
    assert_ne!(sent.buf_ptr, 0);
    assert_eq!(fs.last_input(Opcode::Stage), b"archived".to_vec());
}

fn source_file(len: usize) -> std::fs::File {
    let mut f = tempfile::tempfile().unwrap();
    f.write_all(&vec![0x5a; len]).unwrap();
    f
}

#[test]
fn move_data_appends_and_truncates_the_source() {
    let fs = FakeFs::default();
    let mut from = source_file(10_000);

    ops::move_data(&fs, &from, 8192).unwrap();

    let mb: MoveBlocks = fs.last_sent(Opcode::MoveBlocks);
    assert_eq!(mb.from_fd, from.as_raw_fd() as u64);
    assert_eq!((mb.from_off, mb.len, mb.to_off), (0, 10_000, 8192));
    assert!(mb.flags.is_empty());
    assert_eq!(from.metadata().unwrap().len(), 0);
    assert_eq!(from.stream_position().unwrap(), 0);
}

#[test]
fn stage_move_fills_offline_extents() {
    let fs = FakeFs::default();
    let mut from = source_file(4096);

    ops::stage_move(&fs, &from, 12288, 6).unwrap();

    let mb: MoveBlocks = fs.last_sent(Opcode::MoveBlocks);
    assert_eq!((mb.len, mb.to_off, mb.data_version), (4096, 12288, 6));
    assert_eq!(mb.flags, MoveFlags::STAGE);
    assert_eq!(from.metadata().unwrap().len(), 0);
    assert_eq!(from.stream_position().unwrap(), 0);
}

#[test]
fn stage_move_at_leaves_the_source_alone() {
    let fs = FakeFs::default();
    let from = source_file(8192);

    ops::stage_move_at(&fs, &from, 4096, 4096, 0, 2).unwrap();

    let mb: MoveBlocks = fs.last_sent(Opcode::MoveBlocks);
    assert_eq!((mb.from_off, mb.len, mb.to_off), (4096, 4096, 0));
    assert_eq!(mb.flags, MoveFlags::STAGE);
    assert_eq!(from.metadata().unwrap().len(), 8192);
}

#[test]
fn kernel_errors_propagate() {
    let fs = FakeFs::default();
    *fs.fail_next.borrow_mut() = Some(Error::from(nix::errno::Errno::EPERM));
    let err = ops::release(&fs, 0, BLOCK_SIZE, 1).unwrap_err();
    assert_eq!(err.errno(), nix::errno::Errno::EPERM);
}
