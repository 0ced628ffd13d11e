//! Benchmarks for layer-diff
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use layer_diff::fs::dirent::parse_dirents;
use layer_diff::fs::{DirEntryRef, DEFAULT_BUFFER_SIZE};
use layer_diff::walker::{diff_trees_with, merge_listings, Sequential, WorkerPool};
use std::fs;

/// Encode `count` linux_dirent64 records into one buffer
fn dirent_buffer(count: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..count {
        let name = format!("entry-{i:06}");
        let reclen = (19 + name.len() + 1 + 7) & !7;
        let start = buf.len();
        buf.extend_from_slice(&(i as u64 + 1).to_ne_bytes());
        buf.extend_from_slice(&0i64.to_ne_bytes());
        buf.extend_from_slice(&(reclen as u16).to_ne_bytes());
        buf.push(libc::DT_REG);
        buf.extend_from_slice(name.as_bytes());
        buf.resize(start + reclen, 0);
    }
    buf
}

fn benchmark_parse_dirents(c: &mut Criterion) {
    let buf = dirent_buffer(1000);

    c.bench_function("parse_dirents_1000", |b| {
        let mut out = Vec::with_capacity(1000);
        b.iter(|| {
            out.clear();
            let n = parse_dirents(black_box(&buf), &mut out).unwrap();
            black_box(n);
        })
    });
}

fn benchmark_merge_listings(c: &mut Criterion) {
    let left: Vec<DirEntryRef> = (0..10_000)
        .map(|i| DirEntryRef::new(format!("f{i:05}"), i))
        .collect();
    // Every third entry differs in inode, every seventh only exists on the left
    let right: Vec<DirEntryRef> = left
        .iter()
        .filter(|e| e.inode % 7 != 0)
        .map(|e| {
            let inode = if e.inode % 3 == 0 { e.inode + 1_000_000 } else { e.inode };
            DirEntryRef::new(e.name.clone(), inode)
        })
        .collect();

    c.bench_function("merge_listings_10k", |b| {
        b.iter(|| black_box(merge_listings(black_box(&left), black_box(&right), true)))
    });
}

fn benchmark_diff(c: &mut Criterion) {
    let base = tempfile::tempdir().unwrap();
    let old = base.path().join("old");
    let new = base.path().join("new");

    for d in 0..20 {
        let old_dir = old.join(format!("d{d}"));
        let new_dir = new.join(format!("d{d}"));
        fs::create_dir_all(&old_dir).unwrap();
        fs::create_dir_all(&new_dir).unwrap();
        for f in 0..50 {
            let name = format!("f{f}");
            fs::write(old_dir.join(&name), b"data").unwrap();
            if f % 5 == 0 {
                fs::write(new_dir.join(&name), b"changed").unwrap();
            } else {
                fs::hard_link(old_dir.join(&name), new_dir.join(&name)).unwrap();
            }
        }
    }

    let mut group = c.benchmark_group("diff_1000_entries");
    group.bench_function("sequential", |b| {
        b.iter(|| black_box(diff_trees_with(&Sequential, &old, &new, DEFAULT_BUFFER_SIZE).unwrap()))
    });
    group.bench_function("pool_4", |b| {
        let pool = WorkerPool::new(4, 1024);
        b.iter(|| black_box(diff_trees_with(&pool, &old, &new, DEFAULT_BUFFER_SIZE).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, benchmark_parse_dirents, benchmark_merge_listings, benchmark_diff);
criterion_main!(benches);
