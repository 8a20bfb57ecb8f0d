//! Performance benchmarks for the explorer hot paths.
//!
//! These benchmarks measure:
//! - Tree snapshots of a generated directory at several depths
//! - Encoding a large snapshot into a wire frame

use std::fs;
use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use daemon::FileExplorer;
use protocol::{Envelope, Frame, FrameCodec, Message};
use tempfile::TempDir;

/// Build `width` directories per level, `levels` deep, with `files` files in each.
fn populate(dir: &Path, levels: usize, width: usize, files: usize) {
    for f in 0..files {
        fs::write(dir.join(format!("file_{f}.txt")), b"burrow").unwrap();
    }
    if levels == 0 {
        return;
    }
    for d in 0..width {
        let child = dir.join(format!("dir_{d}"));
        fs::create_dir(&child).unwrap();
        populate(&child, levels - 1, width, files);
    }
}

fn bench_to_tree(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 3, 4, 8);
    let explorer = FileExplorer::new(temp.path()).unwrap();

    let mut group = c.benchmark_group("to_tree");
    for depth in [0i64, 1, 2, -1] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let node = explorer.get_file("").unwrap();
                black_box(node.to_tree(depth).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_frame_encoding(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    populate(temp.path(), 3, 4, 8);
    let explorer = FileExplorer::new(temp.path()).unwrap();
    let tree = explorer.get_file("").unwrap().to_tree(-1).unwrap();
    let payload = Envelope::new(1, Message::FileTree(tree)).to_msgpack().unwrap();

    let mut group = c.benchmark_group("frame_encoding");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    let compressed = FrameCodec::new();
    group.bench_function("lz4", |b| {
        b.iter(|| compressed.encode(black_box(&Frame::new(payload.clone()))).unwrap());
    });

    let plain = FrameCodec::without_compression();
    group.bench_function("uncompressed", |b| {
        b.iter(|| plain.encode(black_box(&Frame::new(payload.clone()))).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_to_tree, bench_frame_encoding);

criterion_main!(benches);
