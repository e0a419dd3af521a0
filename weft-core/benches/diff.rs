//! Keyed children diff benchmarks
//!
//! Each iteration mounts a keyed list into a fresh `MemoryTree` during setup
//! and measures only the patch from the old order to the new one.

use std::cell::RefCell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use weft_core::render::{patch, Handle, MemoryTree, OldTree, SharedTarget, Target, VNode};

// =============================================================================
// Test Data Generation
// =============================================================================

fn list(keys: &[usize]) -> VNode {
    VNode::element("ul").with_children(
        keys.iter()
            .map(|&k| VNode::element("li").with_key(k).with_child(VNode::text(k.to_string()))),
    )
}

fn mounted(keys: &[usize]) -> (SharedTarget, VNode) {
    let tree = Rc::new(RefCell::new(MemoryTree::new()));
    let body: Handle = tree.borrow_mut().create_element("body");
    let target: SharedTarget = tree;
    let old = OldTree::Absent {
        parent: Some(body),
        reference: None,
    };
    let vnode = patch(&target, old, list(keys)).vnode;
    (target, vnode)
}

fn rotated(keys: &[usize]) -> Vec<usize> {
    let mut out = keys.to_vec();
    out.rotate_right(1);
    out
}

fn reversed(keys: &[usize]) -> Vec<usize> {
    keys.iter().rev().copied().collect()
}

fn shuffled(keys: &[usize]) -> Vec<usize> {
    // Deterministic interleave of the two halves.
    let (front, back) = keys.split_at(keys.len() / 2);
    back.iter().zip(front).flat_map(|(&b, &f)| [b, f]).collect()
}

// =============================================================================
// Diff Benchmarks
// =============================================================================

fn bench_keyed_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_diff");

    for size in [10usize, 100, 1_000] {
        let keys: Vec<usize> = (0..size).collect();
        let cases = [
            ("unchanged", keys.clone()),
            ("rotate", rotated(&keys)),
            ("reverse", reversed(&keys)),
            ("shuffle", shuffled(&keys)),
        ];

        for (name, next) in cases {
            group.bench_with_input(BenchmarkId::new(name, size), &next, |b, next| {
                b.iter_batched(
                    || mounted(&keys),
                    |(target, old)| black_box(patch(&target, OldTree::Virtual(old), list(next))),
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_keyed_diff);
criterion_main!(benches);
