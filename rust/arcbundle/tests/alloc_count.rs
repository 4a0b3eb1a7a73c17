//! Allocation-count invariants: a bundle costs one control-block
//! allocation plus at most one payload allocation, no matter how many
//! members it has.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use arcbundle::{bundle, slice, value, value_of};

struct CountingAlloc;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOCATIONS.with(|count| count.set(count.get() + 1));
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc;

/// Runs `f` and returns how many allocations the current thread made.
fn allocations_during<R>(f: impl FnOnce() -> R) -> (usize, R) {
    let before = ALLOCATIONS.with(Cell::get);
    let result = f();
    (ALLOCATIONS.with(Cell::get) - before, result)
}

#[test]
fn slice_bundle_performs_exactly_two_allocations() {
    let (count, (bytes, words, quads)) =
        allocations_during(|| bundle((slice::<u8>(100), slice::<u32>(7), slice::<u64>(3))));
    assert_eq!(count, 2, "control block + one payload buffer");
    assert_eq!(bytes.len(), 100);
    assert_eq!(words.len(), 7);
    assert_eq!(quads.len(), 3);
}

#[test]
fn single_slice_bundle_performs_exactly_two_allocations() {
    let (count, (view,)) = allocations_during(|| bundle((slice::<u16>(9),)));
    assert_eq!(count, 2);
    assert_eq!(view.len(), 9);
}

#[test]
fn value_only_bundle_performs_exactly_one_allocation() {
    let (count, (a, b)) = allocations_during(|| bundle((value_of(1u32), value_of(2i64))));
    assert_eq!(count, 1, "no payload buffer for value members");
    assert_eq!(*a, 1);
    assert_eq!(*b, 2);
}

#[test]
fn zero_extent_bundle_performs_exactly_one_allocation() {
    let (count, (view, n)) =
        allocations_during(|| bundle((slice::<u64>(0), value::<u8>())));
    assert_eq!(count, 1, "a zero-extent payload is never allocated");
    assert!(view.is_empty());
    assert_eq!(*n, 0);
}

#[test]
fn handle_clones_and_subviews_do_not_allocate() {
    let (xs,) = bundle((slice::<u16>(9),));
    let (count, views) = allocations_during(|| (xs.clone(), xs.slice(1..4)));
    assert_eq!(count, 0);
    assert_eq!(views.0.len(), 9);
    assert_eq!(views.1.len(), 3);
}
