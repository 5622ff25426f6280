/*!
Try `cargo miri test` if anything here starts to look suspicious
*/

use super::*;
use std::{cell::Cell, fmt::Debug, hash::Hash, mem, rc::Rc};

use static_assertions::{assert_impl_all, assert_not_impl_any};

assert_impl_all!(WeakPtr<String>: Copy, Clone, Eq, Hash, Debug, Default);
assert_not_impl_any!(Ptr<String>: Copy, Clone);

#[test]
fn size() {
    // slot + generation + storage id
    assert_eq!(mem::size_of::<Ptr<()>>(), mem::size_of::<u32>() * 3);
    assert_eq!(mem::size_of::<WeakPtr<()>>(), mem::size_of::<Ptr<()>>());
    assert_eq!(mem::size_of::<WeakPtr<(), u16>>(), 12);
    assert_eq!(mem::size_of::<WeakPtr<(), u64>>(), 16);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct Vec2 {
    x: i32,
    y: i32,
}

#[test]
fn insert_get_free_sync() {
    let mut storage = Storage::<Vec2>::with_capacity(2);
    assert_eq!(storage.len(), 0);
    assert_eq!(storage.capacity(), 2);

    let p0 = storage.insert(Vec2 { x: 0, y: 1 }).unwrap();
    assert_eq!(p0.slot(), Slot::from_raw(0));
    assert_eq!(p0.gen(), 0);
    assert_eq!(p0.storage_id(), storage.id());
    assert!(storage.exists(&p0));
    assert_eq!(storage.len(), 1);

    let p1 = storage.insert(Vec2 { x: 2, y: 3 }).unwrap();
    assert_eq!(p1.slot(), Slot::from_raw(1));
    assert_eq!(storage.get(&p1), &Vec2 { x: 2, y: 3 });

    storage.get_mut(&p0).x = 10;
    assert_eq!(storage[&p0], Vec2 { x: 10, y: 1 });

    let w0 = p0.weak();
    storage.free(p0);
    // deferred: still there
    assert!(storage.exists(&w0));
    assert_eq!(storage.len(), 2);
    assert_eq!(storage.pending_len(), 1);
    assert_eq!(storage.strong_count(&w0), 1);

    assert_eq!(storage.sync(), 1);
    assert!(!storage.exists(&w0));
    assert_eq!(storage.try_get(&w0), None);
    assert_eq!(storage.strong_count(&w0), 0);
    assert_eq!(storage.len(), 1);
    assert_eq!(storage.pending_len(), 0);

    // the recycled slot is reused with the bumped generation
    let p2 = storage.insert(Vec2 { x: 4, y: 5 }).unwrap();
    assert_eq!(p2.slot(), Slot::from_raw(0));
    assert_eq!(p2.gen(), 1);
    assert!(!storage.exists(&w0));
    assert_eq!(storage.slot_count(), 2);

    storage.free(p1);
    storage.free(p2);
    assert_eq!(storage.sync(), 2);
    assert!(storage.is_empty());
}

#[test]
fn grow() {
    let mut storage = Storage::<usize>::with_capacity(1);
    let ptrs = (0..5)
        .map(|i| storage.insert(i).unwrap())
        .collect::<Vec<_>>();
    assert!(storage.capacity() >= 5);
    assert_eq!(storage.slot_count(), 5);

    for (i, ptr) in ptrs.iter().enumerate() {
        assert_eq!(ptr.slot().to_usize(), i);
        assert_eq!(storage[ptr], i);
    }

    for ptr in ptrs {
        storage.free(ptr);
    }
    storage.sync();
}

#[test]
fn clone_survives_free() {
    let mut storage = Storage::<Vec2>::new();
    let p1 = storage.insert(Vec2 { x: 5, y: 7 }).unwrap();
    let p2 = storage.clone_ptr(&p1).unwrap();
    assert_eq!(p1, p2);
    assert_eq!(storage.strong_count(&p1), 2);

    let slot = p1.slot();
    let gen = p1.gen();
    storage.free(p1);
    assert_eq!(storage.sync(), 0);

    assert!(storage.exists(&p2));
    assert_eq!(storage.get(&p2), &Vec2 { x: 5, y: 7 });
    assert_eq!(storage.strong_count(&p2), 1);

    storage.free(p2);
    assert_eq!(storage.sync(), 1);

    let p3 = storage.insert(Vec2::default()).unwrap();
    assert_eq!(p3.slot(), slot);
    assert_eq!(p3.gen(), gen + 1);
    storage.free(p3);
    storage.sync();
}

#[test]
fn clone_after_queued_free() {
    let mut storage = Storage::<u8>::new();
    let p1 = storage.insert(1).unwrap();
    let w = p1.weak();

    storage.free(p1);
    // the claim is gone but the slot is still live until sync
    let p2 = storage.upgrade(w).unwrap().unwrap();
    assert_eq!(storage.strong_count(&p2), 2);

    assert_eq!(storage.sync(), 0);
    assert!(storage.exists(&p2));
    assert_eq!(storage.strong_count(&p2), 1);

    storage.free(p2);
    storage.sync();
}

#[test]
fn downgrade_upgrade() {
    let mut storage = Storage::<&'static str>::new();
    let p = storage.insert("a").unwrap();
    let w = storage.downgrade(p);
    assert_eq!(storage.pending_len(), 1);

    // before sync, the weak pointer can be upgraded
    let p = storage.upgrade(w).unwrap().unwrap();
    assert_eq!(storage[&p], "a");
    assert_eq!(p.weak(), w);

    // settles the first downgrade only
    storage.sync();
    assert_eq!(storage.strong_count(&p), 1);

    let w = storage.downgrade(p);
    assert_eq!(storage.sync(), 1);
    assert_eq!(storage.strong_count(&w), 0);
    assert!(storage.upgrade(w).unwrap().is_none());
    assert!(storage.is_empty());
}

#[test]
fn none_pointer() {
    let mut storage = Storage::<u8>::new();
    let p = storage.insert(0).unwrap();

    let none = WeakPtr::<u8>::NONE;
    assert!(none.is_none());
    assert_eq!(none, WeakPtr::default());
    assert_eq!(none.slot(), p.slot());
    assert_eq!(none.gen(), p.gen());
    assert!(!storage.exists(&none));
    assert!(storage.upgrade(none).unwrap().is_none());

    storage.free(p);
    storage.sync();
}

#[test]
fn cross_storage_pointers_are_rejected() {
    let mut a = Storage::<u32>::new();
    let mut b = Storage::<u32>::new();
    assert_ne!(a.id(), b.id());

    let pa = a.insert(1).unwrap();
    let pb = b.insert(2).unwrap();
    // same coordinates, different storages
    assert_eq!(pa.slot(), pb.slot());
    assert_eq!(pa.gen(), pb.gen());

    assert!(!a.exists(&pb));
    assert!(!b.exists(&pa));
    assert_eq!(a.try_get(&pb), None);
    assert!(a.upgrade(pb.weak()).unwrap().is_none());

    a.free(pa);
    b.free(pb);
    a.sync();
    b.sync();
}

#[test]
fn out_of_range_does_not_panic() {
    let mut storage = Storage::<u32>::new();
    let p = storage.insert(1).unwrap();
    let far = WeakPtr::<u32>::new(Slot::from_raw(1000), 0, storage.id());
    assert!(!storage.exists(&far));
    assert_eq!(storage.try_get_mut(&far), None);
    assert_eq!(storage.strong_count(&far), 0);
    storage.free(p);
    storage.sync();
}

#[test]
fn sync_on_empty_queue() {
    let mut storage = Storage::<u32>::new();
    assert_eq!(storage.sync(), 0);

    let p = storage.insert(1).unwrap();
    assert_eq!(storage.sync(), 0);
    assert_eq!(storage.sync(), 0);
    assert!(storage.exists(&p));

    storage.free(p);
    assert_eq!(storage.sync(), 1);
    assert_eq!(storage.sync(), 0);
}

#[test]
fn sync_drains_every_entry() {
    let mut storage = Storage::<u32>::new();
    let p = storage.insert(1).unwrap();
    let clones = (0..4)
        .map(|_| storage.clone_ptr(&p).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(storage.strong_count(&p), 5);

    for c in clones {
        storage.free(c);
    }
    assert_eq!(storage.pending_len(), 4);
    assert_eq!(storage.sync(), 0);
    assert_eq!(storage.pending_len(), 0);
    assert_eq!(storage.strong_count(&p), 1);

    storage.free(p);
    assert_eq!(storage.sync(), 1);
}

#[test]
fn items_are_dropped_on_sync() {
    struct Probe(Rc<Cell<usize>>);
    impl Drop for Probe {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    let drops = Rc::new(Cell::new(0));
    let mut storage = Storage::<Probe>::new();
    let p = storage.insert(Probe(drops.clone())).unwrap();

    storage.free(p);
    assert_eq!(drops.get(), 0);
    storage.sync();
    assert_eq!(drops.get(), 1);

    let _leaked = storage.insert(Probe(drops.clone())).unwrap();
    drop(storage);
    assert_eq!(drops.get(), 2);
}

#[test]
fn iter_skips_dead_slots() {
    let mut storage = Storage::<usize>::new();
    let mut ptrs = (0..10)
        .map(|i| storage.insert(i).unwrap())
        .collect::<Vec<_>>();

    // free the even ones
    let mut kept = Vec::new();
    for (i, p) in ptrs.drain(..).enumerate() {
        if i % 2 == 0 {
            storage.free(p);
        } else {
            kept.push(p);
        }
    }

    // pending slots are still live
    assert_eq!(storage.iter().len(), 10);
    storage.sync();

    let iter = storage.iter();
    assert_eq!(iter.size_hint(), (5, Some(5)));
    assert_eq!(iter.copied().collect::<Vec<_>>(), vec![1, 3, 5, 7, 9]);

    for x in storage.iter_mut() {
        *x *= 10;
    }
    assert_eq!(
        (&storage).into_iter().copied().collect::<Vec<_>>(),
        vec![10, 30, 50, 70, 90]
    );

    for (weak, x) in storage.weak_ptrs_mut() {
        *x += weak.slot().to_usize();
    }
    for p in &kept {
        let i = p.slot().to_usize();
        assert_eq!(storage[p], i * 10 + i);
    }

    for p in kept {
        storage.free(p);
    }
    storage.sync();
    assert_eq!(storage.iter().next(), None);
}

#[test]
fn weak_ptrs_upgrade() {
    let mut storage = Storage::<u8>::new();
    let a = storage.insert(1).unwrap();
    let b = storage.insert(2).unwrap();

    let weaks = storage.weak_ptrs_mut().map(|(w, _)| w).collect::<Vec<_>>();
    assert_eq!(weaks, vec![a.weak(), b.weak()]);

    storage.free(a);
    storage.free(b);
    storage.sync();
    for w in weaks {
        assert!(storage.upgrade(w).unwrap().is_none());
    }
}

#[test]
fn generations_never_repeat() {
    let mut storage = Storage::<u8, u16>::new();
    let first = storage.insert(0).unwrap();
    let mut seen = vec![first.weak()];
    storage.free(first);
    storage.sync();

    for _ in 0..100 {
        let p = storage.insert(0).unwrap();
        assert_eq!(p.slot(), Slot::ZERO);
        assert!(seen.iter().all(|w| !storage.exists(w)));
        seen.push(p.weak());
        storage.free(p);
        storage.sync();
    }

    assert_eq!(seen.last().map(|w| w.gen()), Some(100));
}

#[test]
fn exhausted_slot_is_retired() {
    let mut storage = Storage::<u8, u16>::new();
    let mut last = WeakPtr::NONE;

    // generations 0..=u16::MAX on slot 0
    for i in 0..=u16::MAX as usize {
        let p = storage.insert(0).unwrap();
        assert_eq!(p.slot(), Slot::ZERO);
        assert_eq!(p.gen() as usize, i);
        last = p.weak();
        storage.free(p);
        assert_eq!(storage.sync(), 1);
    }

    assert_eq!(last.gen(), u16::MAX);
    assert!(!storage.exists(&last));
    assert!(storage.upgrade(last).unwrap().is_none());
    assert!(storage.is_empty());
    assert_eq!(storage.iter().len(), 0);

    // the retired slot is skipped: a new one is appended
    let p = storage.insert(1).unwrap();
    assert_eq!(p.slot(), Slot::from_raw(1));
    assert_eq!(p.gen(), 0);
    assert_eq!(storage.slot_count(), 2);
    assert!(!storage.exists(&last));
    assert_eq!(storage.iter().copied().collect::<Vec<_>>(), vec![1]);

    storage.free(p);
    storage.sync();
}

#[test]
fn checked_next_stops_at_max() {
    assert_eq!(0u16.checked_next(), Some(1));
    assert_eq!((u16::MAX - 1).checked_next(), Some(u16::MAX));
    assert_eq!(u16::MAX.checked_next(), None);
    assert_eq!(u64::MAX.checked_next(), None);
}

#[test]
fn failed_mint_leaves_storage_unchanged() {
    let mut storage = Storage::<u8>::new();
    let p = storage.insert(7).unwrap();
    let w = p.weak();

    let state = |s: &Storage<u8>| {
        (
            s.len(),
            s.slot_count(),
            s.pending_len(),
            s.strong_count(&w),
            s.n_claims,
        )
    };

    // reserving queue room for this many claims can't succeed
    storage.n_claims = usize::MAX / 2;
    let before = state(&storage);

    assert!(matches!(storage.insert(8), Err(AllocError::OutOfMemory(_))));
    assert_eq!(state(&storage), before);

    assert!(matches!(storage.clone_ptr(&p), Err(AllocError::OutOfMemory(_))));
    assert_eq!(state(&storage), before);

    assert!(matches!(storage.upgrade(w), Err(AllocError::OutOfMemory(_))));
    assert_eq!(state(&storage), before);

    assert_eq!(storage[&p], 7);
    assert_eq!(storage.iter().copied().collect::<Vec<_>>(), vec![7]);

    storage.n_claims = 1;
    storage.free(p);
    assert_eq!(storage.sync(), 1);
    assert!(storage.is_empty());
}

#[test]
fn handle_references() {
    let mut storage = Storage::<u8>::new();
    let p = storage.insert(3).unwrap();
    let w = p.weak();

    let by_ref: &Ptr<u8> = &p;
    assert!(storage.exists(&by_ref));
    assert_eq!(*storage.get(&&w), 3);
    assert_eq!(<&Ptr<u8> as Handle<u8>>::slot(&by_ref), p.slot());
    assert_eq!(<&WeakPtr<u8> as Handle<u8>>::storage_id(&&w), storage.id());

    storage.free(p);
    storage.sync();
}

#[test]
#[should_panic(expected = "exceeds")]
fn with_capacity_rejects_oversized() {
    let _ = Storage::<u8>::with_capacity(Slot::MAX_SLOTS + 1);
}

#[test]
#[should_panic(expected = "does not exist")]
fn get_stale_pointer_panics() {
    let mut storage = Storage::<u8>::new();
    let p = storage.insert(0).unwrap();
    let w = storage.downgrade(p);
    storage.sync();
    let _ = storage.get(&w);
}

#[test]
#[should_panic(expected = "does not exist")]
fn free_foreign_pointer_panics() {
    let mut a = Storage::<u8>::new();
    let mut b = Storage::<u8>::new();
    let _pa = a.insert(0).unwrap();
    let pb = b.insert(0).unwrap();
    a.free(pb);
}

#[test]
fn pending_queue_is_reserved_on_mint() {
    let mut storage = Storage::<u8>::new();
    let p = storage.insert(0).unwrap();
    let c = storage.clone_ptr(&p).unwrap();
    let w = p.weak();
    let u = storage.upgrade(w).unwrap().unwrap();

    // three claims: three releases fit without growing
    let cap = storage.pending.capacity();
    assert!(cap >= 3);
    storage.free(p);
    let _w = storage.downgrade(c);
    storage.free(u);
    assert_eq!(storage.pending.capacity(), cap);

    assert_eq!(storage.sync(), 1);
    assert_eq!(storage.n_claims, 0);
}

#[test]
fn debug_output() {
    let mut storage = Storage::<u8>::new();
    let p = storage.insert(42).unwrap();
    let s = format!("{:?}", storage);
    assert!(s.contains("42"));
    assert!(format!("{:?}", p).contains("slot"));
    storage.free(p);
    storage.sync();
}
