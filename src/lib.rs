//! Reference-counted generational [`Storage`] with strong [`Ptr`] and weak [`WeakPtr`].
//!
//! Items live in a contiguous vector of slots. A pointer is a `(slot, generation, storage id)`
//! triple, validated by the storage on every access, so stale pointers are detected instead of
//! reading a reused slot.
//!
//! Giving back a strong claim ([`Storage::free`], [`Storage::downgrade`]) only queues a
//! decrement. Counts are settled and empty slots recycled in one batch by [`Storage::sync`],
//! which the caller runs at a point of their choosing.
//!
//! See [`example`] for a walkthrough.
//!
//! # Similar crates
//! * [generational_arena](https://docs.rs/generational_arena/latest)
//! * [slotmap](https://docs.rs/slotmap/latest)
//! * [toy_arena](https://docs.rs/toy_arena/latest)

pub mod builder;
pub mod error;
pub mod example;
pub mod id;
pub mod iter;
pub mod ptr;

#[cfg(test)]
mod test;

use std::{
    any::type_name,
    fmt::{self, Debug},
    hash::Hash,
    ops,
};

use derivative::Derivative;
use tracing::{debug, trace};

pub use crate::{
    builder::StorageBuilder,
    error::AllocError,
    id::StorageId,
    ptr::{Handle, Ptr, WeakPtr},
};

use crate::iter::*;

/// Default generation type used by storage.
pub type DefaultGen = u32;

/// Generational storage of reference-counted items.
///
/// # Protocol
/// * [`insert`](Self::insert), [`clone_ptr`](Self::clone_ptr) and [`upgrade`](Self::upgrade)
///   mint a strong claim and count it immediately.
/// * [`free`](Self::free) and [`downgrade`](Self::downgrade) give a claim back. The decrement is
///   queued, the slot stays alive.
/// * [`sync`](Self::sync) applies the queued decrements. Slots whose count reaches zero drop
///   their item, bump their generation and become free for reuse.
///
/// Calling `free`, `clone_ptr`, `downgrade`, `get` or `get_mut` with a pointer that does not
/// [`exist`](Self::exists) in this storage is a bug and panics.
#[derive(Derivative)]
#[derivative(Debug(bound = "T: Debug"))]
pub struct Storage<T, G: Gen = DefaultGen> {
    id: StorageId,
    entries: Vec<Entry<T, G>>,
    /// Slots with zero strong count. Capacity is kept at least `entries.capacity()`
    free: Vec<Slot>,
    /// Queued decrements. Capacity is kept at least `pending.len() + n_claims`
    pending: Vec<Slot>,
    /// Number of slots with non-zero strong count
    n_live: usize,
    /// Number of strong claims minted and not yet given back
    n_claims: usize,
}

#[derive(Derivative)]
#[derivative(Debug(bound = "T: Debug"))]
pub(crate) struct Entry<T, G: Gen = DefaultGen> {
    pub(crate) gen: G,
    pub(crate) strong: usize,
    pub(crate) data: Option<T>,
}

impl<T, G: Gen> Entry<T, G> {
    fn vacant() -> Self {
        Self {
            gen: G::INITIAL,
            strong: 0,
            data: None,
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.strong > 0
    }
}

type RawSlot = u32;

/// Raw index of the backing `Vec` in [`Storage`].
#[derive(Copy, Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Slot {
    raw: RawSlot,
}

impl From<Slot> for usize {
    fn from(slot: Slot) -> usize {
        slot.to_usize()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

impl Slot {
    pub const ZERO: Self = Self { raw: 0 };

    /// Maximum number of slots a storage can address.
    pub const MAX_SLOTS: usize = RawSlot::MAX as usize;

    /// Creates slot from raw value.
    pub fn from_raw(raw: RawSlot) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> RawSlot {
        self.raw
    }

    pub const fn to_usize(&self) -> usize {
        self.raw as usize
    }

    /// NOTE: Callers check against [`Slot::MAX_SLOTS`] first.
    pub(crate) fn from_usize(i: usize) -> Self {
        debug_assert!(i < Self::MAX_SLOTS, "slot overflow");
        Self { raw: i as RawSlot }
    }
}

/// Generation type: one of `u16`, `u32` or `u64`.
///
/// Every slot starts at [`Gen::INITIAL`] and is bumped by one each time it's recycled. A slot
/// whose generation can't be bumped any more is retired instead of repeating one.
pub trait Gen: Debug + Clone + Copy + PartialEq + Eq + Hash + 'static {
    const INITIAL: Self;
    /// Next generation, or `None` if exhausted.
    fn checked_next(self) -> Option<Self>;
}

macro_rules! impl_generations {
    ($raw:ident) => {
        impl Gen for $raw {
            const INITIAL: Self = 0;
            fn checked_next(self) -> Option<Self> {
                self.checked_add(1)
            }
        }
    };

    ($($raw:ident),+) => {
        $(
            impl_generations!($raw);
        )*
    };
}

impl_generations!(u16, u32, u64);

impl<T, G: Gen> Default for Storage<T, G> {
    fn default() -> Self {
        Self::from_parts(Vec::new(), Vec::new(), Vec::new())
    }
}

impl<T, G: Gen> Storage<T, G> {
    /// Creates an empty storage without allocating.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty storage with room for `cap` slots.
    ///
    /// # Panics
    /// Panics if `cap` exceeds [`Slot::MAX_SLOTS`]. Use [`Storage::builder`] for a pre-size that
    /// reports errors instead.
    pub fn with_capacity(cap: usize) -> Self {
        assert!(
            cap <= Slot::MAX_SLOTS,
            "storage capacity {} exceeds {} slots",
            cap,
            Slot::MAX_SLOTS
        );
        Self::from_parts(
            Vec::with_capacity(cap),
            Vec::with_capacity(cap),
            Vec::new(),
        )
    }

    /// Configures a storage with [`StorageBuilder`].
    pub fn builder() -> StorageBuilder<T, G> {
        StorageBuilder::new()
    }

    pub(crate) fn from_parts(
        entries: Vec<Entry<T, G>>,
        free: Vec<Slot>,
        pending: Vec<Slot>,
    ) -> Self {
        let id = StorageId::next();
        debug!(
            storage = %id,
            item = type_name::<T>(),
            capacity = entries.capacity(),
            "created storage"
        );

        Self {
            id,
            entries,
            free,
            pending,
            n_live: 0,
            n_claims: 0,
        }
    }

    pub fn id(&self) -> StorageId {
        self.id
    }

    /// Number of live items (slots with non-zero strong count), pending ones included.
    pub fn len(&self) -> usize {
        self.n_live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots ever created, live or free.
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }

    /// Capacity of the backing vec.
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Number of decrements waiting for [`sync`](Self::sync).
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// # ----- Mutations -----
impl<T, G: Gen> Storage<T, G> {
    /// Stores `data` and returns the first strong pointer to it.
    ///
    /// A free slot is reused when there is one (keeping the generation it got on recycling),
    /// otherwise a new slot is appended at generation zero.
    pub fn insert(&mut self, data: T) -> Result<Ptr<T, G>, AllocError> {
        if self.free.is_empty() {
            self.reserve_entry()?;
        }
        self.reserve_claim()?;

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                let slot = Slot::from_usize(self.entries.len());
                self.entries.push(Entry::vacant());
                slot
            }
        };

        let entry = &mut self.entries[slot.to_usize()];
        debug_assert!(
            entry.data.is_none() && !entry.is_live(),
            "bug: free slot occupied?"
        );
        entry.data = Some(data);
        entry.strong = 1;

        self.n_live += 1;
        self.n_claims += 1;

        Ok(Ptr::new(slot, entry.gen, self.id))
    }

    /// Gives back the claim of `ptr`. The decrement is applied on the next [`sync`](Self::sync).
    ///
    /// # Panics
    /// Panics if `ptr` doesn't exist in this storage.
    pub fn free(&mut self, ptr: Ptr<T, G>) {
        assert!(
            self.exists(&ptr),
            "freed pointer does not exist in storage {}: {:?}",
            self.id,
            ptr
        );
        self.release(ptr.slot());
    }

    /// Mints another strong claim on the item of `ptr`. The count is increased immediately, so
    /// the item outlives a `free` of `ptr` queued before this call.
    ///
    /// # Panics
    /// Panics if `ptr` doesn't exist in this storage.
    pub fn clone_ptr(&mut self, ptr: &Ptr<T, G>) -> Result<Ptr<T, G>, AllocError> {
        assert!(
            self.exists(ptr),
            "cloned pointer does not exist in storage {}: {:?}",
            self.id,
            ptr
        );
        self.acquire(ptr.slot())
    }

    /// Trades the claim of `ptr` for a [`WeakPtr`]. Same as [`free`](Self::free) on `ptr`, but
    /// the slot can still be reached through the returned pointer until it's recycled.
    ///
    /// # Panics
    /// Panics if `ptr` doesn't exist in this storage.
    pub fn downgrade(&mut self, ptr: Ptr<T, G>) -> WeakPtr<T, G> {
        let weak = ptr.weak();
        self.free(ptr);
        weak
    }

    /// Mints a strong claim from a weak pointer. Returns `Ok(None)` if the slot was recycled, or
    /// if `weak` belongs to another storage or is none.
    pub fn upgrade(&mut self, weak: WeakPtr<T, G>) -> Result<Option<Ptr<T, G>>, AllocError> {
        if !self.exists(&weak) {
            return Ok(None);
        }
        self.acquire(weak.slot()).map(Some)
    }

    /// Applies every queued decrement and recycles the slots whose count reaches zero: their
    /// item is dropped, their generation bumped, and they are put on the free list. A slot whose
    /// generation is exhausted is retired instead: it stays empty and is never reused.
    ///
    /// Returns the number of recycled slots.
    ///
    /// # Panics
    /// Panics if a decrement would take a count below zero.
    pub fn sync(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let n_drained = self.pending.len();
        let mut n_recycled = 0;

        for slot in self.pending.drain(..) {
            let entry = &mut self.entries[slot.to_usize()];
            entry.strong = entry
                .strong
                .checked_sub(1)
                .unwrap_or_else(|| panic!("strong count underflow at slot {}", slot));

            if entry.strong == 0 {
                entry.data = None;
                n_recycled += 1;
                match entry.gen.checked_next() {
                    Some(gen) => {
                        entry.gen = gen;
                        // never reallocates: capacity tracks `entries`
                        self.free.push(slot);
                    }
                    None => {
                        // generations exhausted: the slot is never handed out again
                        debug!(storage = %self.id, slot = %slot, "retired slot");
                    }
                }
            }
        }

        self.n_live -= n_recycled;

        trace!(
            storage = %self.id,
            drained = n_drained,
            recycled = n_recycled,
            live = self.n_live,
            "synced storage"
        );

        n_recycled
    }

    fn acquire(&mut self, slot: Slot) -> Result<Ptr<T, G>, AllocError> {
        self.reserve_claim()?;

        let entry = &mut self.entries[slot.to_usize()];
        debug_assert!(entry.is_live(), "bug: existing pointer to a dead slot");
        entry.strong = entry
            .strong
            .checked_add(1)
            .unwrap_or_else(|| panic!("strong count overflow at slot {}", slot));
        self.n_claims += 1;

        Ok(Ptr::new(slot, entry.gen, self.id))
    }

    fn release(&mut self, slot: Slot) {
        debug_assert!(self.n_claims > 0, "bug: released more claims than minted");
        debug_assert!(
            self.pending.len() < self.pending.capacity(),
            "bug: pending queue not reserved"
        );
        self.n_claims -= 1;
        self.pending.push(slot);
    }

    /// Makes sure the claim about to be minted can be queued later without allocating.
    fn reserve_claim(&mut self) -> Result<(), AllocError> {
        self.pending.try_reserve(self.n_claims.saturating_add(1))?;
        Ok(())
    }

    /// Makes room for one more slot in `entries` and in the free list.
    fn reserve_entry(&mut self) -> Result<(), AllocError> {
        let len = self.entries.len();
        if len >= Slot::MAX_SLOTS {
            return Err(AllocError::TooManySlots {
                max: Slot::MAX_SLOTS,
            });
        }

        if len == self.entries.capacity() {
            self.entries.try_reserve(1)?;
            debug!(
                storage = %self.id,
                capacity = self.entries.capacity(),
                "grew storage"
            );
        }

        let cap = self.entries.capacity();
        if self.free.capacity() < cap {
            self.free.try_reserve_exact(cap - self.free.len())?;
        }

        Ok(())
    }
}

/// # ----- Accessors -----
impl<T, G: Gen> Storage<T, G> {
    /// Returns true if `handle` was minted by this storage and its slot has not been recycled
    /// (or retired) since. Never panics, whatever the handle.
    pub fn exists<H: Handle<T, G>>(&self, handle: &H) -> bool {
        handle.storage_id() == self.id
            && self
                .entries
                .get(handle.slot().to_usize())
                .map_or(false, |entry| entry.is_live() && entry.gen == handle.gen())
    }

    /// Strong count of the slot `handle` points to. Zero if it doesn't exist. Queued decrements
    /// are not reflected until [`sync`](Self::sync).
    pub fn strong_count<H: Handle<T, G>>(&self, handle: &H) -> usize {
        if self.exists(handle) {
            self.entries[handle.slot().to_usize()].strong
        } else {
            0
        }
    }

    pub fn try_get<H: Handle<T, G>>(&self, handle: &H) -> Option<&T> {
        if !self.exists(handle) {
            return None;
        }
        self.entries.get(handle.slot().to_usize())?.data.as_ref()
    }

    pub fn try_get_mut<H: Handle<T, G>>(&mut self, handle: &H) -> Option<&mut T> {
        if !self.exists(handle) {
            return None;
        }
        self.entries.get_mut(handle.slot().to_usize())?.data.as_mut()
    }

    /// # Panics
    /// Panics if `handle` doesn't exist in this storage.
    pub fn get<H: Handle<T, G>>(&self, handle: &H) -> &T {
        let id = self.id;
        self.try_get(handle).unwrap_or_else(|| {
            panic!(
                "dereferenced pointer (slot {}, gen {:?}) does not exist in storage {}",
                handle.slot(),
                handle.gen(),
                id
            )
        })
    }

    /// # Panics
    /// Panics if `handle` doesn't exist in this storage.
    pub fn get_mut<H: Handle<T, G>>(&mut self, handle: &H) -> &mut T {
        let id = self.id;
        self.try_get_mut(handle).unwrap_or_else(|| {
            panic!(
                "dereferenced pointer (slot {}, gen {:?}) does not exist in storage {}",
                handle.slot(),
                handle.gen(),
                id
            )
        })
    }
}

/// # ----- Iterators -----
impl<T, G: Gen> Storage<T, G> {
    /// `&T` of every live slot, in slot order.
    pub fn iter(&self) -> Iter<T, G> {
        Iter {
            entries: self.entries.iter(),
            n_items: self.n_live,
            n_visited: 0,
        }
    }

    /// `&mut T` of every live slot, in slot order.
    pub fn iter_mut(&mut self) -> IterMut<T, G> {
        IterMut {
            entries: self.entries.iter_mut(),
            n_items: self.n_live,
            n_visited: 0,
        }
    }

    /// `(WeakPtr, &mut T)` of every live slot, in slot order.
    pub fn weak_ptrs_mut(&mut self) -> WeakPtrsMut<T, G> {
        WeakPtrsMut {
            entries: self.entries.iter_mut().enumerate(),
            storage: self.id,
            n_items: self.n_live,
            n_visited: 0,
        }
    }
}

impl<T, G: Gen> ops::Index<&Ptr<T, G>> for Storage<T, G> {
    type Output = T;
    fn index(&self, ptr: &Ptr<T, G>) -> &Self::Output {
        self.get(ptr)
    }
}

impl<T, G: Gen> ops::IndexMut<&Ptr<T, G>> for Storage<T, G> {
    fn index_mut(&mut self, ptr: &Ptr<T, G>) -> &mut Self::Output {
        self.get_mut(ptr)
    }
}

impl<T, G: Gen> ops::Index<WeakPtr<T, G>> for Storage<T, G> {
    type Output = T;
    fn index(&self, weak: WeakPtr<T, G>) -> &Self::Output {
        self.get(&weak)
    }
}

impl<T, G: Gen> ops::IndexMut<WeakPtr<T, G>> for Storage<T, G> {
    fn index_mut(&mut self, weak: WeakPtr<T, G>) -> &mut Self::Output {
        self.get_mut(&weak)
    }
}

impl<'a, T, G: Gen> IntoIterator for &'a Storage<T, G> {
    type IntoIter = Iter<'a, T, G>;
    type Item = <Self::IntoIter as Iterator>::Item;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, G: Gen> IntoIterator for &'a mut Storage<T, G> {
    type IntoIter = IterMut<'a, T, G>;
    type Item = <Self::IntoIter as Iterator>::Item;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
