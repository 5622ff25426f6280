/*!
Strong and weak pointers into a [`Storage`](crate::Storage)

Both pointer kinds are plain `(slot, generation, storage id)` triples. Neither holds a reference
to the storage; the storage validates them on every access.
*/

use std::marker::PhantomData;

use derivative::Derivative;

use crate::{DefaultGen, Gen, Slot, StorageId};

/// Read access to the coordinates of a pointer. Implemented by [`Ptr`], [`WeakPtr`] and references
/// to them, so that [`Storage::exists`](crate::Storage::exists) and friends accept either kind.
pub trait Handle<T, G: Gen = DefaultGen> {
    fn slot(&self) -> Slot;
    fn gen(&self) -> G;
    fn storage_id(&self) -> StorageId;
}

impl<T, G: Gen, H: Handle<T, G> + ?Sized> Handle<T, G> for &H {
    fn slot(&self) -> Slot {
        (**self).slot()
    }

    fn gen(&self) -> G {
        (**self).gen()
    }

    fn storage_id(&self) -> StorageId {
        (**self).storage_id()
    }
}

/// Strong (counted, owning) pointer to an item in a [`Storage`](crate::Storage).
///
/// A `Ptr` is one unit of the slot's strong count. It is neither `Copy` nor `Clone`: a second
/// claim is made with [`Storage::clone_ptr`](crate::Storage::clone_ptr), and every claim is
/// given back exactly once with [`Storage::free`](crate::Storage::free) or
/// [`Storage::downgrade`](crate::Storage::downgrade), both of which consume the pointer.
///
/// Dropping a `Ptr` without giving it back leaks the claim: the slot stays alive until the
/// storage itself is dropped.
///
/// # Memory use
/// ```
/// use std::mem;
/// use slot_storage::Ptr;
/// assert_eq!(mem::size_of::<Ptr<()>>(), 3 * mem::size_of::<u32>());
/// ```
#[must_use = "a strong pointer must be given back with `Storage::free` or `Storage::downgrade`"]
#[derive(Derivative)]
#[derivative(
    Debug(bound = ""),
    PartialEq(bound = ""),
    Eq(bound = ""),
    Hash(bound = "")
)]
pub struct Ptr<T, G: Gen = DefaultGen> {
    slot: Slot,
    gen: G,
    storage: StorageId,
    _t: PhantomData<fn() -> T>,
}

impl<T, G: Gen> Ptr<T, G> {
    pub(crate) fn new(slot: Slot, gen: G, storage: StorageId) -> Self {
        Self {
            slot,
            gen,
            storage,
            _t: PhantomData,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn gen(&self) -> G {
        self.gen
    }

    pub fn storage_id(&self) -> StorageId {
        self.storage
    }

    /// Weak view of the same slot. The strong claim is kept; use
    /// [`Storage::downgrade`](crate::Storage::downgrade) to give it up in exchange.
    pub fn weak(&self) -> WeakPtr<T, G> {
        WeakPtr::new(self.slot, self.gen, self.storage)
    }
}

impl<T, G: Gen> Handle<T, G> for Ptr<T, G> {
    fn slot(&self) -> Slot {
        self.slot
    }

    fn gen(&self) -> G {
        self.gen
    }

    fn storage_id(&self) -> StorageId {
        self.storage
    }
}

/// Weak (uncounted) pointer to an item in a [`Storage`](crate::Storage).
///
/// It doesn't keep the slot alive. Check it with [`Storage::exists`](crate::Storage::exists) or
/// turn it back into a [`Ptr`] with [`Storage::upgrade`](crate::Storage::upgrade).
///
/// [`WeakPtr::NONE`] (also the [`Default`]) points to nothing and never exists in any storage.
#[derive(Derivative)]
#[derivative(
    Copy(bound = ""),
    Clone(bound = ""),
    Debug(bound = ""),
    PartialEq(bound = ""),
    Eq(bound = ""),
    Hash(bound = "")
)]
pub struct WeakPtr<T, G: Gen = DefaultGen> {
    slot: Slot,
    gen: G,
    storage: StorageId,
    _t: PhantomData<fn() -> T>,
}

impl<T, G: Gen> WeakPtr<T, G> {
    /// The none pointer.
    pub const NONE: Self = Self {
        slot: Slot::ZERO,
        gen: G::INITIAL,
        storage: StorageId::NONE,
        _t: PhantomData,
    };

    pub(crate) fn new(slot: Slot, gen: G, storage: StorageId) -> Self {
        Self {
            slot,
            gen,
            storage,
            _t: PhantomData,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn gen(&self) -> G {
        self.gen
    }

    pub fn storage_id(&self) -> StorageId {
        self.storage
    }

    pub fn is_none(&self) -> bool {
        self.storage.is_none()
    }
}

impl<T, G: Gen> Default for WeakPtr<T, G> {
    fn default() -> Self {
        Self::NONE
    }
}

impl<T, G: Gen> Handle<T, G> for WeakPtr<T, G> {
    fn slot(&self) -> Slot {
        self.slot
    }

    fn gen(&self) -> G {
        self.gen
    }

    fn storage_id(&self) -> StorageId {
        self.storage
    }
}
