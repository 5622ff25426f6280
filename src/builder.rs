use std::{any::type_name, fmt, marker::PhantomData};

use crate::{AllocError, DefaultGen, Gen, Slot, Storage};

/// Builder for creating an instance of [`Storage`].
///
/// You only need it to pre-size a storage with fallible allocation. [`Storage::new`] and
/// [`Storage::with_capacity`] are enough otherwise.
///
/// # Examples
///
/// ```
/// use slot_storage::Storage;
///
/// let storage = Storage::<u32>::builder()
///     .capacity(64)
///     .pending_capacity(16)
///     .build()?;
/// assert!(storage.capacity() >= 64);
/// # Ok::<(), slot_storage::AllocError>(())
/// ```
#[must_use]
pub struct StorageBuilder<T, G: Gen = DefaultGen> {
    capacity: usize,
    pending_capacity: usize,

    _item: PhantomData<fn() -> T>,
    _gen: PhantomData<G>,
}

impl<T, G: Gen> fmt::Debug for StorageBuilder<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("gen_type", &format_args!("{}", type_name::<G>()))
            .field("capacity", &self.capacity)
            .field("pending_capacity", &self.pending_capacity)
            .finish()
    }
}

impl<T, G: Gen> StorageBuilder<T, G> {
    pub(crate) fn new() -> Self {
        Self {
            capacity: 0,
            pending_capacity: 0,
            _item: PhantomData,
            _gen: PhantomData,
        }
    }

    /// Number of slots to allocate up front.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Number of queued releases to allocate up front. The queue grows on its own as pointers
    /// are minted; this only saves reallocations.
    pub fn pending_capacity(mut self, pending_capacity: usize) -> Self {
        self.pending_capacity = pending_capacity;
        self
    }

    /// Builds the storage, allocating the requested capacities.
    pub fn build(self) -> Result<Storage<T, G>, AllocError> {
        if self.capacity > Slot::MAX_SLOTS {
            return Err(AllocError::TooManySlots {
                max: Slot::MAX_SLOTS,
            });
        }

        let mut entries = Vec::new();
        entries.try_reserve_exact(self.capacity)?;
        let mut free = Vec::new();
        free.try_reserve_exact(self.capacity)?;
        let mut pending = Vec::new();
        pending.try_reserve_exact(self.pending_capacity)?;

        Ok(Storage::from_parts(entries, free, pending))
    }
}
