/*!
Process-unique [`Storage`](crate::Storage) identity
*/

use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

/// Next id to hand out. Zero is reserved for [`StorageId::NONE`].
static NEXT_ID: AtomicU32 = AtomicU32::new(1);

type RawStorageId = u32;

/// Identifier of the [`Storage`](crate::Storage) a pointer was minted by.
///
/// Every storage gets a fresh, non-zero id on construction, so pointers from two storages of the
/// same item type never alias even when their slots and generations coincide.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StorageId {
    raw: RawStorageId,
}

impl StorageId {
    /// Id carried by none pointers. No storage ever has it.
    pub const NONE: Self = Self { raw: 0 };

    /// Takes the next id from the process-wide counter.
    pub(crate) fn next() -> Self {
        let raw = NEXT_ID
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |raw| raw.checked_add(1))
            .unwrap_or_else(|_| panic!("storage id overflow"));
        debug_assert_ne!(raw, 0);
        Self { raw }
    }

    pub fn raw(&self) -> RawStorageId {
        self.raw
    }

    pub fn is_none(&self) -> bool {
        self.raw == 0
    }
}

impl Default for StorageId {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}
