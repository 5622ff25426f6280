/*!
`slot_storage` iterator types

Every iterator visits the live slots (strong count above zero) in slot order. Slots whose
decrement is still queued are live until [`Storage::sync`] recycles them. The storage stays
borrowed while iterating, so it can't grow or sync under an iterator.
*/

use std::iter::{Enumerate, FusedIterator};

use crate::{Entry, Gen, Slot, StorageId, WeakPtr};

// for linking types in the docstring:
#[allow(unused)]
use crate::Storage;

/// [`Storage::iter`] → `&T`
pub struct Iter<'a, T, G: Gen> {
    pub(crate) entries: std::slice::Iter<'a, Entry<T, G>>,
    pub(crate) n_items: usize,
    pub(crate) n_visited: usize,
}

impl<'a, T, G: Gen> Iterator for Iter<'a, T, G> {
    type Item = &'a T;
    fn next(&mut self) -> Option<Self::Item> {
        while self.n_visited < self.n_items {
            let entry = self.entries.next()?;
            if !entry.is_live() {
                continue;
            }
            if let Some(data) = &entry.data {
                self.n_visited += 1;
                return Some(data);
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.n_items - self.n_visited;
        (n, Some(n))
    }
}

impl<'a, T, G: Gen> FusedIterator for Iter<'a, T, G> {}
impl<'a, T, G: Gen> ExactSizeIterator for Iter<'a, T, G> {}

/// [`Storage::iter_mut`] → `&mut T`
pub struct IterMut<'a, T, G: Gen> {
    pub(crate) entries: std::slice::IterMut<'a, Entry<T, G>>,
    /// Number of live items in the storage
    pub(crate) n_items: usize,
    /// Number of visited items
    pub(crate) n_visited: usize,
}

impl<'a, T, G: Gen> Iterator for IterMut<'a, T, G> {
    type Item = &'a mut T;
    fn next(&mut self) -> Option<Self::Item> {
        while self.n_visited < self.n_items {
            let entry = self.entries.next()?;
            if !entry.is_live() {
                continue;
            }
            if let Some(data) = &mut entry.data {
                self.n_visited += 1;
                return Some(data);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.n_items - self.n_visited;
        (rest, Some(rest))
    }
}

impl<'a, T, G: Gen> FusedIterator for IterMut<'a, T, G> {}
impl<'a, T, G: Gen> ExactSizeIterator for IterMut<'a, T, G> {}

/// [`Storage::weak_ptrs_mut`] → `(WeakPtr, &mut T)`
pub struct WeakPtrsMut<'a, T, G: Gen> {
    pub(crate) entries: Enumerate<std::slice::IterMut<'a, Entry<T, G>>>,
    pub(crate) storage: StorageId,
    pub(crate) n_items: usize,
    pub(crate) n_visited: usize,
}

impl<'a, T, G: Gen> Iterator for WeakPtrsMut<'a, T, G> {
    type Item = (WeakPtr<T, G>, &'a mut T);
    fn next(&mut self) -> Option<Self::Item> {
        while self.n_visited < self.n_items {
            let (i, entry) = self.entries.next()?;
            if !entry.is_live() {
                continue;
            }
            if let Some(data) = &mut entry.data {
                self.n_visited += 1;
                let weak = WeakPtr::new(Slot::from_usize(i), entry.gen, self.storage);
                return Some((weak, data));
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.n_items - self.n_visited;
        (rest, Some(rest))
    }
}

impl<'a, T, G: Gen> FusedIterator for WeakPtrsMut<'a, T, G> {}
impl<'a, T, G: Gen> ExactSizeIterator for WeakPtrsMut<'a, T, G> {}
