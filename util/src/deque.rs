use std::fmt;

use crate::{
    Error,
    Result,
};

/// Fixed-capacity ring buffer. Pushing onto a full deque is rejected and leaves the contents
/// untouched.
pub struct Deque<T> {
    slots: Box<[Option<T>]>,
    head:  usize,
    size:  usize,
}

impl<T> Deque<T> {
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "deque capacity must be nonzero");

        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head:  0,
            size:  0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    #[inline]
    fn slot(&self, pos: usize) -> usize {
        (self.head + pos) % self.capacity()
    }

    pub fn push_back(&mut self, item: T) -> Result<()> {
        if self.is_full() {
            return Err(Error::Full);
        }

        let idx = self.slot(self.size);
        self.slots[idx] = Some(item);
        self.size += 1;

        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let item = self.slots[self.head].take();
        self.head = self.slot(1);
        self.size -= 1;

        item
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let idx = self.slot(self.size - 1);
        self.size -= 1;

        self.slots[idx].take()
    }

    #[inline]
    pub fn at(&self, pos: usize) -> Option<&T> {
        if pos >= self.size {
            return None;
        }

        self.slots[self.slot(pos)].as_ref()
    }

    #[inline]
    pub fn at_mut(&mut self, pos: usize) -> Option<&mut T> {
        if pos >= self.size {
            return None;
        }

        let idx = self.slot(pos);
        self.slots[idx].as_mut()
    }

    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.at(0)
    }

    #[inline]
    pub fn back(&self) -> Option<&T> {
        self.size.checked_sub(1).and_then(|pos| self.at(pos))
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.size = 0;
    }

    /// Keep only the items for which `f` returns true, preserving order.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        let capacity = self.capacity();
        let mut kept = 0;

        for pos in 0..self.size {
            let from = (self.head + pos) % capacity;

            let item = match self.slots[from].take() {
                Some(item) => item,
                None => continue,
            };

            if f(&item) {
                let to = (self.head + kept) % capacity;
                self.slots[to] = Some(item);
                kept += 1;
            }
        }

        self.size = kept;
    }

    /// Remove and return the item at `pos`, shifting later items forward.
    pub fn remove(&mut self, pos: usize) -> Option<T> {
        if pos >= self.size {
            return None;
        }

        let idx = self.slot(pos);
        let item = self.slots[idx].take();

        for p in pos..self.size - 1 {
            let (to, from) = (self.slot(p), self.slot(p + 1));
            self.slots[to] = self.slots[from].take();
        }

        self.size -= 1;
        item
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.size).filter_map(move |pos| self.at(pos))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        let (head, size) = (self.head, self.size);

        let (wrapped, tail) = self.slots.split_at_mut(head);
        let first = tail.len().min(size);

        tail[..first]
            .iter_mut()
            .chain(wrapped[..size - first].iter_mut())
            .filter_map(Option::as_mut)
    }
}

impl<T> fmt::Debug for Deque<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
