use std::{
    fmt,
    mem,
};

use crate::{
    Error,
    Result,
};

enum Storage<'a, T> {
    Owned(Box<[T]>),
    Borrowed(&'a mut [T]),
}

impl<'a, T> Storage<'a, T> {
    #[inline]
    fn slots(&self) -> &[T] {
        match self {
            Storage::Owned(b) => &b[..],
            Storage::Borrowed(s) => &s[..],
        }
    }

    #[inline]
    fn slots_mut(&mut self) -> &mut [T] {
        match self {
            Storage::Owned(b) => &mut b[..],
            Storage::Borrowed(s) => &mut s[..],
        }
    }
}

/// Fixed-capacity sequence. Storage is allocated once at construction, or borrowed from the caller
/// and handed back untouched (apart from its contents) when the array is dropped.
pub struct Array<'a, T> {
    storage: Storage<'a, T>,
    size:    usize,
}

impl<T> Array<'static, T>
where
    T: Default,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: Storage::Owned((0..capacity).map(|_| T::default()).collect()),
            size:    0,
        }
    }
}

impl<'a, T> Array<'a, T>
where
    T: Default,
{
    /// Use caller-supplied memory. The slots are cleared and the array starts empty.
    pub fn with_storage(memory: &'a mut [T]) -> Self {
        memory.iter_mut().for_each(|slot| *slot = T::default());

        Self {
            storage: Storage::Borrowed(memory),
            size:    0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.slots().len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.size
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
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    pub fn push_back(&mut self, item: T) -> Result<()> {
        if self.is_full() {
            return Err(Error::Full);
        }

        let pos = self.size;
        self.storage.slots_mut()[pos] = item;
        self.size += 1;

        Ok(())
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        self.size -= 1;
        let pos = self.size;

        Some(mem::take(&mut self.storage.slots_mut()[pos]))
    }

    #[inline]
    pub fn at(&self, pos: usize) -> Option<&T> {
        self.as_slice().get(pos)
    }

    #[inline]
    pub fn at_mut(&mut self, pos: usize) -> Option<&mut T> {
        let size = self.size;
        self.storage.slots_mut()[..size].get_mut(pos)
    }

    /// Overwrite `items.len()` slots starting at `pos`, growing the size if the write extends past
    /// it. Nothing is written if the write would not fit in the capacity.
    pub fn assign(&mut self, pos: usize, items: &[T]) -> Result<()>
    where
        T: Clone,
    {
        let end = pos + items.len();

        if end > self.capacity() {
            return Err(Error::OutOfBounds {
                pos:   end,
                limit: self.capacity(),
            });
        }

        self.storage.slots_mut()[pos..end].clone_from_slice(items);
        self.size = self.size.max(end);

        Ok(())
    }

    /// Change the size within `[0, capacity]`. Slots that are dropped or newly exposed are reset
    /// to `T::default()`.
    pub fn resize(&mut self, size: usize) -> Result<()> {
        if size > self.capacity() {
            return Err(Error::OutOfBounds {
                pos:   size,
                limit: self.capacity(),
            });
        }

        let (lo, hi) = if size < self.size { (size, self.size) } else { (self.size, size) };
        self.storage.slots_mut()[lo..hi].iter_mut().for_each(|slot| *slot = T::default());
        self.size = size;

        Ok(())
    }

    #[inline]
    pub fn reset(&mut self) {
        self.storage.slots_mut().iter_mut().for_each(|slot| *slot = T::default());
        self.size = 0;
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.storage.slots()[..self.size]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<'a, T> fmt::Debug for Array<'a, T>
where
    T: fmt::Debug + Default,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("capacity", &self.capacity())
            .field("owned", &self.is_owned())
            .field("items", &self.as_slice())
            .finish()
    }
}

impl<'a, 'b, T> IntoIterator for &'b Array<'a, T>
where
    T: Default,
{
    type IntoIter = std::slice::Iter<'b, T>;
    type Item = &'b T;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
