use crate::{
    lock::{
        Policy,
        Protect,
        Single,
        Timeout,
    },
    Deque,
    Error,
    Result,
};

/// A [`Deque`] used first-in first-out behind a protection policy. Every operation acquires the
/// lock for its whole critical section.
///
/// Dropping a fifo requires exclusive ownership, so no operation can be in flight at teardown.
pub struct Fifo<T, L: Policy = Single> {
    deque: L::Lock<Deque<T>>,
}

pub type FifoWord<L = Single> = Fifo<u32, L>;

impl<T, L> Fifo<T, L>
where
    L: Policy,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            deque: <L::Lock<Deque<T>> as Protect<Deque<T>>>::new(Deque::new(capacity)),
        }
    }

    pub fn capacity(&self, timeout: Timeout) -> Result<usize> {
        Ok(self.deque.take(timeout)?.capacity())
    }

    pub fn size(&self, timeout: Timeout) -> Result<usize> {
        Ok(self.deque.take(timeout)?.len())
    }

    pub fn put(&self, item: T, timeout: Timeout) -> Result<()> {
        self.deque.take(timeout)?.push_back(item)
    }

    /// Copy of the oldest item. The fifo is not modified.
    pub fn get(&self, timeout: Timeout) -> Result<T>
    where
        T: Clone,
    {
        self.deque.take(timeout)?.front().cloned().ok_or(Error::NoData)
    }

    /// Discard the oldest item, if any.
    pub fn rem(&self, timeout: Timeout) -> Result<()> {
        self.deque.take(timeout)?.pop_front();
        Ok(())
    }

    /// Take the oldest item out of the fifo within a single lock scope.
    pub fn get_rem(&self, timeout: Timeout) -> Result<T> {
        self.deque.take(timeout)?.pop_front().ok_or(Error::NoData)
    }

    pub fn clear(&self, timeout: Timeout) -> Result<()> {
        self.deque.take(timeout)?.clear();
        Ok(())
    }

    /// Visit every item oldest first, then empty the fifo, all under one lock scope. Returns the
    /// number of items visited.
    pub fn drain_with<F>(&self, timeout: Timeout, mut f: F) -> Result<usize>
    where
        F: FnMut(T),
    {
        let mut deque = self.deque.take(timeout)?;

        let mut count = 0;
        while let Some(item) = deque.pop_front() {
            f(item);
            count += 1;
        }

        Ok(count)
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut Deque<T> {
        self.deque.get_mut()
    }
}
