//! Protection policies for shared state.
//!
//! Every structure that may be touched from more than one thread is generic over a [`Policy`],
//! which selects the [`Protect`] implementation guarding its state. [`Single`] uses
//! [`Unprotected`]: no lock exists and the structure is not `Sync`. [`Shared`] uses [`Protected`],
//! a `parking_lot` mutex that honours the caller's [`Timeout`].

use std::{
    cell::{
        RefCell,
        RefMut,
    },
    fmt,
    ops::DerefMut,
    time::Duration,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Timeout {
    #[default]
    Infinite,
    After(Duration),
}

impl Timeout {
    pub const NONE: Timeout = Timeout::After(Duration::ZERO);

    #[inline]
    pub fn from_micros(us: u64) -> Self {
        Timeout::After(Duration::from_micros(us))
    }
}

impl From<Duration> for Timeout {
    #[inline]
    fn from(d: Duration) -> Self {
        Timeout::After(d)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Infinite => f.write_str("infinite"),
            Timeout::After(d) => write!(f, "{d:?}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[error("lock not acquired within {0}")]
pub struct LockTimeout(pub Timeout);

pub trait Protect<T> {
    type Guard<'a>: DerefMut<Target = T>
    where
        Self: 'a,
        T: 'a;

    fn new(value: T) -> Self;

    /// Acquire exclusive access, waiting at most `timeout`.
    fn take(&self, timeout: Timeout) -> Result<Self::Guard<'_>, LockTimeout>;

    /// Exclusive access through a unique borrow. Never blocks.
    fn get_mut(&mut self) -> &mut T;

    fn into_inner(self) -> T;
}

pub trait Policy: 'static {
    type Lock<T>: Protect<T>;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Single;

impl Policy for Single {
    type Lock<T> = Unprotected<T>;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shared;

impl Policy for Shared {
    type Lock<T> = Protected<T>;
}

#[derive(Debug, Default)]
pub struct Unprotected<T>(RefCell<T>);

impl<T> Protect<T> for Unprotected<T> {
    type Guard<'a> = RefMut<'a, T>
    where
        Self: 'a,
        T: 'a;

    #[inline]
    fn new(value: T) -> Self {
        Self(RefCell::new(value))
    }

    // re-entrant acquisition can never succeed by waiting
    #[inline]
    fn take(&self, timeout: Timeout) -> Result<Self::Guard<'_>, LockTimeout> {
        self.0.try_borrow_mut().map_err(|_| LockTimeout(timeout))
    }

    #[inline]
    fn get_mut(&mut self) -> &mut T {
        self.0.get_mut()
    }

    #[inline]
    fn into_inner(self) -> T {
        self.0.into_inner()
    }
}

#[derive(Debug, Default)]
pub struct Protected<T>(parking_lot::Mutex<T>);

impl<T> Protect<T> for Protected<T> {
    type Guard<'a> = parking_lot::MutexGuard<'a, T>
    where
        Self: 'a,
        T: 'a;

    #[inline]
    fn new(value: T) -> Self {
        Self(parking_lot::Mutex::new(value))
    }

    fn take(&self, timeout: Timeout) -> Result<Self::Guard<'_>, LockTimeout> {
        match timeout {
            Timeout::Infinite => Ok(self.0.lock()),
            Timeout::After(d) if d.is_zero() => self.0.try_lock().ok_or(LockTimeout(timeout)),
            Timeout::After(d) => self.0.try_lock_for(d).ok_or_else(|| {
                tracing::debug!(%timeout, "mutex acquisition timed out");
                LockTimeout(timeout)
            }),
        }
    }

    #[inline]
    fn get_mut(&mut self) -> &mut T {
        self.0.get_mut()
    }

    #[inline]
    fn into_inner(self) -> T {
        self.0.into_inner()
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::Arc,
        thread,
    };

    use super::*;

    #[test]
    fn unprotected_reentry_times_out() {
        let cell = Unprotected::new(5u32);

        let guard = cell.take(Timeout::Infinite).unwrap();
        assert_eq!(cell.take(Timeout::NONE).err(), Some(LockTimeout(Timeout::NONE)));

        drop(guard);
        assert_eq!(*cell.take(Timeout::NONE).unwrap(), 5);
    }

    #[test]
    fn protected_times_out_while_held() {
        let cell = Arc::new(Protected::new(0u32));

        let guard = cell.take(Timeout::Infinite).unwrap();

        let other = cell.clone();
        let result = thread::spawn(move || {
            other.take(Timeout::After(Duration::from_millis(10))).map(|g| *g).err()
        })
        .join()
        .unwrap();

        assert!(result.is_some());
        drop(guard);

        *cell.take(Timeout::After(Duration::from_millis(10))).unwrap() += 1;
        assert_eq!(Arc::try_unwrap(cell).unwrap().into_inner(), 1);
    }
}
