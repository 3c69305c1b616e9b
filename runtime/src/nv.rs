//! Network variables.
//!
//! An [`Nv`] pairs a mutable RAM mirror with an immutable [`NvRom`] descriptor. The RAM is guarded
//! by the variable's protection policy; the ROM is shared and never changes after bring-up.

use std::{
    fmt,
    net::Ipv4Addr,
    sync::Arc,
};

use bytes::Bytes;
use message::{
    Id32,
    Rop,
};
use util::{
    Policy,
    Protect,
    Single,
    Timeout,
};

use crate::{
    Error,
    Result,
};

pub type Ram = Box<[u8]>;

pub const LOCALHOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RwMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl RwMode {
    #[inline]
    pub fn is_writable(self) -> bool {
        !matches!(self, RwMode::ReadOnly)
    }
}

/// Whether a write notifies the variable's update callback.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UpdatePolicy {
    Never,
    Always,
    /// Only local writable variables and remote mirrors.
    IfUpdateable,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Storage {
    /// The live RAM mirror.
    Volatile,
    /// The ROM reset value.
    Default,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    Local,
    Remote,
}

impl Ownership {
    #[inline]
    pub fn of(ip: Ipv4Addr) -> Self {
        if ip == LOCALHOST {
            Ownership::Local
        } else {
            Ownership::Remote
        }
    }
}

/// What a callback sees of its variable. Handed out while the variable's lock is held.
pub struct NvAccess<'a> {
    pub id32:  Id32,
    pub ip:    Ipv4Addr,
    pub board: u8,
    pub ram:   &'a mut [u8],
}

pub type InitFn = Box<dyn Fn(&mut NvAccess<'_>) + Send + Sync>;
pub type UpdateFn = Box<dyn Fn(&mut NvAccess<'_>, Option<&Rop>) + Send + Sync>;
pub type OnSayFn = Arc<dyn Fn(&mut NvAccess<'_>, &Rop) + Send + Sync>;

pub struct NvRom {
    resetval: Bytes,
    rwmode:   RwMode,
    init:     Option<InitFn>,
    update:   Option<UpdateFn>,
}

impl NvRom {
    /// The capacity of the variable is the length of its reset value.
    pub fn new(resetval: impl Into<Bytes>, rwmode: RwMode) -> Self {
        Self {
            resetval: resetval.into(),
            rwmode,
            init: None,
            update: None,
        }
    }

    pub fn with_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut NvAccess<'_>) + Send + Sync + 'static,
    {
        self.init = Some(Box::new(f));
        self
    }

    pub fn with_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut NvAccess<'_>, Option<&Rop>) + Send + Sync + 'static,
    {
        self.update = Some(Box::new(f));
        self
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.resetval.len()
    }

    #[inline]
    pub fn resetval(&self) -> &Bytes {
        &self.resetval
    }

    #[inline]
    pub fn rwmode(&self) -> RwMode {
        self.rwmode
    }
}

impl fmt::Debug for NvRom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NvRom")
            .field("resetval", &hex::encode(&self.resetval))
            .field("rwmode", &self.rwmode)
            .field("init", &self.init.is_some())
            .field("update", &self.update.is_some())
            .finish()
    }
}

pub struct Nv<L: Policy = Single> {
    ip:      Ipv4Addr,
    board:   u8,
    id32:    Id32,
    proxied: bool,
    rom:     Arc<NvRom>,
    onsay:   Option<OnSayFn>,
    ram:     L::Lock<Ram>,
}

impl<L> Nv<L>
where
    L: Policy,
{
    pub(crate) fn load(ip: Ipv4Addr, board: u8, id32: Id32, rom: Arc<NvRom>, proxied: bool) -> Self {
        let ram = Ram::from(&rom.resetval[..]);

        Self {
            ip,
            board,
            id32,
            proxied,
            rom,
            onsay: None,
            ram: <L::Lock<Ram> as Protect<Ram>>::new(ram),
        }
    }

    pub(crate) fn set_on_say(&mut self, onsay: Option<OnSayFn>) {
        self.onsay = onsay;
    }

    #[inline]
    pub fn id32(&self) -> Id32 {
        self.id32
    }

    #[inline]
    pub fn endpoint(&self) -> u8 {
        self.id32.endpoint()
    }

    #[inline]
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    #[inline]
    pub fn board(&self) -> u8 {
        self.board
    }

    #[inline]
    pub fn is_proxied(&self) -> bool {
        self.proxied
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.rom.capacity()
    }

    #[inline]
    pub fn rwmode(&self) -> RwMode {
        self.rom.rwmode
    }

    #[inline]
    pub fn ownership(&self) -> Ownership {
        Ownership::of(self.ip)
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        self.ownership() == Ownership::Local
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.rom.rwmode.is_writable()
    }

    /// Remote mirrors always accept updates; local variables only when writable.
    #[inline]
    pub fn is_updateable(&self) -> bool {
        match self.ownership() {
            Ownership::Local => self.is_writable(),
            Ownership::Remote => true,
        }
    }

    #[inline]
    fn access<'a>(&self, ram: &'a mut [u8]) -> NvAccess<'a> {
        NvAccess {
            id32: self.id32,
            ip: self.ip,
            board: self.board,
            ram,
        }
    }

    fn write(&self, data: &[u8], policy: UpdatePolicy, rop: Option<&Rop>, timeout: Timeout) -> Result<()> {
        if data.len() != self.capacity() {
            return Err(Error::SizeMismatch {
                id32:     self.id32,
                capacity: self.capacity(),
                got:      data.len(),
            });
        }

        self.ram.take(timeout)?.copy_from_slice(data);
        self.update(policy, rop, timeout)?;

        Ok(())
    }

    /// Invoke the update callback as `policy` dictates. Returns whether it ran.
    pub fn update(&self, policy: UpdatePolicy, rop: Option<&Rop>, timeout: Timeout) -> Result<bool> {
        let fire = match policy {
            UpdatePolicy::Never => false,
            UpdatePolicy::Always => true,
            UpdatePolicy::IfUpdateable => self.is_updateable(),
        };

        let update = match self.rom.update {
            Some(ref update) if fire => update,
            _ => return Ok(false),
        };

        let mut ram = self.ram.take(timeout)?;
        update(&mut self.access(&mut ram), rop);

        Ok(true)
    }

    pub fn set(&self, data: &[u8], force: bool, policy: UpdatePolicy, timeout: Timeout) -> Result<()> {
        if !force && !self.is_writable() {
            return Err(Error::ReadOnly(self.id32));
        }

        self.write(data, policy, None, timeout)
    }

    pub fn reset(&self, force: bool, policy: UpdatePolicy, timeout: Timeout) -> Result<()> {
        let resetval = self.rom.resetval.clone();
        self.set(&resetval, force, policy, timeout)
    }

    /// Protocol-driven write: the originating ROP reaches the update callback.
    pub fn set_rop(&self, data: &[u8], policy: UpdatePolicy, rop: &Rop, timeout: Timeout) -> Result<()> {
        if !self.is_writable() {
            return Err(Error::ReadOnly(self.id32));
        }

        self.write(data, policy, Some(rop), timeout)
    }

    pub fn reset_rop(&self, policy: UpdatePolicy, rop: &Rop, timeout: Timeout) -> Result<()> {
        let resetval = self.rom.resetval.clone();
        self.set_rop(&resetval, policy, rop, timeout)
    }

    /// Write into the mirror of a variable owned elsewhere. The access mode describes the owner's
    /// side, so it is not checked.
    pub fn remote_set_rop(&self, data: &[u8], policy: UpdatePolicy, rop: &Rop, timeout: Timeout) -> Result<()> {
        self.write(data, policy, Some(rop), timeout)
    }

    pub fn get(&self, storage: Storage, timeout: Timeout) -> Result<Bytes> {
        match storage {
            Storage::Volatile => Ok(Bytes::copy_from_slice(&self.ram.take(timeout)?)),
            Storage::Default => Ok(self.rom.resetval.clone()),
        }
    }

    /// Run the ROM init function, if any. Returns whether it ran.
    pub fn init(&self, timeout: Timeout) -> Result<bool> {
        let init = match self.rom.init {
            Some(ref init) => init,
            None => return Ok(false),
        };

        let mut ram = self.ram.take(timeout)?;
        init(&mut self.access(&mut ram));

        Ok(true)
    }

    /// Notify the on-say callback of a reply to one of our asks. Returns whether it ran.
    pub fn on_say(&self, rop: &Rop, timeout: Timeout) -> Result<bool> {
        let onsay = match self.onsay {
            Some(ref onsay) => onsay,
            None => return Ok(false),
        };

        let mut ram = self.ram.take(timeout)?;
        onsay(&mut self.access(&mut ram), rop);

        Ok(true)
    }
}

impl<L> fmt::Debug for Nv<L>
where
    L: Policy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nv")
            .field("ip", &self.ip)
            .field("board", &self.board)
            .field("id32", &format_args!("{}", self.id32))
            .field("proxied", &self.proxied)
            .field("rom", &self.rom)
            .finish()
    }
}
