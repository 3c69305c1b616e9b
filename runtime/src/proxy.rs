//! Proxy for network variables that live behind this node.
//!
//! An `ask` for a proxied variable cannot be answered immediately: it is recorded as a pending
//! request and handed to the application through the variable's update callback. When the
//! application has the value, [`Proxy::reply_load`] turns the pending request into a `say`.

use std::time::Duration;

use message::{
    Id32,
    Rop,
    RopCode,
};
use util::{
    Deque,
    Policy,
    Timeout,
};

use crate::{
    agent::confirm,
    nv::{
        Nv,
        Storage,
        UpdatePolicy,
    },
    Error,
    Result,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ProxyMode {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProxyConfig {
    pub mode:          ProxyMode,
    /// Maximum number of outstanding asks.
    pub capacity:      usize,
    /// Pending asks older than this are evicted by [`Proxy::tick`]. `None` keeps them forever.
    pub reply_timeout: Option<Duration>,
}

impl ProxyConfig {
    pub const DEFAULT_CAPACITY: usize = 8;
    pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(10);

    #[inline]
    pub fn enabled() -> Self {
        Self {
            mode: ProxyMode::Enabled,
            ..Default::default()
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode:          ProxyMode::Disabled,
            capacity:      Self::DEFAULT_CAPACITY,
            reply_timeout: Some(Self::DEFAULT_REPLY_TIMEOUT),
        }
    }
}

/// Scratch space the application may use while it gathers a reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct ProxyParams {
    pub expected: u8,
    pub received: u8,
    pub aux16:    u16,
    pub aux32:    u32,
}

#[derive(Clone, Debug)]
struct Pending {
    ask:     Rop,
    params:  ProxyParams,
    created: Duration,
}

impl Pending {
    #[inline]
    fn matches(&self, id32: Id32, signature: Option<u32>) -> bool {
        self.ask.id32 == id32 && signature.map_or(true, |s| self.ask.signature == Some(s))
    }
}

#[derive(Debug)]
pub struct Proxy {
    pending:       Deque<Pending>,
    reply_timeout: Option<Duration>,
}

impl Proxy {
    /// `None` when the proxy is disabled.
    pub fn new(config: ProxyConfig) -> Option<Self> {
        if config.mode == ProxyMode::Disabled || config.capacity == 0 {
            return None;
        }

        Some(Self {
            pending:       Deque::new(config.capacity),
            reply_timeout: config.reply_timeout,
        })
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Handle an inbound ROP addressed to a proxied variable.
    ///
    /// Returns the confirmation to send back, if one was requested. Asks never produce an
    /// immediate reply.
    #[tracing::instrument(level = "debug", skip_all, fields(id32 = %rop.id32, ropc = %rop.ropc), err)]
    pub fn forward<L>(&mut self, nv: &Nv<L>, rop: &Rop, now: Duration, timeout: Timeout) -> Result<Option<Rop>>
    where
        L: Policy,
    {
        if !nv.is_proxied() {
            return Err(Error::NotProxied(nv.id32()));
        }

        match rop.ropc {
            RopCode::Ask => {
                self.remember(rop, now)?;
                nv.update(UpdatePolicy::Always, Some(rop), timeout)?;

                Ok(None)
            },

            RopCode::Set => confirm(rop, nv.remote_set_rop(&rop.data, UpdatePolicy::Always, rop, timeout)),

            RopCode::Rst => {
                let resetval = nv.get(Storage::Default, timeout)?;
                confirm(rop, nv.remote_set_rop(&resetval, UpdatePolicy::Always, rop, timeout))
            },

            ropc => Err(Error::NotForwardable(ropc)),
        }
    }

    fn remember(&mut self, ask: &Rop, now: Duration) -> Result<()> {
        let existing = self
            .pending
            .iter_mut()
            .find(|p| p.ask.id32 == ask.id32 && p.ask.signature == ask.signature);

        if let Some(pending) = existing {
            tracing::debug!("refreshing pending ask");

            pending.ask = ask.clone();
            pending.params = ProxyParams::default();
            pending.created = now;

            return Ok(());
        }

        self.pending
            .push_back(Pending {
                ask:     ask.clone(),
                params:  ProxyParams::default(),
                created: now,
            })
            .map_err(|_| {
                tracing::warn!("proxy request table full");
                Error::Full
            })
    }

    /// Scratch record of the oldest pending ask for `id32`.
    pub fn params(&mut self, id32: Id32) -> Option<&mut ProxyParams> {
        self.pending
            .iter_mut()
            .find(|p| p.ask.id32 == id32)
            .map(|p| &mut p.params)
    }

    /// Answer the pending ask for `nv`. `signature` selects among asks with different signatures;
    /// `None` matches any. If `data` is given it is written into the variable first.
    ///
    /// The returned `say` carries the variable's value and echoes the ask's signature.
    #[tracing::instrument(level = "debug", skip_all, fields(id32 = %nv.id32()), err)]
    pub fn reply_load<L>(
        &mut self,
        nv: &Nv<L>,
        signature: Option<u32>,
        data: Option<&[u8]>,
        now: Duration,
        timeout: Timeout,
    ) -> Result<Rop>
    where
        L: Policy,
    {
        let id32 = nv.id32();

        let pos = self
            .pending
            .iter()
            .position(|p| p.matches(id32, signature))
            .ok_or(Error::Unmatched(id32))?;

        if let Some(data) = data {
            nv.set(data, true, UpdatePolicy::Never, timeout)?;
        }

        let value = nv.get(Storage::Volatile, timeout)?;

        let pending = self.pending.remove(pos).ok_or(Error::Unmatched(id32))?;

        let mut say = Rop::say(id32, value);

        if let Some(signature) = pending.ask.signature {
            say = say.with_signature(signature);
        }

        if pending.ask.rqsttime {
            say = say.with_time(now.as_micros() as u64);
        }

        Ok(say)
    }

    /// Evict pending asks that outlived the reply timeout. Returns how many were dropped.
    pub fn tick(&mut self, now: Duration) -> usize {
        let timeout = match self.reply_timeout {
            Some(timeout) => timeout,
            None => return 0,
        };

        let before = self.pending.len();

        self.pending.retain(|p| {
            let alive = now.saturating_sub(p.created) <= timeout;

            if !alive {
                tracing::warn!(id32 = %p.ask.id32, signature = ?p.ask.signature, "proxy request expired");
            }

            alive
        });

        before - self.pending.len()
    }
}
