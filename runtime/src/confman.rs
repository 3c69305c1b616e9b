//! Confirmation requests.
//!
//! ROPs sent with `rqstconf` are remembered until the next frame goes out; the application is
//! told about them through the "requested" callback. Inbound ack/nak ROPs are reported through
//! the "received" callback.

use std::{
    fmt,
    net::Ipv4Addr,
};

use message::{
    ConfInfo,
    Rop,
};
use util::{
    Fifo,
    Policy,
    Single,
    Timeout,
};

use crate::{
    Error,
    Result,
};

pub type ConfirmationFn = Box<dyn Fn(Ipv4Addr, &Rop) + Send + Sync>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ConfirmationMode {
    #[default]
    Disabled,
    Enabled,
}

pub struct ConfirmationConfig {
    pub mode:         ConfirmationMode,
    pub max_requests: usize,
    pub on_requested: Option<ConfirmationFn>,
    pub on_received:  Option<ConfirmationFn>,
}

impl ConfirmationConfig {
    pub const DEFAULT_MAX_REQUESTS: usize = 16;

    #[inline]
    pub fn enabled() -> Self {
        Self {
            mode: ConfirmationMode::Enabled,
            ..Default::default()
        }
    }

    pub fn on_requested<F>(mut self, f: F) -> Self
    where
        F: Fn(Ipv4Addr, &Rop) + Send + Sync + 'static,
    {
        self.on_requested = Some(Box::new(f));
        self
    }

    pub fn on_received<F>(mut self, f: F) -> Self
    where
        F: Fn(Ipv4Addr, &Rop) + Send + Sync + 'static,
    {
        self.on_received = Some(Box::new(f));
        self
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            mode:         ConfirmationMode::Disabled,
            max_requests: Self::DEFAULT_MAX_REQUESTS,
            on_requested: None,
            on_received:  None,
        }
    }
}

impl fmt::Debug for ConfirmationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationConfig")
            .field("mode", &self.mode)
            .field("max_requests", &self.max_requests)
            .field("on_requested", &self.on_requested.is_some())
            .field("on_received", &self.on_received.is_some())
            .finish()
    }
}

pub struct ConfirmationManager<L: Policy = Single> {
    requests:     Option<Fifo<Rop, L>>,
    on_requested: Option<ConfirmationFn>,
    on_received:  Option<ConfirmationFn>,
}

impl<L> ConfirmationManager<L>
where
    L: Policy,
{
    /// `None` when confirmations are disabled. A zero `max_requests` keeps the callbacks but
    /// tracks no outbound requests.
    pub fn new(config: ConfirmationConfig) -> Option<Self> {
        if config.mode == ConfirmationMode::Disabled {
            return None;
        }

        Some(Self {
            requests:     (config.max_requests > 0).then(|| Fifo::new(config.max_requests)),
            on_requested: config.on_requested,
            on_received:  config.on_received,
        })
    }

    /// Remember `rop` if it asks for confirmation. Returns whether it was queued.
    pub fn insert_request(&self, rop: &Rop, timeout: Timeout) -> Result<bool> {
        if !rop.rqstconf {
            return Ok(false);
        }

        let requests = match self.requests {
            Some(ref requests) => requests,
            None => return Ok(false),
        };

        match requests.put(rop.clone(), timeout) {
            Ok(()) => Ok(true),
            Err(util::Error::Full) => {
                tracing::warn!(id32 = %rop.id32, ropc = %rop.ropc, "confirmation request dropped");
                Err(Error::ConfirmationDropped(rop.id32))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Report every queued request as sent to `to`, then forget them.
    pub fn process_requests(&self, to: Ipv4Addr, timeout: Timeout) -> Result<usize> {
        let requests = match self.requests {
            Some(ref requests) => requests,
            None => return Ok(0),
        };

        let on_requested = self.on_requested.as_ref();
        let count = requests.drain_with(timeout, |rop| {
            if let Some(f) = on_requested {
                f(to, &rop);
            }
        })?;

        if count > 0 {
            tracing::trace!(%to, count, "processed confirmation requests");
        }

        Ok(count)
    }

    /// Hand an inbound ack/nak to the application. Returns whether the callback ran.
    pub fn on_received(&self, from: Ipv4Addr, rop: &Rop) -> bool {
        if rop.confinfo == ConfInfo::None {
            return false;
        }

        tracing::debug!(%from, id32 = %rop.id32, confinfo = %rop.confinfo, "confirmation received");

        match self.on_received {
            Some(ref f) => {
                f(from, rop);
                true
            },
            None => false,
        }
    }

    pub fn pending(&self, timeout: Timeout) -> Result<usize> {
        match self.requests {
            Some(ref requests) => Ok(requests.size(timeout)?),
            None => Ok(0),
        }
    }
}
