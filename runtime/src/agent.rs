//! Per-ROP processing: apply an inbound operation to the NV-Set and synthesize the reply.

use std::{
    net::Ipv4Addr,
    time::Duration,
};

use message::{
    ConfInfo,
    Rop,
    RopCode,
};
use util::{
    Policy,
    Timeout,
};

use crate::{
    confman::ConfirmationManager,
    nv::{
        Storage,
        UpdatePolicy,
    },
    nvset::NvSet,
    proxy::Proxy,
    ErrorKind,
    Result,
};

/// Turn the outcome of a write into the ack/nak the sender asked for.
///
/// Refusals become a nak. Lock timeouts are not the sender's fault and propagate.
pub(crate) fn confirm(rop: &Rop, outcome: Result<()>) -> Result<Option<Rop>> {
    let confinfo = match outcome {
        Ok(()) => ConfInfo::Ack,
        Err(e) if e.kind() == ErrorKind::Timeout => return Err(e),
        Err(e) => {
            tracing::warn!(id32 = %rop.id32, ropc = %rop.ropc, error = %e, "operation refused");
            ConfInfo::Nak
        },
    };

    Ok(rop.rqstconf.then(|| rop.confirmation(confinfo)))
}

/// Borrowed view of everything a ROP may touch while it is processed.
pub struct Agent<'a, L: Policy> {
    pub nvset:   &'a NvSet<L>,
    pub confman: Option<&'a ConfirmationManager<L>>,
    pub proxy:   Option<&'a mut Proxy>,
    pub now:     Duration,
    pub timeout: Timeout,
}

impl<'a, L> Agent<'a, L>
where
    L: Policy,
{
    /// Apply `rop`, received from `from`. Returns the reply to queue, if any.
    #[tracing::instrument(level = "trace", skip_all, fields(%from, id32 = %rop.id32, ropc = %rop.ropc), err)]
    pub fn process(&mut self, from: Ipv4Addr, rop: &Rop) -> Result<Option<Rop>> {
        if rop.is_confirmation() {
            if let Some(confman) = self.confman {
                confman.on_received(from, rop);
            }

            return Ok(None);
        }

        let nvset = self.nvset;

        let nv = match nvset.lookup(from, rop.id32) {
            Some(nv) => nv,
            None => {
                tracing::debug!("no such network variable");
                return Ok(rop.rqstconf.then(|| rop.confirmation(ConfInfo::Nak)));
            },
        };

        if nv.is_proxied() && matches!(rop.ropc, RopCode::Ask | RopCode::Set | RopCode::Rst) {
            if let Some(proxy) = self.proxy.as_deref_mut() {
                return proxy.forward(nv, rop, self.now, self.timeout);
            }
        }

        let timeout = self.timeout;

        match rop.ropc {
            RopCode::Ask => {
                let mut say = Rop::say(rop.id32, nv.get(Storage::Volatile, timeout)?);

                if let Some(signature) = rop.signature {
                    say = say.with_signature(signature);
                }

                if rop.rqsttime {
                    say = say.with_time(self.now.as_micros() as u64);
                }

                Ok(Some(say))
            },

            RopCode::Set => confirm(rop, nv.set_rop(&rop.data, UpdatePolicy::Always, rop, timeout)),
            RopCode::Rst => confirm(rop, nv.reset_rop(UpdatePolicy::Always, rop, timeout)),
            // A local variable only changes if it is writable.
            RopCode::Sig if nv.is_local() => confirm(rop, nv.set_rop(&rop.data, UpdatePolicy::Always, rop, timeout)),
            RopCode::Sig => confirm(rop, nv.remote_set_rop(&rop.data, UpdatePolicy::Always, rop, timeout)),

            RopCode::Say if nv.is_local() => {
                tracing::debug!("say for a local variable dropped");
                Ok(None)
            },

            RopCode::Say => {
                nv.remote_set_rop(&rop.data, UpdatePolicy::Always, rop, timeout)?;
                nv.on_say(rop, timeout)?;

                Ok(None)
            },
        }
    }
}
