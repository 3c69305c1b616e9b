use std::{
    fmt,
    net::Ipv4Addr,
};

use bytes::Bytes;
use codec::Frame;
use message::{
    error_code::System,
    ErrorCode,
};
use util::Policy;

use crate::{
    agent::Agent,
    seqnum::{
        Continuity,
        SequenceTracker,
    },
    transmitter::Transmitter,
    Error,
    Result,
};

pub type SequenceErrorFn = Box<dyn Fn(Ipv4Addr, Continuity) + Send + Sync>;
pub type InvalidFrameFn = Box<dyn Fn(Ipv4Addr, &codec::Error) + Send + Sync>;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ReceiverStats {
    pub frames:          u64,
    pub invalid_frames:  u64,
    pub sequence_errors: u64,
    pub malformed:       u64,
    pub lost_replies:    u64,
    pub refused:         u64,
}

/// Outcome of one accepted frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Received {
    /// ROPs dispatched to the agent.
    pub rops:       usize,
    /// Replies queued for the next outbound frame.
    pub replies:    usize,
    pub continuity: Continuity,
}

#[derive(Default)]
pub struct Receiver {
    tracker:           SequenceTracker,
    stats:             ReceiverStats,
    on_sequence_error: Option<SequenceErrorFn>,
    on_invalid_frame:  Option<InvalidFrameFn>,
}

impl Receiver {
    pub fn new(on_sequence_error: Option<SequenceErrorFn>, on_invalid_frame: Option<InvalidFrameFn>) -> Self {
        Self {
            tracker: SequenceTracker::new(),
            stats: ReceiverStats::default(),
            on_sequence_error,
            on_invalid_frame,
        }
    }

    #[inline]
    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    #[inline]
    pub fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }

    /// Parse `packet`, check its sequence number and dispatch its ROPs in order.
    ///
    /// Processing stops at the first ROP that fails to decode; ROPs before it have already taken
    /// effect. Replies are queued on `transmitter`; those that do not fit are counted as lost.
    #[tracing::instrument(level = "debug", skip_all, fields(%from, len = packet.len()), err)]
    pub fn receive<L>(
        &mut self,
        from: Ipv4Addr,
        packet: Bytes,
        agent: &mut Agent<'_, L>,
        transmitter: &mut Transmitter,
    ) -> Result<Received>
    where
        L: Policy,
    {
        let frame = match Frame::parse(packet) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.invalid_frames += 1;
                tracing::error!(error = %e, code = %ErrorCode::system(System::TransceiverRxInvalidFrame), "invalid frame");

                if let Some(ref f) = self.on_invalid_frame {
                    f(from, &e);
                }

                return Err(Error::InvalidFrame(e));
            },
        };

        self.stats.frames += 1;

        let continuity = self.tracker.observe(frame.sequence_number());

        if !continuity.is_ok() {
            self.stats.sequence_errors += 1;
            tracing::warn!(?continuity, code = ?continuity.code(), "sequence number anomaly");

            if let Some(ref f) = self.on_sequence_error {
                f(from, continuity);
            }
        }

        let mut received = Received {
            rops: 0,
            replies: 0,
            continuity,
        };

        for rop in frame.rops() {
            let rop = match rop {
                Ok(rop) => rop,
                Err(source) => {
                    self.stats.malformed += 1;

                    return Err(Error::Malformed {
                        processed: received.rops,
                        source,
                    });
                },
            };

            received.rops += 1;

            let reply = match agent.process(from, &rop) {
                Ok(Some(reply)) => reply,
                Ok(None) => continue,
                Err(e) => {
                    self.stats.refused += 1;
                    tracing::warn!(error = %e, id32 = %rop.id32, ropc = %rop.ropc, "rop not processed");
                    continue;
                },
            };

            match transmitter.load_reply(reply) {
                Ok(()) => received.replies += 1,
                Err(rejected) => {
                    self.stats.lost_replies += rejected.rops.len() as u64;
                    tracing::warn!(
                        reason = %rejected.reason,
                        id32 = %rop.id32,
                        code = %ErrorCode::system(System::TransceiverReplyLost),
                        "reply lost"
                    );
                },
            }
        }

        Ok(received)
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("tracker", &self.tracker)
            .field("stats", &self.stats)
            .finish()
    }
}
