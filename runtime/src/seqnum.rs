use message::{
    error_code::System,
    ErrorCode,
};

/// Sequence number carried by the first frame a transmitter emits.
pub const FIRST_SEQUENCE_NUMBER: u64 = 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Continuity {
    Ok,
    /// Frames between `expected` and `received` never arrived. `received` is the new baseline.
    Gap { expected: u64, received: u64 },
    /// Duplicate or reordered frame. The baseline is unchanged.
    Stale { current: u64, received: u64 },
    /// The sender started counting again from the first sequence number.
    Restart { previous: u64 },
}

impl Continuity {
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Continuity::Ok)
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Continuity::Ok => None,
            Continuity::Gap { .. } | Continuity::Stale { .. } => {
                Some(ErrorCode::system(System::TransceiverRxSeqnumberError))
            },
            Continuity::Restart { .. } => Some(ErrorCode::system(System::TransceiverRxSeqnumberRestarted)),
        }
    }
}

/// Best-effort continuity check over received frames. Nothing is buffered or reordered; anomalies
/// are classified and counted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequenceTracker {
    current:  Option<u64>,
    gaps:     u64,
    stale:    u64,
    restarts: u64,
}

impl SequenceTracker {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> Option<u64> {
        self.current
    }

    #[inline]
    pub fn gaps(&self) -> u64 {
        self.gaps
    }

    #[inline]
    pub fn stale(&self) -> u64 {
        self.stale
    }

    #[inline]
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn observe(&mut self, received: u64) -> Continuity {
        let current = match self.current {
            None => {
                self.current = Some(received);
                return Continuity::Ok;
            },
            Some(current) => current,
        };

        let expected = current.wrapping_add(1);

        if received == expected {
            self.current = Some(received);
            return Continuity::Ok;
        }

        if received > current {
            self.current = Some(received);
            self.gaps += 1;

            return Continuity::Gap {
                expected,
                received,
            };
        }

        if received == FIRST_SEQUENCE_NUMBER && current > FIRST_SEQUENCE_NUMBER {
            self.current = Some(received);
            self.restarts += 1;

            return Continuity::Restart {
                previous: current,
            };
        }

        self.stale += 1;

        Continuity::Stale {
            current,
            received,
        }
    }

    /// Forget the baseline. The next frame is accepted unconditionally.
    #[inline]
    pub fn reset(&mut self) {
        self.current = None;
    }
}
