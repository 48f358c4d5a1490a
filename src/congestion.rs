//! Congestion-control state machine.
//!
//! Modeled as a pure transition function over a small tagged state,
//! split out from the socket/thread machinery so the slow-start /
//! congestion-avoidance bookkeeping is unit-testable without a socket
//! or a clock.
//!
//! This deliberately departs from RFC 5681: a triple-duplicate ACK
//! moves straight to `CongestionAvoidance` rather than a distinct
//! `FastRecovery` state. `FastRecovery` is kept as a reachable state
//! only because a caller may construct one directly (e.g. a test, or a
//! future RFC-faithful mode); the FSM as driven by the sender engine
//! never produces it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionStatus {
    SlowStart,
    CongestionAvoidance,
    FastRecovery,
}

/// Events that drive the congestion-control FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionEvent {
    /// A new-data (non-duplicate) ACK arrived.
    NewAck,
    /// A duplicate ACK arrived; `count` is the updated consecutive count.
    DupAck { count: u32 },
    /// The retransmission timer fired.
    Timeout,
}

/// Whether the caller should retransmit the segment at `send_base` as a
/// result of applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionAction {
    None,
    Retransmit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CongestionState {
    pub status: CongestionStatus,
    pub cwnd: u32,
    pub ssthresh: u32,
}

impl CongestionState {
    pub fn new(mss: u32, initial_ssthresh: u32) -> Self {
        CongestionState {
            status: CongestionStatus::SlowStart,
            cwnd: mss,
            ssthresh: initial_ssthresh,
        }
    }

    /// Applies `event`, mutating `self` in place, and returns whatever
    /// action the caller must take (namely: retransmit or not).
    ///
    /// `mss` is needed for the additive increase terms; it never
    /// changes once a session is established so it is passed in rather
    /// than stored redundantly on every state.
    pub fn apply(&mut self, event: CongestionEvent, mss: u32) -> CongestionAction {
        let action = match event {
            CongestionEvent::NewAck => {
                match self.status {
                    CongestionStatus::SlowStart => {
                        self.cwnd += mss;
                    }
                    CongestionStatus::CongestionAvoidance => {
                        let increment = ((mss as f64 * mss as f64) / self.cwnd as f64) as u32;
                        self.cwnd += increment.max(1);
                    }
                    CongestionStatus::FastRecovery => {
                        self.cwnd = self.ssthresh;
                        self.status = CongestionStatus::CongestionAvoidance;
                    }
                }
                CongestionAction::None
            }
            CongestionEvent::DupAck { count } => {
                if count == 3 {
                    match self.status {
                        CongestionStatus::SlowStart | CongestionStatus::CongestionAvoidance => {
                            self.ssthresh = self.cwnd / 2;
                            self.cwnd = self.ssthresh + 3 * mss;
                            self.status = CongestionStatus::CongestionAvoidance;
                            CongestionAction::Retransmit
                        }
                        CongestionStatus::FastRecovery => CongestionAction::None,
                    }
                } else {
                    CongestionAction::None
                }
            }
            CongestionEvent::Timeout => {
                self.ssthresh = self.cwnd / 2;
                self.cwnd = mss;
                self.status = CongestionStatus::SlowStart;
                CongestionAction::Retransmit
            }
        };

        if self.cwnd >= self.ssthresh {
            self.status = CongestionStatus::CongestionAvoidance;
        }
        self.cwnd = self.cwnd.max(mss);

        action
    }
}
