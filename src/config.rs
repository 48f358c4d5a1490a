use crate::codec::MSS;

/// Tunable protocol constants, split out of the per-session engines so
/// they can be overridden in tests without touching live connection
/// state.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    /// Bytes of payload per segment.
    pub mss: usize,
    /// Total bytes the send/receive buffers may hold; both sides must
    /// agree on this or the sender will under-utilize the link.
    pub buffer_capacity: usize,
    /// Initial slow-start threshold, in bytes.
    pub initial_ss_threshold: u32,
    /// Initial retransmission timeout, in seconds.
    pub initial_timeout: f64,
    /// RTT estimator smoothing factor for EstimatedRTT.
    pub alpha: f64,
    /// RTT estimator smoothing factor for DeviationRTT.
    pub beta: f64,
    /// RTO = EstimatedRTT + gamma * DeviationRTT.
    pub gamma: f64,
    /// Consecutive timeouts with no advance of send_base before a
    /// session is abandoned as `TransferFailed`. The core protocol has
    /// no retry ceiling or overall session deadline; this watchdog is
    /// the implementer-supplied bound that keeps a dead peer from
    /// hanging a transfer forever.
    pub max_consecutive_timeouts: u32,
}

impl TransportConfig {
    /// Number of MSS-sized slots the buffer capacity allows.
    pub fn buffer_segment_amount(&self) -> usize {
        self.buffer_capacity / self.mss
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            mss: MSS,
            buffer_capacity: 65536,
            initial_ss_threshold: 65536,
            initial_timeout: 1.0,
            alpha: 0.125,
            beta: 0.25,
            gamma: 4.0,
            max_consecutive_timeouts: 16,
        }
    }
}
