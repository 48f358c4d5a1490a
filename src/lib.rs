//! LFTP: a reliable, TCP-flavored file-transfer transport over UDP.
//!
//! The crate is organized the way the protocol itself is: a shared
//! wire [`codec`], a pure [`congestion`] state machine and [`rtt`]
//! estimator usable without a socket, and the two halves that drive
//! them, [`sender`] and [`receiver`].

mod codec;
mod congestion;
mod err;
mod rtt;
mod util;

pub mod config;
pub mod receiver;
pub mod sender;

pub use codec::{wrapping_lt, SegmentView, HEADER_SIZE, MSS};
pub use config::TransportConfig;
pub use congestion::{CongestionAction, CongestionEvent, CongestionState, CongestionStatus};
pub use err::Error;
pub use receiver::{receive_file, Listener};
pub use rtt::RttEstimator;
pub use sender::{send_file, RendezvousHooks};
