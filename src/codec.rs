//! Wire codec for the LFTP segment header.
//!
//! Header layout (big-endian, 12 bytes):
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-------------------------------+-------------------------------+
//! |                        sequence_number                        |
//! +---------------------------------------------------------------+
//! |                         ack_number                            |
//! +-------------------------------+-------------------------------+
//! |             flags             |        receive_window         |
//! +-------------------------------+-------------------------------+
//! |                            payload ...                        |
//! ```

use crate::Error;

/// Size in bytes of the fixed segment header.
pub const HEADER_SIZE: usize = 12;

/// Maximum segment size: bytes of payload per datagram.
pub const MSS: usize = 1024;

const FLAG_ACK: u16 = 0x80;
const FLAG_SYN: u16 = 0x40;
const FLAG_FIN: u16 = 0x20;

/// A decoded LFTP segment, header fields plus a borrowed payload slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentView<'a> {
    pub seq: u32,
    pub ack: u32,
    pub ack_flag: bool,
    pub syn: bool,
    pub fin: bool,
    pub recv_window: u16,
    pub payload: &'a [u8],
}

/// Packs a segment header followed by `payload` into a fresh `Vec<u8>`.
pub fn pack(seq: u32, ack: u32, ack_flag: bool, syn: bool, fin: bool, recv_window: u16, payload: &[u8]) -> Vec<u8> {
    let flags = to_flags(ack_flag, syn, fin);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&seq.to_be_bytes());
    out.extend_from_slice(&ack.to_be_bytes());
    out.extend_from_slice(&flags.to_be_bytes());
    out.extend_from_slice(&recv_window.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Unpacks a raw datagram into its header fields and payload slice.
///
/// Fails with [`Error::MalformedHeader`] if `data` is shorter than
/// [`HEADER_SIZE`].
pub fn unpack(data: &[u8]) -> Result<SegmentView<'_>, Error> {
    if data.len() < HEADER_SIZE {
        return Err(Error::MalformedHeader(data.len()));
    }

    let seq = u32::from_be_bytes(data[0..4].try_into().unwrap());
    let ack = u32::from_be_bytes(data[4..8].try_into().unwrap());
    let flags = u16::from_be_bytes(data[8..10].try_into().unwrap());
    let recv_window = u16::from_be_bytes(data[10..12].try_into().unwrap());
    let (ack_flag, syn, fin) = from_flags(flags);

    Ok(SegmentView {
        seq,
        ack,
        ack_flag,
        syn,
        fin,
        recv_window,
        payload: &data[HEADER_SIZE..],
    })
}

fn to_flags(ack: bool, syn: bool, fin: bool) -> u16 {
    (if ack { FLAG_ACK } else { 0 }) | (if syn { FLAG_SYN } else { 0 }) | (if fin { FLAG_FIN } else { 0 })
}

fn from_flags(flags: u16) -> (bool, bool, bool) {
    (flags & FLAG_ACK != 0, flags & FLAG_SYN != 0, flags & FLAG_FIN != 0)
}

/// Sequence-number comparisons that tolerate 32-bit wraparound, same
/// convention as RFC 1323: a number is "less than" another if the gap,
/// taken the short way around, is under 2^31.
pub fn wrapping_lt(lhs: u32, rhs: u32) -> bool {
    lhs.wrapping_sub(rhs) > (1u32 << 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_no_payload() {
        let packed = pack(42, 7, true, false, true, 65000, &[]);
        let view = unpack(&packed).unwrap();

        assert_eq!(view.seq, 42);
        assert_eq!(view.ack, 7);
        assert!(view.ack_flag);
        assert!(!view.syn);
        assert!(view.fin);
        assert_eq!(view.recv_window, 65000);
        assert!(view.payload.is_empty());
    }

    #[test]
    fn round_trip_with_payload() {
        let payload = b"hello lftp";
        let packed = pack(1, 0, false, true, false, 1024, payload);

        assert_eq!(packed.len(), HEADER_SIZE + payload.len());

        let view = unpack(&packed).unwrap();
        assert!(view.syn);
        assert!(!view.ack_flag);
        assert!(!view.fin);
        assert_eq!(view.payload, payload);
    }

    #[test]
    fn flag_byte_layout_is_fixed() {
        assert_eq!(to_flags(true, false, false), 0x80);
        assert_eq!(to_flags(false, true, false), 0x40);
        assert_eq!(to_flags(false, false, true), 0x20);
        assert_eq!(to_flags(true, true, true), 0xE0);
    }

    #[test]
    fn unpack_rejects_short_datagram() {
        let err = unpack(&[0u8; HEADER_SIZE - 1]).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(n) if n == HEADER_SIZE - 1));
    }

    #[test]
    fn wrapping_lt_handles_rollover() {
        assert!(wrapping_lt(u32::MAX, 0));
        assert!(!wrapping_lt(0, u32::MAX));
        assert!(wrapping_lt(10, 20));
        assert!(!wrapping_lt(20, 10));
    }
}
