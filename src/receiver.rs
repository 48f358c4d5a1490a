//! Receiver engine: accepts datagrams, reorders them, writes the
//! output file, and emits cumulative ACKs advertising receive-window
//! space.
//!
//! A [`Listener`] multiplexes inbound datagrams by source address, the
//! way the reference `ServerSocket` keeps one `FileReceiver` per
//! `client_address`. [`receive_file`] is the single-transfer entry
//! point used by the bootstrap layer: it drives the listener until the
//! first session reaches its in-order FIN.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::Write;
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;

use log::{info, trace, warn};
use serde::Deserialize;

use crate::codec::{self, MSS};
use crate::config::TransportConfig;
use crate::Error;

#[derive(Deserialize)]
struct SynPayload {
    filename: String,
}

struct ReorderEntry {
    seg_seq: u32,
    payload: Vec<u8>,
    fin: bool,
}

struct Session {
    expected_seq_num: u32,
    reorder_buffer: VecDeque<ReorderEntry>,
    file_size: u64,
    writer: Option<File>,
    first_data_seen: bool,
    finished: bool,
}

impl Session {
    fn new() -> Self {
        Session {
            expected_seq_num: 0,
            reorder_buffer: VecDeque::new(),
            file_size: 0,
            writer: None,
            first_data_seen: false,
            finished: false,
        }
    }

    fn advertised_window(&self, config: &TransportConfig) -> u16 {
        let capacity = config.buffer_segment_amount();
        ((capacity - self.reorder_buffer.len()) * config.mss).min(u16::MAX as usize) as u16
    }
}

/// A bound UDP endpoint that can serve one or more concurrent LFTP
/// receive sessions, keyed by sender address.
pub struct Listener {
    socket: UdpSocket,
    config: TransportConfig,
    sessions: HashMap<SocketAddr, Session>,
}

impl Listener {
    pub fn bind(port: u16, config: TransportConfig) -> Result<Self, Error> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        Ok(Listener {
            socket,
            config,
            sessions: HashMap::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocks, processing one inbound datagram at a time, until some
    /// session completes its transfer; returns that session's source
    /// address.
    pub fn serve_one(&mut self, output_path: &Path) -> Result<SocketAddr, Error> {
        let mut buf = [0u8; MSS + codec::HEADER_SIZE];

        loop {
            let (n, src) = self.socket.recv_from(&mut buf)?;

            let view = match codec::unpack(&buf[..n]) {
                Ok(v) => v,
                Err(e) => {
                    warn!("dropping malformed datagram from {src}: {e}");
                    continue;
                }
            };

            let session = self.sessions.entry(src).or_insert_with(Session::new);
            if let Err(e) = apply_segment(session, &view, output_path, &self.config, src) {
                warn!("dropping datagram from {src}: {e}");
            }

            let ack = codec::pack(0, session.expected_seq_num, true, false, false, session.advertised_window(&self.config), &[]);
            if let Err(e) = self.socket.send_to(&ack, src) {
                warn!("failed to ack {src}: {e}");
            }

            if session.finished {
                self.sessions.remove(&src);
                return Ok(src);
            }
        }
    }
}

fn apply_segment(
    session: &mut Session,
    view: &codec::SegmentView<'_>,
    output_path: &Path,
    config: &TransportConfig,
    src: SocketAddr,
) -> Result<(), Error> {
    if view.syn && !view.fin {
        let announced: SynPayload = serde_json::from_slice(view.payload)?;
        let file = File::create(output_path).map_err(|source| Error::FilesystemError {
            path: output_path.to_path_buf(),
            source,
        })?;
        session.writer = Some(file);
        session.expected_seq_num = view.seq.wrapping_add(view.payload.len() as u32);
        info!("receiving {} from {src}", announced.filename);
        return Ok(());
    }

    if session.reorder_buffer.len() >= config.buffer_segment_amount() || codec::wrapping_lt(view.seq, session.expected_seq_num) {
        return Ok(());
    }

    if !session.first_data_seen {
        session.file_size = serde_json::from_slice(view.payload)?;
        session.first_data_seen = true;
        session.expected_seq_num = view.seq.wrapping_add(view.payload.len() as u32);
        info!("file size is {}", crate::util::format_size(session.file_size));
        return Ok(());
    }

    insert_sorted_dedup(&mut session.reorder_buffer, view.seq, view.payload, view.fin);
    deliver_contiguous(session, output_path)
}

fn insert_sorted_dedup(buffer: &mut VecDeque<ReorderEntry>, seg_seq: u32, payload: &[u8], fin: bool) {
    let mut idx = 0;
    while idx < buffer.len() && codec::wrapping_lt(buffer[idx].seg_seq, seg_seq) {
        idx += 1;
    }
    if idx < buffer.len() && buffer[idx].seg_seq == seg_seq {
        trace!("dropping duplicate segment seq={seg_seq}");
        return;
    }
    buffer.insert(
        idx,
        ReorderEntry {
            seg_seq,
            payload: payload.to_vec(),
            fin,
        },
    );
}

fn deliver_contiguous(session: &mut Session, output_path: &Path) -> Result<(), Error> {
    while let Some(front) = session.reorder_buffer.front() {
        if front.seg_seq != session.expected_seq_num {
            break;
        }
        let entry = session.reorder_buffer.pop_front().unwrap();
        session.expected_seq_num = session.expected_seq_num.wrapping_add(entry.payload.len() as u32);

        if entry.fin {
            if let Some(mut file) = session.writer.take() {
                file.flush().map_err(|source| Error::FilesystemError {
                    path: output_path.to_path_buf(),
                    source,
                })?;
            }
            session.finished = true;
            info!("file received: {}", output_path.display());
        } else if let Some(file) = session.writer.as_mut() {
            file.write_all(&entry.payload).map_err(|source| Error::FilesystemError {
                path: output_path.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Binds `bind_port`, waits for a single LFTP transfer to complete, and
/// writes the file to `output_path`.
pub fn receive_file(bind_port: u16, output_path: &Path, config: TransportConfig) -> Result<(), Error> {
    let mut listener = Listener::bind(bind_port, config)?;
    info!("listening on port {bind_port}");
    listener.serve_one(output_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view<'a>(seq: u32, syn: bool, fin: bool, payload: &'a [u8]) -> codec::SegmentView<'a> {
        codec::SegmentView {
            seq,
            ack: 0,
            ack_flag: false,
            syn,
            fin,
            recv_window: 0,
            payload,
        }
    }

    #[test]
    fn duplicate_segment_is_dropped_without_state_change() {
        let mut buffer = VecDeque::new();
        insert_sorted_dedup(&mut buffer, 10, b"hello", false);
        insert_sorted_dedup(&mut buffer, 10, b"hello", false);

        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn out_of_order_segments_sort_by_sequence() {
        let mut buffer = VecDeque::new();
        insert_sorted_dedup(&mut buffer, 30, b"c", false);
        insert_sorted_dedup(&mut buffer, 10, b"a", false);
        insert_sorted_dedup(&mut buffer, 20, b"b", false);

        let seqs: Vec<u32> = buffer.iter().map(|e| e.seg_seq).collect();
        assert_eq!(seqs, vec![10, 20, 30]);
    }

    #[test]
    fn advertised_window_shrinks_as_buffer_fills() {
        let config = TransportConfig::default();
        let mut session = Session::new();
        // A fully empty buffer computes to exactly capacity * mss = 65536,
        // one past what the 16-bit wire field can carry; it saturates.
        assert_eq!(session.advertised_window(&config), u16::MAX);

        session.reorder_buffer.push_back(ReorderEntry {
            seg_seq: 0,
            payload: vec![0u8; config.mss],
            fin: false,
        });
        assert_eq!(
            session.advertised_window(&config) as usize,
            (config.buffer_segment_amount() - 1) * config.mss
        );
    }

    #[test]
    fn stale_segment_is_ignored() {
        assert!(codec::wrapping_lt(5, 10));
        let v = view(5, false, false, b"stale");
        assert!(codec::wrapping_lt(v.seq, 10));
    }
}
