//! Sender engine: segments a file, drives the send window, runs
//! congestion control, and manages retransmissions.
//!
//! Four activities cooperate over one `Mutex`-protected [`SenderInner`],
//! each on its own OS thread: a producer reads the file and appends
//! segments, a transmitter slides the send window, an ack-receiver
//! blocks on the socket and is the only activity allowed to advance
//! `send_base`, and a timeout watcher polls the retransmission clock.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use serde::Serialize;

use crate::codec::{self, MSS};
use crate::config::TransportConfig;
use crate::congestion::{CongestionAction, CongestionEvent, CongestionState};
use crate::rtt::RttEstimator;
use crate::Error;

/// Optional pair of synchronization primitives a test harness can use
/// to pause a transfer the first time it crosses 50% progress. Not a
/// protocol feature: a debugging/testing hook only.
pub struct RendezvousHooks {
    pub reached: Sender<()>,
    pub resume: Receiver<()>,
}

#[derive(Debug)]
struct SendEntry {
    seg_seq: u32,
    payload: Vec<u8>,
    syn: bool,
    fin: bool,
    sent: bool,
    send_timestamp: Option<Instant>,
}

impl SendEntry {
    fn len(&self) -> u32 {
        self.payload.len() as u32
    }
}

struct SenderInner {
    initial_seq_num: u32,
    send_base: u32,
    next_byte_seq_num: u32,
    file_size: u64,
    buffer: VecDeque<SendEntry>,
    recv_window_size: u32,
    congestion: CongestionState,
    dup_ack_count: u32,
    rtt: RttEstimator,
    start_time: Instant,
    consecutive_timeouts: u32,
    progress_step: u32,
}

struct Shared {
    inner: Mutex<SenderInner>,
    running: AtomicBool,
    failure: Mutex<Option<Error>>,
    config: TransportConfig,
}

#[derive(Serialize)]
struct SynPayload<'a> {
    filename: &'a str,
}

/// Transfers `local_path` to `server_endpoint` over a fresh ephemeral
/// UDP socket, blocking until the FIN has been acknowledged.
///
/// Fails with [`Error::TransferFailed`] if the watchdog trips (too many
/// consecutive timeouts with no progress) or [`Error::FilesystemError`]
/// if `local_path` cannot be opened.
pub fn send_file(
    server_endpoint: SocketAddr,
    local_path: &Path,
    config: TransportConfig,
    rendezvous: Option<RendezvousHooks>,
) -> Result<(), Error> {
    let file = File::open(local_path).map_err(|source| Error::FilesystemError {
        path: local_path.to_path_buf(),
        source,
    })?;
    let file_size = file.metadata().map_err(|source| Error::FilesystemError {
        path: local_path.to_path_buf(),
        source,
    })?.len();
    let filename = local_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_read_timeout(Some(Duration::from_millis(100)))?;
    socket.connect(server_endpoint)?;
    let socket = Arc::new(socket);

    let initial_seq_num: u32 = rand::random::<u16>() as u32;

    let mut inner = SenderInner {
        initial_seq_num,
        send_base: initial_seq_num,
        next_byte_seq_num: initial_seq_num,
        file_size,
        buffer: VecDeque::new(),
        recv_window_size: 0,
        congestion: CongestionState::new(config.mss as u32, config.initial_ss_threshold),
        dup_ack_count: 0,
        rtt: RttEstimator::new(config.initial_timeout, config.alpha, config.beta, config.gamma),
        start_time: Instant::now(),
        consecutive_timeouts: 0,
        progress_step: 1,
    };

    // SYN: announces the filename.
    let syn_payload = serde_json::to_vec(&SynPayload { filename: &filename })?;
    push_entry(&mut inner, syn_payload, true, false);

    // First post-SYN segment: announces the declared file size.
    let size_payload = serde_json::to_vec(&file_size)?;
    push_entry(&mut inner, size_payload, false, false);

    info!("sending {} ({}) to {}", filename, crate::util::format_size(file_size), server_endpoint);

    let shared = Arc::new(Shared {
        inner: Mutex::new(inner),
        running: AtomicBool::new(true),
        failure: Mutex::new(None),
        config,
    });

    let producer = {
        let shared = shared.clone();
        let reader = BufReader::new(file);
        thread::spawn(move || producer_loop(shared, reader))
    };
    let transmitter = {
        let shared = shared.clone();
        let socket = socket.clone();
        thread::spawn(move || transmitter_loop(shared, socket))
    };
    let watchdog = {
        let shared = shared.clone();
        let socket = socket.clone();
        thread::spawn(move || timeout_loop(shared, socket))
    };

    // The ack receiver runs on the calling thread: it is the only
    // activity allowed to decide the session is over, so send_file can
    // return as soon as it does.
    ack_receiver_loop(&shared, &socket, rendezvous);

    producer.join().expect("producer thread panicked");
    transmitter.join().expect("transmitter thread panicked");
    watchdog.join().expect("watchdog thread panicked");

    match shared.failure.lock().unwrap().take() {
        Some(err) => Err(err),
        None => {
            info!("transfer complete");
            Ok(())
        }
    }
}

fn push_entry(inner: &mut SenderInner, payload: Vec<u8>, syn: bool, fin: bool) {
    let seg_seq = inner.next_byte_seq_num;
    inner.next_byte_seq_num = inner.next_byte_seq_num.wrapping_add(payload.len() as u32);
    inner.buffer.push_back(SendEntry {
        seg_seq,
        payload,
        syn,
        fin,
        sent: false,
        send_timestamp: None,
    });
}

fn producer_loop(shared: Arc<Shared>, mut reader: BufReader<File>) {
    loop {
        if !shared.running.load(Ordering::Acquire) {
            return;
        }

        let has_room = {
            let inner = shared.inner.lock().unwrap();
            inner.buffer.len() < shared.config.buffer_segment_amount()
        };
        if !has_room {
            thread::sleep(Duration::from_millis(2));
            continue;
        }

        let mut chunk = vec![0u8; shared.config.mss];
        let n = match reader.read(&mut chunk) {
            Ok(n) => n,
            Err(e) => {
                warn!("read error while segmenting file: {e}");
                return;
            }
        };

        let mut inner = shared.inner.lock().unwrap();
        if n == 0 {
            push_entry(&mut inner, vec![b'0'], false, true);
            trace!("producer reached EOF, appended FIN");
            return;
        }
        chunk.truncate(n);
        push_entry(&mut inner, chunk, false, false);
    }
}

fn transmitter_loop(shared: Arc<Shared>, socket: Arc<UdpSocket>) {
    loop {
        if !shared.running.load(Ordering::Acquire) {
            return;
        }

        {
            let mut inner = shared.inner.lock().unwrap();
            let send_base = inner.send_base;
            let window = inner.recv_window_size.min(inner.congestion.cwnd);
            let mut sent_any = false;

            for entry in inner.buffer.iter_mut() {
                if entry.sent {
                    continue;
                }
                if entry.seg_seq.wrapping_sub(send_base) > window {
                    break;
                }
                transmit(&socket, entry);
                entry.sent = true;
                entry.send_timestamp = Some(Instant::now());
                sent_any = true;
            }
            if sent_any {
                inner.start_time = Instant::now();
            }
        }

        thread::sleep(Duration::from_millis(1));
    }
}

fn transmit(socket: &UdpSocket, entry: &SendEntry) {
    let packed = codec::pack(entry.seg_seq, 0, false, entry.syn, entry.fin, 0, &entry.payload);
    if let Err(e) = socket.send(&packed) {
        warn!("send failed for seq {}: {e}", entry.seg_seq);
    } else {
        trace!("sent seq={} syn={} fin={} len={}", entry.seg_seq, entry.syn, entry.fin, entry.payload.len());
    }
}

fn retransmit_send_base(inner: &mut SenderInner, socket: &UdpSocket) {
    let send_base = inner.send_base;
    if let Some(entry) = inner.buffer.iter_mut().find(|e| e.seg_seq == send_base) {
        entry.send_timestamp = Some(Instant::now());
        transmit(socket, entry);
    }
    inner.start_time = Instant::now();
}

fn timeout_loop(shared: Arc<Shared>, socket: Arc<UdpSocket>) {
    loop {
        if !shared.running.load(Ordering::Acquire) {
            return;
        }
        thread::sleep(Duration::from_millis(10));

        let mut inner = shared.inner.lock().unwrap();
        if inner.buffer.is_empty() {
            continue;
        }
        if inner.start_time.elapsed() <= inner.rtt.timeout() {
            continue;
        }

        let mss = shared.config.mss as u32;
        inner.congestion.apply(CongestionEvent::Timeout, mss);
        inner.dup_ack_count = 0;
        debug!(
            "timeout: cwnd={} ssthresh={} status={:?}",
            inner.congestion.cwnd, inner.congestion.ssthresh, inner.congestion.status
        );
        retransmit_send_base(&mut inner, &socket);

        inner.consecutive_timeouts += 1;
        if inner.consecutive_timeouts > shared.config.max_consecutive_timeouts {
            *shared.failure.lock().unwrap() = Some(Error::TransferFailed(format!(
                "{} consecutive timeouts with send_base stuck at {}",
                inner.consecutive_timeouts, inner.send_base
            )));
            shared.running.store(false, Ordering::Release);
            return;
        }
    }
}

fn ack_receiver_loop(shared: &Arc<Shared>, socket: &UdpSocket, rendezvous: Option<RendezvousHooks>) {
    let mut rendezvous = rendezvous;
    let mut rendezvous_fired = false;
    let mut buf = [0u8; MSS + codec::HEADER_SIZE];

    while shared.running.load(Ordering::Acquire) {
        let n = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                continue;
            }
            Err(e) => {
                warn!("ack receive error: {e}");
                continue;
            }
        };

        let view = match codec::unpack(&buf[..n]) {
            Ok(v) => v,
            Err(e) => {
                warn!("dropping malformed ack datagram: {e}");
                continue;
            }
        };
        if !view.ack_flag {
            continue;
        }

        let mss = shared.config.mss as u32;
        let mut inner = shared.inner.lock().unwrap();

        if view.ack == inner.send_base {
            inner.dup_ack_count += 1;
            let count = inner.dup_ack_count;
            let action = inner.congestion.apply(CongestionEvent::DupAck { count }, mss);
            if action == CongestionAction::Retransmit {
                debug!(
                    "triple dup-ack: cwnd={} ssthresh={} status={:?}",
                    inner.congestion.cwnd, inner.congestion.ssthresh, inner.congestion.status
                );
                retransmit_send_base(&mut inner, socket);
            }
        } else if codec::wrapping_lt(inner.send_base, view.ack) {
            inner.send_base = view.ack;
            inner.dup_ack_count = 0;
            inner.consecutive_timeouts = 0;
            inner.congestion.apply(CongestionEvent::NewAck, mss);

            let send_base = inner.send_base;
            while let Some(front) = inner.buffer.front() {
                if codec::wrapping_lt(front.seg_seq, send_base) {
                    let entry = inner.buffer.pop_front().unwrap();
                    if let Some(sent) = entry.send_timestamp {
                        inner.rtt.sample(sent.elapsed());
                    }
                    if entry.fin && !entry.syn && inner.buffer.is_empty() {
                        shared.running.store(false, Ordering::Release);
                    }
                } else {
                    break;
                }
            }

            report_progress(&mut inner, &mut rendezvous, &mut rendezvous_fired);
        }

        inner.recv_window_size = view.recv_window as u32;
        inner.start_time = Instant::now();
    }
}

fn report_progress(inner: &mut SenderInner, rendezvous: &mut Option<RendezvousHooks>, fired: &mut bool) {
    if inner.file_size == 0 {
        return;
    }

    let acked = inner.send_base.wrapping_sub(inner.initial_seq_num) as u64;
    let prog_interval = 5u32;
    let before = inner.progress_step;

    while (acked as f64 / inner.file_size as f64) >= (inner.progress_step * prog_interval) as f64 / 100.0 {
        inner.progress_step += 1;
    }

    if !*fired && (inner.progress_step - 1) * prog_interval == 50 {
        *fired = true;
        if let Some(hooks) = rendezvous.as_ref() {
            let _ = hooks.reached.send(());
            let _ = hooks.resume.recv();
        }
    }

    if inner.progress_step > before {
        info!("sent {}%", (inner.progress_step - 1) * prog_interval);
        debug!(
            "EstimatedRTT={:.2} DeviationRTT={:.2} TimeoutInterval={:.2}",
            inner.rtt.estimated_rtt(),
            inner.rtt.deviation_rtt(),
            inner.rtt.timeout().as_secs_f64()
        );
    }
}
