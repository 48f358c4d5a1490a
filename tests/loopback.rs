//! End-to-end sender/receiver transfers over real loopback UDP sockets.

use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::thread;

use lftp::{send_file, Listener, RendezvousHooks, TransportConfig};

fn transfer(bytes: &[u8]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.bin");
    fs::File::create(&input_path).unwrap().write_all(bytes).unwrap();

    let listener_config = TransportConfig::default();
    let mut listener = Listener::bind(0, listener_config).unwrap();
    let server_endpoint: SocketAddr = listener.local_addr().unwrap();

    let output_path_clone = output_path.clone();
    let receiver = thread::spawn(move || listener.serve_one(&output_path_clone).unwrap());

    send_file(server_endpoint, &input_path, TransportConfig::default(), None).unwrap();
    receiver.join().unwrap();

    fs::read(&output_path).unwrap()
}

#[test]
fn empty_file_round_trips() {
    let received = transfer(&[]);
    assert!(received.is_empty());
}

#[test]
fn file_smaller_than_one_segment_round_trips() {
    let body = b"a reliable transport riding on top of an unreliable one".to_vec();
    let received = transfer(&body);
    assert_eq!(received, body);
}

#[test]
fn file_exactly_one_mss_round_trips() {
    let body = vec![0x5Au8; 1024];
    let received = transfer(&body);
    assert_eq!(received, body);
}

#[test]
fn multi_segment_file_round_trips() {
    let mut body = Vec::with_capacity(3000);
    for i in 0..3000u32 {
        body.push((i % 251) as u8);
    }
    let received = transfer(&body);
    assert_eq!(received, body);
}

#[test]
fn rendezvous_hook_fires_at_fifty_percent_progress() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.bin");
    let body = vec![0x11u8; 1024 * 20];
    fs::File::create(&input_path).unwrap().write_all(&body).unwrap();

    let mut listener = Listener::bind(0, TransportConfig::default()).unwrap();
    let server_endpoint = listener.local_addr().unwrap();

    let output_path_clone = output_path.clone();
    let receiver = thread::spawn(move || listener.serve_one(&output_path_clone).unwrap());

    let (reached_tx, reached_rx) = std::sync::mpsc::channel();
    let (resume_tx, resume_rx) = std::sync::mpsc::channel();
    let hooks = RendezvousHooks {
        reached: reached_tx,
        resume: resume_rx,
    };

    let sender = thread::spawn(move || {
        send_file(server_endpoint, &input_path, TransportConfig::default(), Some(hooks)).unwrap();
    });

    reached_rx.recv_timeout(std::time::Duration::from_secs(5)).expect("rendezvous never fired");
    resume_tx.send(()).unwrap();

    sender.join().unwrap();
    receiver.join().unwrap();

    assert_eq!(fs::read(&output_path).unwrap(), body);
}
