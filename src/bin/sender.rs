use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::exit;

use lftp::{send_file, TransportConfig};

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(server), Some(path)) = (args.next(), args.next()) else {
        eprintln!("usage: sender <server_ip:port> <path>");
        exit(1);
    };

    let server_endpoint: SocketAddr = server.parse().unwrap_or_else(|e| {
        eprintln!("invalid server address {server}: {e}");
        exit(1);
    });
    let path = PathBuf::from(path);

    println!(">>> sending {} to {server_endpoint}", path.display());
    if let Err(e) = send_file(server_endpoint, &path, TransportConfig::default(), None) {
        eprintln!(">>> transfer failed: {e}");
        exit(1);
    }
    println!(">>> done");
}
