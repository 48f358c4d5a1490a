use std::path::PathBuf;
use std::process::exit;

use lftp::{receive_file, TransportConfig};

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(port), Some(path)) = (args.next(), args.next()) else {
        eprintln!("usage: receiver <port> <output_path>");
        exit(1);
    };

    let port: u16 = port.parse().unwrap_or_else(|e| {
        eprintln!("invalid port {port}: {e}");
        exit(1);
    });
    let path = PathBuf::from(path);

    println!(">>> waiting for a transfer on port {port}");
    if let Err(e) = receive_file(port, &path, TransportConfig::default()) {
        eprintln!(">>> receive failed: {e}");
        exit(1);
    }
    println!(">>> saved to {}", path.display());
}
