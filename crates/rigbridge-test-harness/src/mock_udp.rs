//! UDP datagram helpers for discovery and bridge tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

/// Send datagrams to `127.0.0.1:port` from an ephemeral socket, with a
/// short gap between them so receive order is deterministic.
pub async fn send_datagrams(port: u16, payloads: &[&[u8]]) {
    let dest: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    send_datagrams_from(dest, payloads).await;
}

/// Send datagrams to an explicit destination.
pub async fn send_datagrams_from(dest: SocketAddr, payloads: &[&[u8]]) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for payload in payloads {
        socket.send_to(payload, dest).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
