//! Free port allocation
//!
//! Ports are found by binding to port 0 on loopback and releasing the
//! socket. Another process can claim a port between release and Tor's
//! own bind; that window is accepted.

use std::io;
use std::net::{Ipv4Addr, TcpListener};

/// Reserve `N` distinct free loopback ports.
///
/// All listeners stay bound until every port is read, so the returned
/// ports never collide with each other.
pub fn allocate_ports<const N: usize>() -> io::Result<[u16; N]> {
    let listeners = (0..N)
        .map(|_| TcpListener::bind((Ipv4Addr::LOCALHOST, 0)))
        .collect::<io::Result<Vec<_>>>()?;

    let mut ports = [0u16; N];
    for (slot, listener) in ports.iter_mut().zip(&listeners) {
        *slot = listener.local_addr()?.port();
    }

    Ok(ports)
}
