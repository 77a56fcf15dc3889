//! Direct dialer: plain OS sockets, no proxying.

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use super::{Connection, Dialer};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Any,
    V4,
    V6,
}

impl Family {
    fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Family::Any => true,
            Family::V4 => addr.is_ipv4(),
            Family::V6 => addr.is_ipv6(),
        }
    }
}

fn parse_network(network: &str) -> Result<(Transport, Family)> {
    match network {
        "tcp" => Ok((Transport::Tcp, Family::Any)),
        "tcp4" => Ok((Transport::Tcp, Family::V4)),
        "tcp6" => Ok((Transport::Tcp, Family::V6)),
        "udp" => Ok((Transport::Udp, Family::Any)),
        "udp4" => Ok((Transport::Udp, Family::V4)),
        "udp6" => Ok((Transport::Udp, Family::V6)),
        other => Err(Error::UnsupportedNetwork(other.to_string())),
    }
}

/// Connects straight to the destination.
///
/// Every resolved socket address is tried in order; the first success wins
/// and the last failure is returned otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDialer {
    connect_timeout: Option<Duration>,
}

impl DirectDialer {
    /// Create a dialer with no connect timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each TCP connect attempt by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn connect(&self, transport: Transport, addr: SocketAddr) -> io::Result<Box<dyn Connection>> {
        match transport {
            Transport::Tcp => {
                let stream = match self.connect_timeout {
                    Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
                    None => TcpStream::connect(addr)?,
                };
                Ok(Box::new(stream))
            }
            Transport::Udp => {
                let local: SocketAddr = if addr.is_ipv4() {
                    (Ipv4Addr::UNSPECIFIED, 0).into()
                } else {
                    (Ipv6Addr::UNSPECIFIED, 0).into()
                };
                let socket = UdpSocket::bind(local)?;
                socket.connect(addr)?;
                Ok(Box::new(UdpConnection::new(socket)))
            }
        }
    }
}

impl Dialer for DirectDialer {
    fn dial(&self, network: &str, address: &str) -> Result<Box<dyn Connection>> {
        let (transport, family) = parse_network(network)?;

        let mut last_err = None;
        for addr in address.to_socket_addrs()?.filter(|a| family.accepts(a)) {
            match self.connect(transport, addr) {
                Ok(conn) => return Ok(conn),
                Err(e) => last_err = Some(e),
            }
        }

        Err(Error::Io(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no {} address for {}", network, address),
            )
        })))
    }
}

/// A connected UDP socket exposed as a byte stream, one datagram per call.
#[derive(Debug)]
pub struct UdpConnection {
    socket: UdpSocket,
}

impl UdpConnection {
    /// Wrap an already connected socket.
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }

    /// Get the underlying socket.
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    /// Unwrap the underlying socket.
    pub fn into_socket(self) -> UdpSocket {
        self.socket
    }
}

impl Read for UdpConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf)
    }
}

impl Write for UdpConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_tcp_dial() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut conn = DirectDialer::new()
            .with_timeout(Duration::from_secs(5))
            .dial("tcp", &addr.to_string())
            .unwrap();
        let (mut accepted, _) = listener.accept().unwrap();

        conn.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn test_udp_dial() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        let mut conn = DirectDialer::new().dial("udp4", &addr.to_string()).unwrap();
        conn.write_all(b"hello").unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = server.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_family_filter() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let err = DirectDialer::new().dial("tcp6", &addr.to_string()).err().unwrap();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::AddrNotAvailable),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unsupported_network() {
        let err = DirectDialer::new().dial("unix", "127.0.0.1:80").err().unwrap();
        assert!(matches!(err, Error::UnsupportedNetwork(n) if n == "unix"));
    }
}
