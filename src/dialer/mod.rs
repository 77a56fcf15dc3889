//! Dialer trait and implementations.

mod direct;
mod routing;

pub use direct::{DirectDialer, UdpConnection};
pub use routing::{FilterPair, Route, RoutingDialer};

use std::io::{Read, Write};
use std::sync::Arc;

use crate::{Error, Result};

/// An established connection, as returned by a [`Dialer`].
pub trait Connection: Read + Write + Send {}

impl<T: Read + Write + Send> Connection for T {}

/// Dialer opens connections to `host:port` addresses.
///
/// `network` names the transport, e.g. `"tcp"` or `"udp"`.
pub trait Dialer: Send + Sync {
    /// Connect to `address` over `network`.
    fn dial(&self, network: &str, address: &str) -> Result<Box<dyn Connection>>;
}

impl<T: Dialer + ?Sized> Dialer for Arc<T> {
    fn dial(&self, network: &str, address: &str) -> Result<Box<dyn Connection>> {
        (**self).dial(network, address)
    }
}

/// Split `host:port` (or `[v6-host]:port`) into host and port.
///
/// # Examples
/// ```
/// use ipfilter::dialer::split_host_port;
///
/// assert_eq!(split_host_port("example.com:443").unwrap(), ("example.com", "443"));
/// assert_eq!(split_host_port("[::1]:80").unwrap(), ("::1", "80"));
/// assert!(split_host_port("example.com").is_err());
/// ```
pub fn split_host_port(address: &str) -> Result<(&str, &str)> {
    let fail = |reason| Error::AddressSplit {
        address: address.to_string(),
        reason,
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| fail("missing port in address"))?;

    let host = match host.strip_prefix('[') {
        Some(inner) => inner
            .strip_suffix(']')
            .ok_or_else(|| fail("missing ']' in address"))?,
        None if host.contains(':') => return Err(fail("too many colons in address")),
        None => host,
    };

    let brackets = &['[', ']'][..];
    if host.contains(brackets) || port.contains(brackets) {
        return Err(fail("unexpected bracket in address"));
    }

    Ok((host, port))
}
