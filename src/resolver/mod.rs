//! Hostname resolution used by the routing dialer.

mod cache;

pub use cache::{CachingResolver, DEFAULT_CACHE_CAPACITY, DEFAULT_TTL};

use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Arc;

use crate::Result;

/// Maps a hostname to candidate IP addresses.
///
/// Implementations are shared between concurrent dials and must be safe to
/// call from several threads at once.
pub trait Resolver: Send + Sync {
    /// Look up every address for `host`, in preference order.
    fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>>;
}

impl<T: Resolver + ?Sized> Resolver for Arc<T> {
    fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>> {
        (**self).lookup_ip(host)
    }
}

/// Resolver backed by the operating system (`getaddrinfo`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    pub fn new() -> Self {
        SystemResolver
    }
}

impl Resolver for SystemResolver {
    fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>> {
        let mut addrs: Vec<IpAddr> = Vec::new();
        for sa in (host, 0).to_socket_addrs()? {
            let ip = sa.ip();
            if !addrs.contains(&ip) {
                addrs.push(ip);
            }
        }
        Ok(addrs)
    }
}
