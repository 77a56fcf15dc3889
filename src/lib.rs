//! ipfilter - route outbound connections by destination IP range.
//!
//! This crate decides which of several dialers should open a connection,
//! based on whether the destination address falls inside one of a set of
//! configured IP range lists.
//!
//! # Features
//!
//! - **Range lists**: `address/prefix` or `address mask` lines, optionally gzipped
//! - **Bucketed index**: membership tests only scan ranges sharing the
//!   address's leading bytes
//! - **First match wins**: filters are tried in registration order, not by
//!   prefix length
//! - **Caching resolver**: hostnames are resolved once per TTL
//! - **Thread-safe**: a built router is shared freely between threads
//!
//! # Quick Start
//!
//! ```ignore
//! use ipfilter::dialer::{Dialer, DirectDialer, RoutingDialer};
//! use std::sync::Arc;
//!
//! let direct = Arc::new(DirectDialer::new());
//! let proxy: Arc<dyn Dialer> = Arc::new(my_socks_dialer());
//!
//! // Everything goes through the proxy except addresses in cn.txt.gz
//! let mut router = RoutingDialer::new(proxy);
//! router.load_filter(direct, "cn.txt.gz")?;
//!
//! let conn = router.dial("tcp", "example.com:443")?;
//! ```
//!
//! # Range List Format
//!
//! ```text
//! 10.0.0.0/8
//! 192.168.0.0 255.255.0.0
//! ```
//!
//! One range per line, surrounding spaces and line endings ignored, no
//! comments. A single malformed line fails the whole load.

mod error;

pub mod config;
pub mod dialer;
pub mod filter;
pub mod logging;
pub mod resolver;

// Re-export core types
pub use error::{Error, RangeParseError, Result};

pub use config::{DnsConfig, FilterConfig, RouterConfig};
pub use dialer::{Connection, Dialer, DirectDialer, FilterPair, Route, RoutingDialer};
pub use filter::{IpRange, RangeIndex};
pub use logging::Logger;
pub use resolver::{CachingResolver, Resolver, SystemResolver};
