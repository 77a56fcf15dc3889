//! Address-based routing between dialers.

use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use super::{split_host_port, Connection, Dialer};
use crate::filter::{read_range_list_file, RangeIndex};
use crate::logging::Logger;
use crate::resolver::{CachingResolver, Resolver, SystemResolver};
use crate::{Error, Result};

/// A range index bound to the dialer that handles its addresses.
pub struct FilterPair {
    name: String,
    index: RangeIndex,
    dialer: Arc<dyn Dialer>,
}

impl FilterPair {
    /// Create a new filter pair.
    pub fn new(name: impl Into<String>, index: RangeIndex, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            name: name.into(),
            index,
            dialer,
        }
    }

    /// Get the pair's name (the list path for loaded filters).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the range index.
    pub fn index(&self) -> &RangeIndex {
        &self.index
    }

    /// Get the dialer used for matching destinations.
    pub fn dialer(&self) -> &Arc<dyn Dialer> {
        &self.dialer
    }
}

impl fmt::Debug for FilterPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterPair")
            .field("name", &self.name)
            .field("entries", &self.index.len())
            .finish()
    }
}

/// Where a dial request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// The filter pair at this registration position
    Filter(usize),
    /// The fallback dialer
    Default,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Filter(i) => write!(f, "filter #{}", i),
            Route::Default => write!(f, "default"),
        }
    }
}

/// Picks a dialer for each connection from the destination's IP address.
///
/// Filter pairs are tried in registration order and the first pair whose
/// index contains any resolved address wins, however broad its range.
/// Nothing matching falls through to the default dialer.
///
/// # Examples
/// ```no_run
/// use ipfilter::dialer::{Dialer, DirectDialer, RoutingDialer};
/// use std::sync::Arc;
///
/// let direct = Arc::new(DirectDialer::new());
/// let mut router = RoutingDialer::new(direct.clone());
/// router.load_filter(direct, "/etc/ipfilter/lan.txt").unwrap();
///
/// let conn = router.dial("tcp", "example.com:443");
/// ```
pub struct RoutingDialer {
    default: Arc<dyn Dialer>,
    resolver: Arc<dyn Resolver>,
    filters: Vec<FilterPair>,
    logger: Logger,
}

impl RoutingDialer {
    /// Create a router over `default` with a caching system resolver.
    pub fn new(default: Arc<dyn Dialer>) -> Self {
        Self {
            default,
            resolver: Arc::new(CachingResolver::new(SystemResolver::new())),
            filters: Vec::new(),
            logger: Logger::global("ipfilter"),
        }
    }

    /// Replace the resolver used for hostnames.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the logger.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Load a range list file and register it for `dialer`.
    ///
    /// The pair is named after the path. Nothing is registered if loading
    /// fails.
    pub fn load_filter(&mut self, dialer: Arc<dyn Dialer>, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.load_named_filter(path.display().to_string(), dialer, path)
    }

    /// Like [`load_filter`](Self::load_filter), with an explicit pair name.
    pub fn load_named_filter(
        &mut self,
        name: impl Into<String>,
        dialer: Arc<dyn Dialer>,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let index = read_range_list_file(path, &self.logger)?;
        self.add_filter(name, dialer, index);
        Ok(())
    }

    /// Register an already built index.
    pub fn add_filter(&mut self, name: impl Into<String>, dialer: Arc<dyn Dialer>, index: RangeIndex) {
        self.filters.push(FilterPair::new(name, index, dialer));
    }

    /// Registered pairs, in registration order.
    pub fn filters(&self) -> &[FilterPair] {
        &self.filters
    }

    /// Get the number of registered pairs.
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Candidate addresses for `host`.
    ///
    /// A literal IP is returned as is without consulting the resolver.
    /// Resolver errors are logged and give an empty list.
    pub fn resolve(&self, host: &str) -> Vec<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return vec![ip];
        }
        match self.resolver.lookup_ip(host) {
            Ok(addrs) => addrs,
            Err(e) => {
                self.logger.error(format_args!("lookup {}: {}", host, e));
                Vec::new()
            }
        }
    }

    /// Decide where a dial to `address` would go, without dialing.
    pub fn route(&self, address: &str) -> Result<Route> {
        if self.filters.is_empty() {
            return Ok(Route::Default);
        }

        let (host, _) = split_host_port(address).map_err(|e| {
            self.logger.error(format_args!("{}", e));
            e
        })?;

        let addrs = self.resolve(host);
        if addrs.is_empty() {
            return Err(Error::DnsNotFound(host.to_string()));
        }

        for (i, pair) in self.filters.iter().enumerate() {
            for addr in &addrs {
                if let Some(range) = pair.index.find(*addr) {
                    self.logger.debug(format_args!(
                        "{} matched {} in {}.",
                        addr, range, pair.name
                    ));
                    return Ok(Route::Filter(i));
                }
            }
        }

        self.logger
            .debug(format_args!("{} not match anything.", host));
        Ok(Route::Default)
    }

    /// The dialer a route resolves to.
    pub fn dialer_for(&self, route: Route) -> &Arc<dyn Dialer> {
        match route {
            Route::Filter(i) => self.filters.get(i).map_or(&self.default, |p| &p.dialer),
            Route::Default => &self.default,
        }
    }
}

impl Dialer for RoutingDialer {
    fn dial(&self, network: &str, address: &str) -> Result<Box<dyn Connection>> {
        self.logger.info(format_args!("filter dial: {}", address));
        let route = self.route(address)?;
        self.dialer_for(route).dial(network, address)
    }
}

impl fmt::Debug for RoutingDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingDialer")
            .field("filters", &self.filters)
            .field("logger", &self.logger)
            .finish()
    }
}
