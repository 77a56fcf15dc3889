//! Router configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::dialer::{Dialer, RoutingDialer};
use crate::logging::Logger;
use crate::resolver::{
    CachingResolver, Resolver, SystemResolver, DEFAULT_CACHE_CAPACITY, DEFAULT_TTL,
};
use crate::{Error, Result};

/// DNS cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Cache lookups at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum number of cached hostnames
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Lifetime of a cached answer, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cache_capacity: default_cache_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// One range list and the dialer it routes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Range list file, `.gz` for gzip
    pub path: PathBuf,
    /// Name of the dialer handling matched addresses
    pub dialer: String,
    /// Display name, defaults to the path
    #[serde(default)]
    pub name: Option<String>,
}

impl FilterConfig {
    /// The configured name, or the list path when none is given.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Configuration for a [`RoutingDialer`].
///
/// ```yaml
/// dns:
///   cache_capacity: 1024
///   ttl_secs: 300
/// filters:
///   - path: lan.txt
///     dialer: direct
///   - path: cn.txt.gz
///     dialer: direct
///     name: cn
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub dns: DnsConfig,
    /// Filters in priority order
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

impl RouterConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a YAML file. Relative filter paths are taken relative to the
    /// directory holding the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_yaml(&fs::read_to_string(path)?)?;

        if let Some(base) = path.parent() {
            for filter in &mut config.filters {
                if filter.path.is_relative() {
                    filter.path = base.join(&filter.path);
                }
            }
        }
        Ok(config)
    }

    /// Names of every dialer the filters refer to, in first-use order.
    pub fn dialer_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for filter in &self.filters {
            if !names.contains(&filter.dialer.as_str()) {
                names.push(&filter.dialer);
            }
        }
        names
    }

    /// The resolver described by the `dns` section.
    pub fn resolver(&self) -> Arc<dyn Resolver> {
        if self.dns.enabled {
            Arc::new(CachingResolver::with_config(
                SystemResolver::new(),
                self.dns.cache_capacity,
                Duration::from_secs(self.dns.ttl_secs),
            ))
        } else {
            Arc::new(SystemResolver::new())
        }
    }

    /// Load every filter and assemble the router.
    pub fn build(
        &self,
        default: Arc<dyn Dialer>,
        dialers: &HashMap<String, Arc<dyn Dialer>>,
        logger: Logger,
    ) -> Result<RoutingDialer> {
        let mut router = RoutingDialer::new(default)
            .with_resolver(self.resolver())
            .with_logger(logger);

        for filter in &self.filters {
            let dialer = dialers.get(&filter.dialer).ok_or_else(|| {
                Error::Config(format!(
                    "filter {} refers to unknown dialer {:?}",
                    filter.display_name(),
                    filter.dialer
                ))
            })?;
            router.load_named_filter(filter.display_name(), dialer.clone(), &filter.path)?;
        }

        Ok(router)
    }
}
