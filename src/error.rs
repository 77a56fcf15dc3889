//! Error types for ipfilter.

use thiserror::Error;

/// Error type for ipfilter operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A range list line could not be parsed
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: RangeParseError,
    },

    /// Reading or decompressing a range list failed
    #[error("failed to load range list: {0}")]
    Load(#[source] std::io::Error),

    /// Dial address is not in `host:port` form
    #[error("invalid address {address:?}: {reason}")]
    AddressSplit { address: String, reason: &'static str },

    /// Resolution produced no candidate addresses
    #[error("dns not found: {0}")]
    DnsNotFound(String),

    /// Network not understood by the direct dialer
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns `true` when the destination could not be resolved, as opposed
    /// to resolving fine and then failing to connect.
    pub fn is_dns_not_found(&self) -> bool {
        matches!(self, Error::DnsNotFound(_))
    }
}

/// Result type alias for ipfilter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for range list line parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeParseError {
    /// Nothing left after trimming
    #[error("empty range")]
    Empty,

    /// Slash-separated form that is not valid CIDR
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),

    /// Address without a mask token
    #[error("missing mask after address: {0}")]
    MissingMask(String),

    /// Unparsable address token
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// Unparsable mask token
    #[error("invalid mask: {0}")]
    InvalidMask(String),

    /// Address and mask of different families
    #[error("address {address} and mask {mask} belong to different families")]
    FamilyMismatch { address: String, mask: String },

    /// More than two tokens on the line
    #[error("unexpected trailing input: {0}")]
    TrailingInput(String),

    /// Line bytes are not valid UTF-8
    #[error("invalid UTF-8 in line")]
    InvalidUtf8,
}
