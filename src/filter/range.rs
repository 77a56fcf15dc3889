//! IP range records and the line parser that produces them.

use ipnet::IpNet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::RangeParseError;

/// An IP network: a masked base address plus its mask.
///
/// IPv4 addresses are always stored in 4-byte form, including ones written
/// as IPv4-mapped IPv6. The mask is not required to be a contiguous prefix.
///
/// # Examples
/// ```
/// use ipfilter::filter::IpRange;
///
/// let range: IpRange = "10.0.0.0/8".parse().unwrap();
/// assert!(range.contains("10.1.2.3".parse().unwrap()));
/// assert_eq!(range.prefix_len(), Some(8));
///
/// let range: IpRange = "192.168.0.0 255.255.0.0".parse().unwrap();
/// assert_eq!(range.to_string(), "192.168.0.0/16");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpRange(Repr);

/// Network is always stored already masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Repr {
    V4 { network: u32, mask: u32 },
    V6 { network: u128, mask: u128 },
}

/// Top 96 bits of a 16-byte mask that applies to a mapped IPv4 address.
const MAPPED_MASK_PREFIX: u128 = !(u32::MAX as u128);

/// Collapse IPv4-mapped IPv6 addresses to plain IPv4.
pub fn normalize(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => addr,
        },
        v4 => v4,
    }
}

impl IpRange {
    fn v4(network: u32, mask: u32) -> Self {
        IpRange(Repr::V4 {
            network: network & mask,
            mask,
        })
    }

    fn v6(network: u128, mask: u128) -> Self {
        IpRange(Repr::V6 {
            network: network & mask,
            mask,
        })
    }

    /// Build a range from a CIDR network, folding mapped IPv4 back to IPv4.
    pub fn from_net(net: IpNet) -> Self {
        match net {
            IpNet::V4(n) => Self::v4(u32::from(n.network()), u32::from(n.netmask())),
            IpNet::V6(n) => {
                if n.prefix_len() >= 96 {
                    if let Some(v4) = n.network().to_ipv4_mapped() {
                        return Self::v4(u32::from(v4), u128::from(n.netmask()) as u32);
                    }
                }
                Self::v6(u128::from(n.network()), u128::from(n.netmask()))
            }
        }
    }

    /// Build a range from an address and an arbitrary mask address.
    ///
    /// The mask is taken bit for bit; nothing checks that it is a prefix.
    /// An IPv4 address may carry a 16-byte mask whose top 96 bits are all
    /// ones, in which case its low 32 bits are used.
    pub fn with_mask(addr: IpAddr, mask: IpAddr) -> Result<Self, RangeParseError> {
        match (normalize(addr), normalize(mask)) {
            (IpAddr::V4(a), IpAddr::V4(m)) => Ok(Self::v4(u32::from(a), u32::from(m))),
            (IpAddr::V6(a), IpAddr::V6(m)) => Ok(Self::v6(u128::from(a), u128::from(m))),
            (IpAddr::V4(a), IpAddr::V6(m))
                if u128::from(m) & MAPPED_MASK_PREFIX == MAPPED_MASK_PREFIX =>
            {
                Ok(Self::v4(u32::from(a), u128::from(m) as u32))
            }
            _ => Err(RangeParseError::FamilyMismatch {
                address: addr.to_string(),
                mask: mask.to_string(),
            }),
        }
    }

    /// The masked base address.
    pub fn network(&self) -> IpAddr {
        match self.0 {
            Repr::V4 { network, .. } => IpAddr::V4(Ipv4Addr::from(network)),
            Repr::V6 { network, .. } => IpAddr::V6(Ipv6Addr::from(network)),
        }
    }

    /// The mask, in the same family as the network.
    pub fn mask(&self) -> IpAddr {
        match self.0 {
            Repr::V4 { mask, .. } => IpAddr::V4(Ipv4Addr::from(mask)),
            Repr::V6 { mask, .. } => IpAddr::V6(Ipv6Addr::from(mask)),
        }
    }

    /// Check if this is an IPv4 range.
    pub fn is_ipv4(&self) -> bool {
        matches!(self.0, Repr::V4 { .. })
    }

    /// Prefix length in bits, or `None` when the mask is not contiguous.
    pub fn prefix_len(&self) -> Option<u8> {
        let (ones, zeros, bits) = match self.0 {
            Repr::V4 { mask, .. } => (mask.leading_ones(), mask.trailing_zeros(), 32),
            Repr::V6 { mask, .. } => (mask.leading_ones(), mask.trailing_zeros(), 128),
        };
        if ones + zeros == bits {
            Some(ones as u8)
        } else {
            None
        }
    }

    /// The equivalent `ipnet` network, when the mask is a prefix.
    pub fn to_net(&self) -> Option<IpNet> {
        self.prefix_len()
            .and_then(|len| IpNet::new(self.network(), len).ok())
    }

    /// Test whether `addr` falls inside this range.
    ///
    /// Addresses of the other family never match.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.0, normalize(addr)) {
            (Repr::V4 { network, mask }, IpAddr::V4(a)) => u32::from(a) & mask == network,
            (Repr::V6 { network, mask }, IpAddr::V6(a)) => u128::from(a) & mask == network,
            _ => false,
        }
    }

    /// First network byte.
    pub(crate) fn byte_key(&self) -> u8 {
        match self.0 {
            Repr::V4 { network, .. } => (network >> 24) as u8,
            Repr::V6 { network, .. } => (network >> 120) as u8,
        }
    }

    /// First two network bytes, big-endian.
    pub(crate) fn word_key(&self) -> u16 {
        match self.0 {
            Repr::V4 { network, .. } => (network >> 16) as u16,
            Repr::V6 { network, .. } => (network >> 112) as u16,
        }
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix_len() {
            Some(len) => write!(f, "{}/{}", self.network(), len),
            None => write!(f, "{} {}", self.network(), self.mask()),
        }
    }
}

impl From<IpNet> for IpRange {
    fn from(net: IpNet) -> Self {
        Self::from_net(net)
    }
}

impl FromStr for IpRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(s)
    }
}

/// Parse one range list line.
///
/// Accepts `address/prefix` CIDR notation, falling back to the two-token
/// `address mask` form.
pub fn parse_line(line: &str) -> Result<IpRange, RangeParseError> {
    if let Ok(net) = line.parse::<IpNet>() {
        return Ok(IpRange::from_net(net));
    }
    if line.contains('/') {
        return Err(RangeParseError::InvalidCidr(line.to_string()));
    }

    let mut tokens = line.split_whitespace();
    let address = tokens.next().ok_or(RangeParseError::Empty)?;
    let mask = tokens
        .next()
        .ok_or_else(|| RangeParseError::MissingMask(address.to_string()))?;
    if let Some(extra) = tokens.next() {
        return Err(RangeParseError::TrailingInput(extra.to_string()));
    }

    let addr: IpAddr = address
        .parse()
        .map_err(|_| RangeParseError::InvalidAddress(address.to_string()))?;
    let mask_addr: IpAddr = mask
        .parse()
        .map_err(|_| RangeParseError::InvalidMask(mask.to_string()))?;

    IpRange::with_mask(addr, mask_addr)
}
