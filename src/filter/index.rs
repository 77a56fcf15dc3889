//! Bucketed IP range index.

use ahash::AHashMap;
use std::fmt;
use std::net::IpAddr;

use super::range::{normalize, IpRange};

/// Which bucket a range is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Prefix shorter than 8 bits, or a non-contiguous mask
    Coarse,
    /// Prefix in `[8, 16)`, keyed by the first byte
    Byte,
    /// Prefix of 16 bits or more, keyed by the first two bytes
    Word,
}

/// Membership index over a set of IP ranges.
///
/// Ranges are split by prefix length so that a query only scans the ranges
/// sharing its first one or two address bytes, plus the short-prefix
/// leftovers. Answers are the same as a linear scan over every range.
///
/// # Examples
/// ```
/// use ipfilter::filter::RangeIndex;
///
/// let index: RangeIndex = ["10.0.0.0/8", "1.2.3.4/32"]
///     .iter()
///     .map(|s| s.parse().unwrap())
///     .collect();
///
/// assert!(index.contains("10.1.2.3".parse().unwrap()));
/// assert!(!index.contains("1.2.3.5".parse().unwrap()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RangeIndex {
    coarse: Vec<IpRange>,
    by_byte: AHashMap<u8, Vec<IpRange>>,
    by_word: AHashMap<u16, Vec<IpRange>>,
    len: usize,
}

/// Entry and bucket counts for a [`RangeIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub entries: usize,
    pub coarse_ranges: usize,
    pub byte_keys: usize,
    pub byte_ranges: usize,
    pub word_keys: usize,
    pub word_ranges: usize,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} record(s), {} byte key(s) ({} ranges), {} word key(s) ({} ranges) and {} unindexed",
            self.entries,
            self.byte_keys,
            self.byte_ranges,
            self.word_keys,
            self.word_ranges,
            self.coarse_ranges
        )
    }
}

impl RangeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// The bucket a range is assigned to, decided by prefix length alone.
    pub fn bucket_for(range: &IpRange) -> Bucket {
        match range.prefix_len() {
            Some(len) if len >= 16 => Bucket::Word,
            Some(len) if len >= 8 => Bucket::Byte,
            _ => Bucket::Coarse,
        }
    }

    /// Add a range to the bucket its prefix length selects.
    pub fn insert(&mut self, range: IpRange) {
        match Self::bucket_for(&range) {
            Bucket::Coarse => self.coarse.push(range),
            Bucket::Byte => self.by_byte.entry(range.byte_key()).or_default().push(range),
            Bucket::Word => self.by_word.entry(range.word_key()).or_default().push(range),
        }
        self.len += 1;
    }

    /// Test whether any range contains `addr`.
    ///
    /// Word bucket first, then byte bucket, then the coarse list.
    pub fn contains(&self, addr: IpAddr) -> bool {
        let [b0, b1] = leading_bytes(normalize(addr));

        if let Some(ranges) = self.by_word.get(&u16::from_be_bytes([b0, b1])) {
            if ranges.iter().any(|r| r.contains(addr)) {
                return true;
            }
        }

        if let Some(ranges) = self.by_byte.get(&b0) {
            if ranges.iter().any(|r| r.contains(addr)) {
                return true;
            }
        }

        self.coarse.iter().any(|r| r.contains(addr))
    }

    /// Like [`contains`](Self::contains), but returns the matching range.
    pub fn find(&self, addr: IpAddr) -> Option<&IpRange> {
        let [b0, b1] = leading_bytes(normalize(addr));

        self.by_word
            .get(&u16::from_be_bytes([b0, b1]))
            .and_then(|ranges| ranges.iter().find(|r| r.contains(addr)))
            .or_else(|| {
                self.by_byte
                    .get(&b0)
                    .and_then(|ranges| ranges.iter().find(|r| r.contains(addr)))
            })
            .or_else(|| self.coarse.iter().find(|r| r.contains(addr)))
    }

    /// Number of ranges inserted.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no range has been inserted.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get entry and key counts per bucket.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.len,
            coarse_ranges: self.coarse.len(),
            byte_keys: self.by_byte.len(),
            byte_ranges: self.by_byte.values().map(Vec::len).sum(),
            word_keys: self.by_word.len(),
            word_ranges: self.by_word.values().map(Vec::len).sum(),
        }
    }
}

fn leading_bytes(addr: IpAddr) -> [u8; 2] {
    match addr {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            [o[0], o[1]]
        }
        IpAddr::V6(v6) => {
            let o = v6.octets();
            [o[0], o[1]]
        }
    }
}

impl FromIterator<IpRange> for RangeIndex {
    fn from_iter<I: IntoIterator<Item = IpRange>>(iter: I) -> Self {
        let mut index = RangeIndex::new();
        index.extend(iter);
        index
    }
}

impl Extend<IpRange> for RangeIndex {
    fn extend<I: IntoIterator<Item = IpRange>>(&mut self, iter: I) {
        for range in iter {
            self.insert(range);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn index_of(lines: &[&str]) -> RangeIndex {
        lines.iter().map(|l| l.parse::<IpRange>().unwrap()).collect()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_byte_bucket_match() {
        let index = index_of(&["10.0.0.0/8"]);
        assert!(index.contains(ip("10.1.2.3")));
        assert!(!index.contains(ip("11.0.0.1")));
    }

    #[test]
    fn test_host_route_match() {
        let index = index_of(&["1.2.3.4/32"]);
        assert!(index.contains(ip("1.2.3.4")));
        assert!(!index.contains(ip("1.2.3.5")));
    }

    #[test]
    fn test_coarse_bucket_match() {
        let index = index_of(&["0.0.0.0/4"]);
        assert!(index.contains(ip("15.0.0.1")));
        assert!(!index.contains(ip("16.0.0.1")));
    }

    #[test]
    fn test_classification() {
        for (line, bucket) in [
            ("0.0.0.0/0", Bucket::Coarse),
            ("0.0.0.0/7", Bucket::Coarse),
            ("10.0.0.0/8", Bucket::Byte),
            ("10.0.0.0/15", Bucket::Byte),
            ("10.0.0.0/16", Bucket::Word),
            ("10.0.0.1/32", Bucket::Word),
            ("10.0.0.0 255.0.255.0", Bucket::Coarse),
            ("2001:db8::/32", Bucket::Word),
        ] {
            let range: IpRange = line.parse().unwrap();
            assert_eq!(RangeIndex::bucket_for(&range), bucket, "{}", line);
        }

        let index = index_of(&["0.0.0.0/4", "10.0.0.0/8", "11.0.0.0/9", "10.1.0.0/16", "10.1.2.0/24"]);
        assert_eq!(
            index.stats(),
            IndexStats {
                entries: 5,
                coarse_ranges: 1,
                byte_keys: 2,
                byte_ranges: 2,
                word_keys: 1,
                word_ranges: 2,
            }
        );
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_non_contiguous_mask_lands_in_coarse() {
        let index = index_of(&["10.0.0.0 255.0.255.0"]);
        assert_eq!(index.stats().coarse_ranges, 1);
        assert!(index.contains(ip("10.99.0.1")));
        assert!(!index.contains(ip("10.99.1.1")));
    }

    #[test]
    fn test_mapped_query_address() {
        let index = index_of(&["192.168.0.0/16"]);
        assert!(index.contains(ip("::ffff:192.168.10.1")));
    }

    #[test]
    fn test_ipv6_ranges() {
        let index = index_of(&["2001:db8::/32", "fc00::/7", "2400:cb00::/12"]);
        assert!(index.contains(ip("2001:db8::1")));
        assert!(index.contains(ip("fd12::1")));
        assert!(index.contains(ip("2400:cb00::1")));
        assert!(!index.contains(ip("2001:4860::1")));
        // 0x20 0x01 as IPv4 is 32.1.x.x, which must not hit the IPv6 range
        assert!(!index.contains(ip("32.1.13.184")));
    }

    #[test]
    fn test_find_returns_most_bucketed_first() {
        let index = index_of(&["0.0.0.0/1", "10.0.0.0/8", "10.1.0.0/16"]);
        assert_eq!(index.find(ip("10.1.0.1")).unwrap().to_string(), "10.1.0.0/16");
        assert_eq!(index.find(ip("10.2.0.1")).unwrap().to_string(), "10.0.0.0/8");
        assert_eq!(index.find(ip("12.0.0.1")).unwrap().to_string(), "0.0.0.0/1");
        assert!(index.find(ip("200.0.0.1")).is_none());
    }

    #[test]
    fn test_empty_index() {
        let index = RangeIndex::new();
        assert!(index.is_empty());
        assert!(!index.contains(ip("1.1.1.1")));
    }

    /// xorshift, enough to spread ranges over the address space
    fn next(state: &mut u64) -> u64 {
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        *state
    }

    #[test]
    fn test_matches_linear_scan() {
        let mut state = 0x9e37_79b9_7f4a_7c15u64;
        let mut ranges = Vec::new();
        for _ in 0..2000 {
            let addr = Ipv4Addr::from((next(&mut state) >> 32) as u32);
            let prefix = (next(&mut state) % 33) as u8;
            let net = ipnet::Ipv4Net::new(addr, prefix).unwrap();
            ranges.push(IpRange::from_net(net.into()));
        }
        // a few garbage masks too
        for _ in 0..20 {
            let addr = Ipv4Addr::from((next(&mut state) >> 32) as u32);
            let mask = Ipv4Addr::from((next(&mut state) >> 32) as u32);
            ranges.push(IpRange::with_mask(addr.into(), mask.into()).unwrap());
        }

        let index: RangeIndex = ranges.iter().copied().collect();
        assert_eq!(index.len(), ranges.len());

        for _ in 0..20_000 {
            let addr = IpAddr::V4(Ipv4Addr::from((next(&mut state) >> 32) as u32));
            let linear = ranges.iter().any(|r| r.contains(addr));
            assert_eq!(index.contains(addr), linear, "{}", addr);
        }
        // every network address is a member
        for range in &ranges {
            assert!(index.contains(range.network()));
        }
    }
}
