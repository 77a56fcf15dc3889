//! IP range lists: parsing, indexing and loading.

mod index;
mod loader;
mod range;

pub use index::{Bucket, IndexStats, RangeIndex};
pub use loader::{read_range_list, read_range_list_file};
pub use range::{normalize, parse_line, IpRange};
