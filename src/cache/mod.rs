//! Cache module for persisting fetched data to disk
//!
//! `ExpiringCache` is a single-value, single-file store with an optional TTL
//! that is checked lazily on read. `Memoized` wraps an async producer so that
//! repeated calls reuse the stored result until it expires. Corrupt or missing
//! cache files are always treated as a miss; only writes report errors.

mod memoize;
mod store;

pub use memoize::{Lookup, MemoizeError, MemoizeOptions, Memoized};
pub use store::{CacheError, ExpiringCache};
