//! In-process query result cache.
//!
//! Entries are addressed by the SHA-256 of the normalized request text plus
//! the canonical JSON of its parameters, so `SELECT  *` and `select *` share
//! an entry and parameter order does not matter. Capacity is strict with LRU
//! eviction; each entry carries a TTL and optional tags.
//!
//! ```
//! use semlayer::cache::{CacheConfig, QueryCache};
//!
//! let cache: QueryCache<u32> = QueryCache::new(CacheConfig::default().with_max_size(2));
//! cache.set("metric:total_mrr", None, 42, None, &["metric:total_mrr".to_string()]);
//! assert_eq!(cache.get("METRIC:total_mrr", None), Some(42));
//! assert_eq!(cache.invalidate_by_tag("metric:total_mrr"), 1);
//! ```

mod clock;
mod key;
mod query;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{cache_key, compute_hash, fingerprint, normalize};
pub use query::{CacheConfig, CacheEntry, CacheMetrics, CacheStats, QueryCache};
