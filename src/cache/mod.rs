pub mod store;

pub use store::{CacheError, EvictionStats, FileCache, PendingEntry};
