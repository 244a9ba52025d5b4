//! Eviction policy for the buffer pool.
//!
//! - [`LruKReplacer`] - LRU-K, victim chosen by backward-k-distance

mod lru_k;

pub use lru_k::LruKReplacer;
