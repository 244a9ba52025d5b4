//! Copy-on-write trie.
//!
//! A persistent character-keyed map. Mutations never touch published
//! nodes: [`Trie::put`] and [`Trie::remove`] copy the nodes on the key
//! path and share everything else with the previous version, so old tries
//! stay valid and cheap to keep.
//!
//! # Components
//! - [`TrieNode`] - Immutable node: children map + optional type-erased
//!   value
//! - [`Trie`] - The persistent map; a value type wrapping a shared root
//! - [`TrieStore`] - Concurrent front-end: atomic snapshot publishing,
//!   single-writer serialization
//! - [`ValueGuard`] - Keeps a snapshot alive while a caller reads one
//!   value out of it

mod node;
mod store;
mod trie;

pub use node::TrieNode;
pub use store::{TrieStore, ValueGuard};
pub use trie::Trie;
