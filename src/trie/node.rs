//! Trie node - immutable once published.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A value stored in the trie: type-erased, shared, thread-safe.
pub(crate) type NodeValue = Arc<dyn Any + Send + Sync>;

/// One node of the copy-on-write trie.
///
/// A node maps characters to shared children and optionally carries a
/// value; a value-carrying node marks the end of a key. Nodes are never
/// mutated after they become reachable from a published [`Trie`](crate::trie::Trie):
/// structural changes clone the node and swap the copy in at the parent.
///
/// `Clone` is shallow on purpose. The children map is copied, but each
/// child and the value are shared by reference count, which is what makes
/// path copying cheap.
#[derive(Default, Clone)]
pub struct TrieNode {
    pub(crate) children: HashMap<char, Arc<TrieNode>>,
    pub(crate) value: Option<NodeValue>,
}

impl TrieNode {
    /// An empty interior node.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Interior node carrying the given children.
    pub(crate) fn with_children(children: HashMap<char, Arc<TrieNode>>) -> Self {
        Self {
            children,
            value: None,
        }
    }

    /// Whether this node terminates a key.
    #[inline]
    pub fn is_value_node(&self) -> bool {
        self.value.is_some()
    }

    /// Whether this node has any children.
    #[inline]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}
