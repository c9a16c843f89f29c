//! Hash-consing table for structure nodes.

use std::collections::HashMap;

use super::StructureNode;

/// Maps content hash to the first node seen with that hash.
///
/// Owned by one evaluation; repeated shapes share a single allocation.
#[derive(Debug, Default)]
pub struct Interner {
    nodes: HashMap<String, StructureNode>,
    hits: usize,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical node for `node`'s hash, registering it if new.
    pub fn intern(&mut self, node: StructureNode) -> StructureNode {
        if node.is_unknown() {
            return node;
        }
        if let Some(existing) = self.nodes.get(node.hash()) {
            self.hits += 1;
            return existing.clone();
        }
        self.nodes.insert(node.hash().to_string(), node.clone());
        node
    }

    pub fn get(&self, hash: &str) -> Option<&StructureNode> {
        self.nodes.get(hash)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of `intern` calls answered from the table.
    pub fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::structure::Flags;
    use std::sync::Arc;

    #[test]
    fn test_intern_shares_equal_nodes() {
        let mut interner = Interner::new();
        let a = interner.intern(StructureNode::string(None, Flags::REQUIRED));
        let b = interner.intern(StructureNode::string(None, Flags::REQUIRED));

        let (StructureNode::String(a), StructureNode::String(b)) = (a, b) else {
            panic!("expected strings");
        };
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
        assert_eq!(interner.hits(), 1);
    }

    #[test]
    fn test_unknown_is_not_stored() {
        let mut interner = Interner::new();
        interner.intern(StructureNode::Unknown);
        assert!(interner.is_empty());
    }
}
