use crate::skeleton::{NodeId, Transform};

/// Dirty flags for lazy forward kinematics evaluation.
/// Uses a bitset where bit i corresponds to the node with index i.
///
/// Invariant kept by [`NodeCache`]: a dirty node never has a clean descendant.
#[derive(Debug, Clone, Default)]
pub struct DirtyFlags {
    words: Vec<u64>,
    len: usize,
}

impl DirtyFlags {
    /// Create with all `len` nodes marked dirty
    pub fn all_dirty(len: usize) -> Self {
        let mut words = vec![u64::MAX; len.div_ceil(64)];
        if let Some(last) = words.last_mut() {
            let tail = len % 64;
            if tail != 0 {
                *last = (1u64 << tail) - 1;
            }
        }
        Self { words, len }
    }

    /// Check if a node is dirty (needs recomputation)
    #[inline]
    pub fn is_dirty(&self, node: NodeId) -> bool {
        let i = node.index();
        i < self.len && (self.words[i / 64] & (1 << (i % 64))) != 0
    }

    /// Check if any node is dirty
    #[inline]
    pub fn is_any_dirty(&self) -> bool {
        self.words.iter().any(|w| *w != 0)
    }

    #[inline]
    pub fn mark(&mut self, node: NodeId) {
        let i = node.index();
        if i < self.len {
            self.words[i / 64] |= 1 << (i % 64);
        }
    }

    #[inline]
    pub fn clear(&mut self, node: NodeId) {
        let i = node.index();
        if i < self.len {
            self.words[i / 64] &= !(1 << (i % 64));
        }
    }

    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }
}

/// Cache for forward kinematics results
#[derive(Debug, Clone)]
pub struct NodeCache {
    /// Cached world transforms, lazily computed when needed
    pub world: Vec<Transform>,

    /// Dirty flags for lazy evaluation
    pub dirty: DirtyFlags,
}

impl NodeCache {
    pub fn new(len: usize) -> Self {
        Self {
            world: vec![Transform::IDENTITY; len],
            dirty: DirtyFlags::all_dirty(len),
        }
    }

    /// Mark a node and all its descendants dirty.
    ///
    /// Nodes are stored parent-before-child, so a single forward scan reaches
    /// every descendant: a node is dirtied when its parent is.
    pub fn mark_subtree_dirty(&mut self, node: NodeId, parents: &[Option<NodeId>]) {
        self.dirty.mark(node);
        for (i, parent) in parents.iter().enumerate().skip(node.index() + 1) {
            if let Some(parent) = parent {
                if self.dirty.is_dirty(*parent) {
                    self.dirty.mark(NodeId::new(i));
                }
            }
        }
    }
}
