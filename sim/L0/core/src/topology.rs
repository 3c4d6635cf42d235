//! Kinematic tree of an articulation.
//!
//! Links are stored in an index array where every parent index is smaller
//! than its children's, so ascending index order is a valid root-to-leaf
//! traversal and descending order a leaf-to-root one. Each node carries a
//! 64-bit path-to-root mask (bit `j` set when link `j` lies on the path from
//! the node to the root, the node included); the mask is derived from the
//! parent array and rebuilt on every edit.

use sim_articulation_types::{ArticulationError, MAX_LINKS, Result};

/// One link's place in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNode {
    /// Parent link (`None` for the root).
    pub parent: Option<usize>,
    /// Direct children in insertion order.
    pub children: Vec<usize>,
    /// Path-to-root mask.
    pub path_to_root: u64,
}

/// Parent/child structure of an articulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    nodes: Vec<LinkNode>,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    /// Tree holding only the root link.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![LinkNode {
                parent: None,
                children: Vec::new(),
                path_to_root: 1,
            }],
        }
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root link cannot be removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node of link `i`.
    #[must_use]
    pub fn node(&self, i: usize) -> Option<&LinkNode> {
        self.nodes.get(i)
    }

    /// Parent of link `i`; `None` for the root or an out-of-range link.
    #[allow(clippy::inline_always)] // Hot path in every sweep
    #[inline(always)]
    #[must_use]
    pub fn parent(&self, i: usize) -> Option<usize> {
        self.nodes.get(i).and_then(|n| n.parent)
    }

    /// Parent of a non-root link. Returns 0 for the root itself.
    ///
    /// Callers pass indices below [`Self::len`].
    #[allow(clippy::inline_always)] // Hot path in every sweep
    #[inline(always)]
    #[must_use]
    pub(crate) fn parent_of(&self, i: usize) -> usize {
        self.nodes[i].parent.unwrap_or(0)
    }

    /// Direct children of link `i`; empty for an out-of-range link.
    #[must_use]
    pub fn children(&self, i: usize) -> &[usize] {
        self.nodes.get(i).map_or(&[][..], |n| n.children.as_slice())
    }

    /// Path-to-root mask of link `i`; zero for an out-of-range link.
    #[must_use]
    pub fn path_to_root(&self, i: usize) -> u64 {
        self.nodes.get(i).map_or(0, |n| n.path_to_root)
    }

    /// Whether `ancestor` lies on the path from `link` to the root
    /// (a link is its own ancestor). False when either index is out of
    /// range.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: usize, link: usize) -> bool {
        u32::try_from(ancestor)
            .ok()
            .and_then(|bit| 1u64.checked_shl(bit))
            .is_some_and(|bit| self.path_to_root(link) & bit != 0)
    }

    /// Deepest link on both paths to the root, or `None` when either link
    /// is out of range.
    #[must_use]
    pub fn common_ancestor(&self, a: usize, b: usize) -> Option<usize> {
        let shared = self.path_to_root(a) & self.path_to_root(b);
        if shared == 0 {
            return None;
        }
        // Ancestors have smaller indices, so the deepest shared link is the
        // highest set bit.
        Some(63 - shared.leading_zeros() as usize)
    }

    /// Number of joints between link `i` and the root; zero for an
    /// out-of-range link.
    #[must_use]
    pub fn depth(&self, i: usize) -> usize {
        (self.path_to_root(i).count_ones() as usize).saturating_sub(1)
    }

    /// Whether link `i` exists and has no children.
    #[must_use]
    pub fn is_leaf(&self, i: usize) -> bool {
        self.nodes.get(i).is_some_and(|n| n.children.is_empty())
    }

    /// Append a link under `parent` and return its index.
    pub fn push(&mut self, parent: usize) -> Result<usize> {
        let count = self.nodes.len();
        if parent >= count {
            return Err(ArticulationError::InvalidParent { parent, count });
        }
        if count >= MAX_LINKS {
            return Err(ArticulationError::TooManyLinks { max: MAX_LINKS });
        }
        let path_to_root = self.nodes[parent].path_to_root | (1u64 << count);
        self.nodes[parent].children.push(count);
        self.nodes.push(LinkNode {
            parent: Some(parent),
            children: Vec::new(),
            path_to_root,
        });
        Ok(count)
    }

    /// Remove leaf link `i`, shifting every later index down by one.
    pub fn remove_leaf(&mut self, i: usize) -> Result<()> {
        let count = self.nodes.len();
        if i >= count {
            return Err(ArticulationError::LinkOutOfRange { index: i, count });
        }
        if i == 0 {
            return Err(ArticulationError::EmptyArticulation);
        }
        if !self.nodes[i].children.is_empty() {
            return Err(ArticulationError::NotALeaf(i));
        }

        let parent = self.parent_of(i);
        self.nodes[parent].children.retain(|&c| c != i);
        self.nodes.remove(i);

        let shift = |j: usize| if j > i { j - 1 } else { j };
        for node in &mut self.nodes {
            node.parent = node.parent.map(shift);
            for child in &mut node.children {
                *child = shift(*child);
            }
        }
        self.rebuild_masks();
        Ok(())
    }

    fn rebuild_masks(&mut self) {
        for j in 0..self.nodes.len() {
            let inherited = self.nodes[j]
                .parent
                .map_or(0, |p| self.nodes[p].path_to_root);
            self.nodes[j].path_to_root = inherited | (1u64 << j);
        }
    }

    /// Check that parents precede children, child lists mirror the parent
    /// array and masks match the parent chain.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        for (j, node) in self.nodes.iter().enumerate() {
            let expected_mask = match node.parent {
                None if j == 0 => 1,
                Some(p) if p < j => self.nodes[p].path_to_root | (1u64 << j),
                _ => return false,
            };
            if node.path_to_root != expected_mask {
                return false;
            }
            if node
                .children
                .iter()
                .any(|&c| c >= self.nodes.len() || self.nodes[c].parent != Some(j))
            {
                return false;
            }
        }
        let listed: usize = self.nodes.iter().map(|n| n.children.len()).sum();
        listed + 1 == self.nodes.len()
    }
}
