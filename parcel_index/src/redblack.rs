//! Red-black tree ordered by an `f64` key.
//!
//! Nodes live in a `Vec` arena and link to each other by index, so parent
//! back-pointers need no shared ownership. The arena owns every node and is
//! dropped as a unit.

use tracing::trace;

use crate::{IndexError, Keyed};

/// Node color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Red node; never has a red child.
    Red,
    /// Black node; counted by the black-height.
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

#[derive(Debug)]
struct RbNode<T> {
    key: f64,
    item: T,
    color: Color,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// Balanced binary search tree. Equal keys are kept, in insertion order.
#[derive(Debug)]
pub struct RedBlackTree<T> {
    nodes: Vec<RbNode<T>>,
    root: Option<NodeId>,
}

impl<T> Default for RedBlackTree<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }
}

impl<T> RedBlackTree<T> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> &RbNode<T> {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut RbNode<T> {
        &mut self.nodes[id.0]
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    fn is_red(&self, id: Option<NodeId>) -> bool {
        id.is_some_and(|n| self.node(n).color == Color::Red)
    }

    /// Rotate `x` down to the left; its right child takes its place.
    fn rotate_left(&mut self, x: NodeId) {
        let Some(y) = self.node(x).right else {
            panic!("rotate_left: node {x:?} has no right child");
        };
        let moved = self.node(y).left;
        self.node_mut(x).right = moved;
        if let Some(m) = moved {
            self.node_mut(m).parent = Some(x);
        }
        let above = self.node(x).parent;
        self.node_mut(y).parent = above;
        match above {
            None => self.root = Some(y),
            Some(p) if self.node(p).left == Some(x) => self.node_mut(p).left = Some(y),
            Some(p) => self.node_mut(p).right = Some(y),
        }
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);
        trace!(pivot = x.0, "rotate left");
    }

    /// Rotate `x` down to the right; its left child takes its place.
    fn rotate_right(&mut self, x: NodeId) {
        let Some(y) = self.node(x).left else {
            panic!("rotate_right: node {x:?} has no left child");
        };
        let moved = self.node(y).right;
        self.node_mut(x).left = moved;
        if let Some(m) = moved {
            self.node_mut(m).parent = Some(x);
        }
        let above = self.node(x).parent;
        self.node_mut(y).parent = above;
        match above {
            None => self.root = Some(y),
            Some(p) if self.node(p).right == Some(x) => self.node_mut(p).right = Some(y),
            Some(p) => self.node_mut(p).left = Some(y),
        }
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);
        trace!(pivot = x.0, "rotate right");
    }

    /// Restore the red-black invariants after `node` was attached as a red leaf.
    fn rebalance(&mut self, mut node: NodeId) {
        while let Some(parent) = self.parent(node) {
            if self.node(parent).color != Color::Red {
                break;
            }
            let Some(grandparent) = self.parent(parent) else {
                panic!("red node {parent:?} is the root");
            };

            if self.node(grandparent).left == Some(parent) {
                let uncle = self.node(grandparent).right;
                if self.is_red(uncle) {
                    self.recolor_around(parent, uncle, grandparent);
                    node = grandparent;
                    continue;
                }
                if self.node(parent).right == Some(node) {
                    node = parent;
                    self.rotate_left(node);
                }
                self.recolor_for_rotation(node, grandparent);
                self.rotate_right(grandparent);
            } else {
                let uncle = self.node(grandparent).left;
                if self.is_red(uncle) {
                    self.recolor_around(parent, uncle, grandparent);
                    node = grandparent;
                    continue;
                }
                if self.node(parent).left == Some(node) {
                    node = parent;
                    self.rotate_right(node);
                }
                self.recolor_for_rotation(node, grandparent);
                self.rotate_left(grandparent);
            }
        }
        if let Some(root) = self.root {
            self.node_mut(root).color = Color::Black;
        }
    }

    /// Red uncle: push the red up to the grandparent.
    fn recolor_around(&mut self, parent: NodeId, uncle: Option<NodeId>, grandparent: NodeId) {
        self.node_mut(parent).color = Color::Black;
        if let Some(u) = uncle {
            self.node_mut(u).color = Color::Black;
        }
        self.node_mut(grandparent).color = Color::Red;
    }

    fn recolor_for_rotation(&mut self, node: NodeId, grandparent: NodeId) {
        let Some(parent) = self.parent(node) else {
            panic!("node {node:?} lost its parent during rebalancing");
        };
        self.node_mut(parent).color = Color::Black;
        self.node_mut(grandparent).color = Color::Red;
    }

    fn find(&self, key: f64) -> Option<NodeId> {
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let node = self.node(id);
            if node.key == key {
                return Some(id);
            }
            cursor = if key < node.key { node.left } else { node.right };
        }
        None
    }

    /// Any item whose key equals `key`.
    pub fn search(&self, key: f64) -> Option<&T> {
        self.find(key).map(|id| &self.node(id).item)
    }

    /// Color of a node holding `key`, if any.
    pub fn color_of(&self, key: f64) -> Option<Color> {
        self.find(key).map(|id| self.node(id).color)
    }

    /// Items with `min <= key <= max`, ascending; ties keep insertion order.
    pub fn price_range(&self, min: f64, max: f64) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_range(self.root, min, max, &mut out);
        out
    }

    fn collect_range<'a>(&'a self, id: Option<NodeId>, min: f64, max: f64, out: &mut Vec<&'a T>) {
        let Some(id) = id else {
            return;
        };
        let node = self.node(id);
        // Rotations can lift a later equal key above an earlier one, so ties
        // may sit in either subtree.
        if min <= node.key {
            self.collect_range(node.left, min, max, out);
        }
        if min <= node.key && node.key <= max {
            out.push(&node.item);
        }
        if max >= node.key {
            self.collect_range(node.right, min, max, out);
        }
    }

    /// In-order iterator over items and their colors.
    pub fn iter(&self) -> Iter<'_, T> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left_spine(self.root);
        iter
    }

    /// Number of black nodes on the leftmost root-to-leaf path.
    pub fn black_height(&self) -> usize {
        let mut height = 0;
        let mut cursor = self.root;
        while let Some(id) = cursor {
            if self.node(id).color == Color::Black {
                height += 1;
            }
            cursor = self.node(id).left;
        }
        height
    }

    /// Check the red-black invariants, parent links and key order.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.is_red(self.root) {
            return Err(IndexError::Invariant("root is red".into()));
        }
        if let Some(root) = self.root {
            if self.parent(root).is_some() {
                return Err(IndexError::Invariant("root has a parent".into()));
            }
        }
        self.check_subtree(self.root)?;

        let mut previous = f64::NEG_INFINITY;
        let mut count = 0;
        let mut iter = self.iter();
        while let Some(id) = iter.next_id() {
            let key = self.node(id).key;
            if key < previous {
                return Err(IndexError::Invariant(format!(
                    "key {key} follows larger key {previous}"
                )));
            }
            previous = key;
            count += 1;
        }
        if count != self.nodes.len() {
            return Err(IndexError::Invariant(format!(
                "{count} nodes reachable, {} allocated",
                self.nodes.len()
            )));
        }
        Ok(())
    }

    /// Black-height of the subtree at `id`.
    fn check_subtree(&self, id: Option<NodeId>) -> Result<usize, IndexError> {
        let Some(id) = id else {
            return Ok(0);
        };
        let node = self.node(id);
        for child in [node.left, node.right].into_iter().flatten() {
            if self.parent(child) != Some(id) {
                return Err(IndexError::Invariant(format!(
                    "node {} does not point back to parent {}",
                    child.0, id.0
                )));
            }
            if node.color == Color::Red && self.node(child).color == Color::Red {
                return Err(IndexError::Invariant(format!(
                    "red node {} has red child {}",
                    id.0, child.0
                )));
            }
        }
        let left = self.check_subtree(node.left)?;
        let right = self.check_subtree(node.right)?;
        if left != right {
            return Err(IndexError::Invariant(format!(
                "black-height mismatch under node {}: {left} vs {right}",
                id.0
            )));
        }
        Ok(left + usize::from(node.color == Color::Black))
    }
}

impl<T: Keyed> RedBlackTree<T> {
    /// Insert `item` under its key. Equal keys go to the right of existing ones.
    pub fn insert(&mut self, item: T) {
        let key = item.key();
        let id = NodeId(self.nodes.len());

        let mut parent = None;
        let mut cursor = self.root;
        while let Some(c) = cursor {
            parent = Some(c);
            let node = self.node(c);
            cursor = if key < node.key { node.left } else { node.right };
        }

        self.nodes.push(RbNode {
            key,
            item,
            color: Color::Red,
            parent,
            left: None,
            right: None,
        });
        match parent {
            None => self.root = Some(id),
            Some(p) if key < self.node(p).key => self.node_mut(p).left = Some(id),
            Some(p) => self.node_mut(p).right = Some(id),
        }
        self.rebalance(id);
    }
}

/// In-order iterator returned by [`RedBlackTree::iter`].
pub struct Iter<'a, T> {
    tree: &'a RedBlackTree<T>,
    stack: Vec<NodeId>,
}

impl<'a, T> Iter<'a, T> {
    fn push_left_spine(&mut self, mut cursor: Option<NodeId>) {
        while let Some(id) = cursor {
            self.stack.push(id);
            cursor = self.tree.node(id).left;
        }
    }

    fn next_id(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.push_left_spine(self.tree.node(id).right);
        Some(id)
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (&'a T, Color);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next_id()?;
        let node = self.tree.node(id);
        Some((&node.item, node.color))
    }
}
