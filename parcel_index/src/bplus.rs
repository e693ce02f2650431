//! B+Tree with a configurable order and chained leaves.
//!
//! Internal and leaf nodes share one arena and refer to each other by
//! `NodeId`. Parent/child links are the structural view; the leaf `next`
//! chain is a second, non-owning view over the same leaves that range scans
//! walk without revisiting internal nodes.

use std::fmt;

use tracing::trace;

use crate::IndexError;

/// Smallest order that still splits a full leaf into two non-empty halves.
pub const MIN_ORDER: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

#[derive(Debug)]
struct Internal<K> {
    keys: Vec<K>,
    children: Vec<NodeId>, // len = keys.len() + 1
    parent: Option<NodeId>,
}

#[derive(Debug)]
struct Leaf<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    next: Option<NodeId>,
    parent: Option<NodeId>,
}

#[derive(Debug)]
enum Node<K, V> {
    Internal(Internal<K>),
    Leaf(Leaf<K, V>),
}

impl<K, V> Node<K, V> {
    fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Internal(n) => n.parent,
            Node::Leaf(n) => n.parent,
        }
    }

    fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Internal(n) => n.parent = parent,
            Node::Leaf(n) => n.parent = parent,
        }
    }

    fn keys(&self) -> &[K] {
        match self {
            Node::Internal(n) => &n.keys,
            Node::Leaf(n) => &n.keys,
        }
    }
}

/// B+Tree mapping ordered keys to values. Duplicate keys are kept.
#[derive(Debug)]
pub struct BPlusTree<K, V> {
    nodes: Vec<Node<K, V>>,
    root: Option<NodeId>,
    order: usize,
    len: usize,
}

impl<K: PartialOrd + Clone, V> BPlusTree<K, V> {
    /// Create an empty tree whose nodes split once they hold `order` keys.
    pub fn new(order: usize) -> Result<Self, IndexError> {
        if order < MIN_ORDER {
            return Err(IndexError::InvalidOrder {
                order,
                min: MIN_ORDER,
            });
        }
        Ok(Self {
            nodes: Vec::new(),
            root: None,
            order,
            len: 0,
        })
    }

    /// Split threshold fixed at construction.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels, 0 for an empty tree.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut cursor = self.root;
        while let Some(id) = cursor {
            height += 1;
            cursor = match &self.nodes[id.0] {
                Node::Internal(n) => n.children.first().copied(),
                Node::Leaf(_) => None,
            };
        }
        height
    }

    fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn leaf(&self, id: NodeId) -> &Leaf<K, V> {
        match &self.nodes[id.0] {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("B+Tree node {id:?} expected to be a leaf"),
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut Leaf<K, V> {
        match &mut self.nodes[id.0] {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("B+Tree node {id:?} expected to be a leaf"),
        }
    }

    fn internal_mut(&mut self, id: NodeId) -> &mut Internal<K> {
        match &mut self.nodes[id.0] {
            Node::Internal(node) => node,
            Node::Leaf(_) => panic!("B+Tree node {id:?} expected to be internal"),
        }
    }

    /// Descend to the leaf a new `key` belongs in: at each level take the
    /// child before the first separator strictly greater than `key`.
    fn find_leaf(&self, root: NodeId, key: &K) -> NodeId {
        let mut id = root;
        while let Node::Internal(node) = &self.nodes[id.0] {
            let idx = node.keys.iter().position(|k| key < k).unwrap_or(node.keys.len());
            id = node.children[idx];
        }
        id
    }

    /// Descend to the leftmost leaf that may hold `key`. Runs of equal keys
    /// can straddle a separator equal to them, so this stops at the first
    /// separator `>= key`.
    fn find_first_leaf(&self, root: NodeId, key: &K) -> NodeId {
        let mut id = root;
        while let Node::Internal(node) = &self.nodes[id.0] {
            let idx = node.keys.iter().position(|k| key <= k).unwrap_or(node.keys.len());
            id = node.children[idx];
        }
        id
    }

    fn leftmost_leaf(&self) -> Option<NodeId> {
        let mut id = self.root?;
        while let Node::Internal(node) = &self.nodes[id.0] {
            id = node.children[0];
        }
        Some(id)
    }

    /// Insert `value` under `key`. Equal keys keep their insertion order.
    pub fn insert(&mut self, key: K, value: V) {
        self.len += 1;
        let Some(root) = self.root else {
            let id = self.alloc(Node::Leaf(Leaf {
                keys: vec![key],
                values: vec![value],
                next: None,
                parent: None,
            }));
            self.root = Some(id);
            return;
        };

        let leaf_id = self.find_leaf(root, &key);
        let order = self.order;
        let leaf = self.leaf_mut(leaf_id);
        let idx = leaf.keys.partition_point(|k| k <= &key);
        leaf.keys.insert(idx, key);
        leaf.values.insert(idx, value);
        if leaf.keys.len() >= order {
            self.split_leaf(leaf_id);
        }
    }

    /// Move the upper half of a full leaf into a new right sibling.
    fn split_leaf(&mut self, leaf_id: NodeId) {
        let leaf = self.leaf_mut(leaf_id);
        let mid = leaf.keys.len() / 2;
        let keys = leaf.keys.split_off(mid);
        let values = leaf.values.split_off(mid);
        let next = leaf.next;
        let parent = leaf.parent;
        let promoted = keys[0].clone();

        let sibling = self.alloc(Node::Leaf(Leaf {
            keys,
            values,
            next,
            parent,
        }));
        self.leaf_mut(leaf_id).next = Some(sibling);
        trace!(leaf = leaf_id.0, sibling = sibling.0, "split leaf");

        match parent {
            None => self.grow_root(leaf_id, promoted, sibling),
            Some(_) => self.insert_into_parent(leaf_id, promoted, sibling),
        }
    }

    /// Hang `newer` right after `older` in their parent, separated by `key`.
    fn insert_into_parent(&mut self, older: NodeId, key: K, newer: NodeId) {
        let Some(parent_id) = self.nodes[older.0].parent() else {
            panic!("B+Tree node {older:?} has no parent to take a promoted key");
        };
        let order = self.order;
        let parent = self.internal_mut(parent_id);
        let Some(pos) = parent.children.iter().position(|&c| c == older) else {
            panic!("B+Tree node {older:?} missing from its parent {parent_id:?}");
        };
        parent.keys.insert(pos, key);
        parent.children.insert(pos + 1, newer);
        let overflow = parent.keys.len() >= order;
        self.nodes[newer.0].set_parent(Some(parent_id));

        if overflow {
            self.split_internal(parent_id);
        }
    }

    /// Push the median key of a full internal node up and move everything
    /// after it into a new right sibling.
    fn split_internal(&mut self, node_id: NodeId) {
        let node = self.internal_mut(node_id);
        let mid = node.keys.len() / 2;
        let keys = node.keys.split_off(mid + 1);
        let promoted = node.keys.remove(mid);
        let children = node.children.split_off(mid + 1);
        let parent = node.parent;

        let moved = children.clone();
        let sibling = self.alloc(Node::Internal(Internal {
            keys,
            children,
            parent,
        }));
        for child in moved {
            self.nodes[child.0].set_parent(Some(sibling));
        }
        trace!(node = node_id.0, sibling = sibling.0, "split internal");

        match parent {
            None => self.grow_root(node_id, promoted, sibling),
            Some(_) => self.insert_into_parent(node_id, promoted, sibling),
        }
    }

    fn grow_root(&mut self, left: NodeId, key: K, right: NodeId) {
        let root = self.alloc(Node::Internal(Internal {
            keys: vec![key],
            children: vec![left, right],
            parent: None,
        }));
        self.nodes[left.0].set_parent(Some(root));
        self.nodes[right.0].set_parent(Some(root));
        self.root = Some(root);
        trace!(root = root.0, "grew new root");
    }

    /// First value stored under `key`, following the leaf chain past the
    /// candidate leaf while the run of keys may continue.
    pub fn search(&self, key: &K) -> Option<&V> {
        let mut cursor = Some(self.find_first_leaf(self.root?, key));
        while let Some(id) = cursor {
            let leaf = self.leaf(id);
            if let Some(i) = leaf.keys.iter().position(|k| k == key) {
                return Some(&leaf.values[i]);
            }
            if leaf.keys.last().is_some_and(|max| max > key) {
                break;
            }
            cursor = leaf.next;
        }
        None
    }

    /// Values with `low <= key <= high` in ascending key order.
    pub fn range_query(&self, low: &K, high: &K) -> Vec<&V> {
        let mut out = Vec::new();
        let Some(root) = self.root else {
            return out;
        };
        let first = self.find_first_leaf(root, low);
        let mut start = self.leaf(first).keys.partition_point(|k| k < low);
        let mut cursor = Some(first);
        while let Some(id) = cursor {
            let leaf = self.leaf(id);
            for (k, v) in leaf.keys[start..].iter().zip(&leaf.values[start..]) {
                if k > high {
                    return out;
                }
                out.push(v);
            }
            cursor = leaf.next;
            start = 0;
        }
        out
    }

    /// All entries in key order, walking the leaf chain.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            tree: self,
            leaf: self.leftmost_leaf(),
            pos: 0,
        }
    }

    /// Check node shapes, parent links, key order, uniform leaf depth and
    /// that the leaf chain covers every entry exactly once.
    pub fn validate(&self) -> Result<(), IndexError> {
        let Some(root) = self.root else {
            return if self.len == 0 && self.nodes.is_empty() {
                Ok(())
            } else {
                Err(IndexError::Invariant("entries without a root".into()))
            };
        };
        if self.nodes[root.0].parent().is_some() {
            return Err(IndexError::Invariant("root has a parent".into()));
        }

        let mut leaf_depth = None;
        let mut structural_leaves = Vec::new();
        let mut stack = vec![(root, 1usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id.0];
            if !is_sorted(node.keys()) {
                return Err(IndexError::Invariant(format!("node {} keys out of order", id.0)));
            }
            match node {
                Node::Internal(n) => {
                    if n.children.len() != n.keys.len() + 1 {
                        return Err(IndexError::Invariant(format!(
                            "internal node {} has {} keys and {} children",
                            id.0,
                            n.keys.len(),
                            n.children.len()
                        )));
                    }
                    if n.keys.len() >= self.order {
                        return Err(IndexError::Invariant(format!(
                            "internal node {} holds {} keys at order {}",
                            id.0,
                            n.keys.len(),
                            self.order
                        )));
                    }
                    for &child in n.children.iter().rev() {
                        if self.nodes[child.0].parent() != Some(id) {
                            return Err(IndexError::Invariant(format!(
                                "node {} does not point back to parent {}",
                                child.0, id.0
                            )));
                        }
                        stack.push((child, depth + 1));
                    }
                }
                Node::Leaf(l) => {
                    if l.keys.len() != l.values.len() || l.keys.is_empty() {
                        return Err(IndexError::Invariant(format!(
                            "leaf {} has {} keys and {} values",
                            id.0,
                            l.keys.len(),
                            l.values.len()
                        )));
                    }
                    if *leaf_depth.get_or_insert(depth) != depth {
                        return Err(IndexError::Invariant(format!(
                            "leaf {} at depth {depth}, expected {leaf_depth:?}",
                            id.0
                        )));
                    }
                    structural_leaves.push(id);
                }
            }
        }

        let mut chained = Vec::new();
        let mut cursor = self.leftmost_leaf();
        while let Some(id) = cursor {
            if chained.len() > structural_leaves.len() {
                return Err(IndexError::Invariant("leaf chain has a cycle".into()));
            }
            chained.push(id);
            cursor = self.leaf(id).next;
        }
        if chained != structural_leaves {
            return Err(IndexError::Invariant(
                "leaf chain disagrees with tree order".into(),
            ));
        }

        let mut count = 0;
        let mut previous: Option<&K> = None;
        for (k, _) in self.iter() {
            if previous.is_some_and(|p| p > k) {
                return Err(IndexError::Invariant("leaf chain keys decrease".into()));
            }
            previous = Some(k);
            count += 1;
        }
        if count != self.len {
            return Err(IndexError::Invariant(format!(
                "leaf chain holds {count} entries, expected {}",
                self.len
            )));
        }
        Ok(())
    }
}

fn is_sorted<K: PartialOrd>(keys: &[K]) -> bool {
    keys.windows(2).all(|w| w[0] <= w[1])
}

/// Leaf-chain iterator returned by [`BPlusTree::iter`].
pub struct Iter<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    leaf: Option<NodeId>,
    pos: usize,
}

impl<'a, K: PartialOrd + Clone, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.tree.leaf(self.leaf?);
            if self.pos < leaf.keys.len() {
                let item = (&leaf.keys[self.pos], &leaf.values[self.pos]);
                self.pos += 1;
                return Some(item);
            }
            self.leaf = leaf.next;
            self.pos = 0;
        }
    }
}

/// Level-order dump, one line per level: `[1,2]   [3,4]`.
impl<K: fmt::Display, V> fmt::Display for BPlusTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(root) = self.root else {
            return writeln!(f, "(empty)");
        };
        let mut level = vec![root];
        while !level.is_empty() {
            let mut next = Vec::new();
            for (i, id) in level.iter().enumerate() {
                if i > 0 {
                    write!(f, "   ")?;
                }
                let node = &self.nodes[id.0];
                write!(f, "[")?;
                for (j, key) in node.keys().iter().enumerate() {
                    if j > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{key}")?;
                }
                write!(f, "]")?;
                if let Node::Internal(n) = node {
                    next.extend(n.children.iter().copied());
                }
            }
            writeln!(f)?;
            level = next;
        }
        Ok(())
    }
}
