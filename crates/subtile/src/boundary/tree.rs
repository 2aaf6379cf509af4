//! Edge-breakdown catalogue.
//!
//! For each length class k the inflated edge λ·d_k decomposes into an ordered
//! sequence of unit-scale edges; the trie below `root(k)` holds every ordered
//! decomposition whose class multiset matches the capacity vector of λ·d_k
//! exactly. The full trie is enumerated deterministically at problem build
//! time (children ascending by class, preorder), so node indices and the
//! orientation ids allocated to them agree across processes.
//!
//! Witness marks are the cross-run corpus: a node is witnessed once some
//! completed patch used the decomposition through it. Runs started in
//! restricted mode only allow witnessed paths, which pins a later run to the
//! decompositions an earlier run actually produced.

use crate::geom::{class_scale, Symmetry};
use crate::orient::OrientPool;
use serde::{Deserialize, Serialize};

pub const NIL: u32 = u32::MAX;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakdownNode {
    /// Piece length class; 0 on root nodes.
    pub len: u8,
    /// Orientation id of the piece slot; 0 on root nodes.
    pub orient: i32,
    pub parent: u32,
    /// Children ordered by piece class ascending.
    pub children: Vec<u32>,
    /// The path down to this node uses the full capacity.
    pub terminal: bool,
    /// Some completed patch decomposed an edge through this node.
    pub witnessed: bool,
    /// Number of completed patches through this node.
    pub uses: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakdownTree {
    pub m: usize,
    /// Root node per length class, index class−1.
    roots: Vec<u32>,
    nodes: Vec<BreakdownNode>,
    /// Capacity vector of λ·d_k per class, index class−1.
    capacities: Vec<Vec<i64>>,
}

impl BreakdownTree {
    /// Enumerate the full catalogue for inflation factor `lambda`.
    pub fn build(sym: &Symmetry, lambda: &[i64], pool: &mut OrientPool) -> BreakdownTree {
        let m = sym.m;
        let mut tree = BreakdownTree {
            m,
            roots: Vec::with_capacity(m),
            nodes: Vec::new(),
            capacities: Vec::with_capacity(m),
        };
        for class in 1..=m as u8 {
            let mut unit = vec![0i64; m];
            unit[class as usize - 1] = 1;
            let capacity = class_scale(sym, &unit, lambda);
            let root = tree.push_node(0, 0, NIL, capacity.iter().all(|&c| c == 0));
            tree.roots.push(root);
            let mut remaining = capacity.clone();
            tree.expand(root, &mut remaining, pool);
            tree.capacities.push(capacity);
        }
        tree
    }

    fn push_node(&mut self, len: u8, orient: i32, parent: u32, terminal: bool) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(BreakdownNode {
            len,
            orient,
            parent,
            children: Vec::new(),
            terminal,
            witnessed: false,
            uses: 0,
        });
        id
    }

    fn expand(&mut self, at: u32, remaining: &mut [i64], pool: &mut OrientPool) {
        for class in 1..=self.m as u8 {
            if remaining[class as usize - 1] == 0 {
                continue;
            }
            remaining[class as usize - 1] -= 1;
            let terminal = remaining.iter().all(|&c| c == 0);
            let orient = pool.alloc(class);
            let child = self.push_node(class, orient, at, terminal);
            self.nodes[at as usize].children.push(child);
            self.expand(child, remaining, pool);
            remaining[class as usize - 1] += 1;
        }
    }

    #[inline]
    pub fn root(&self, class: u8) -> u32 {
        self.roots[class as usize - 1]
    }

    #[inline]
    pub fn capacity(&self, class: u8) -> &[i64] {
        &self.capacities[class as usize - 1]
    }

    #[inline]
    pub fn node(&self, id: u32) -> &BreakdownNode {
        &self.nodes[id as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child of `at` for piece class `len`, if the capacity admits one.
    pub fn child(&self, at: u32, len: u8) -> Option<u32> {
        self.nodes[at as usize]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c as usize].len == len)
    }

    /// Piece sequence (class, orientation) from the root down to `id`.
    pub fn path(&self, id: u32) -> Vec<(u8, i32)> {
        let mut out = Vec::new();
        let mut at = id;
        while at != NIL && self.nodes[at as usize].parent != NIL {
            let n = &self.nodes[at as usize];
            out.push((n.len, n.orient));
            at = n.parent;
        }
        out.reverse();
        out
    }

    /// Mark the ordered decomposition `lens` of class `class` as witnessed.
    /// Returns false when the path does not exist in the catalogue.
    pub fn witness(&mut self, class: u8, lens: &[u8]) -> bool {
        let mut at = self.root(class);
        for &len in lens {
            let Some(next) = self.child(at, len) else {
                return false;
            };
            at = next;
            let n = &mut self.nodes[at as usize];
            n.witnessed = true;
            n.uses += 1;
        }
        self.nodes[at as usize].terminal
    }

    /// All witnessed complete decompositions, with the leaf use count.
    pub fn export_witnessed(&self) -> Vec<WitnessedPath> {
        let mut out = Vec::new();
        for class in 1..=self.m as u8 {
            for (id, n) in self.nodes.iter().enumerate() {
                if n.terminal && n.witnessed && self.root_of(id as u32) == self.root(class) {
                    out.push(WitnessedPath {
                        class,
                        lens: self.path(id as u32).iter().map(|&(l, _)| l).collect(),
                        uses: n.uses,
                    });
                }
            }
        }
        out
    }

    fn root_of(&self, mut at: u32) -> u32 {
        while self.nodes[at as usize].parent != NIL {
            at = self.nodes[at as usize].parent;
        }
        at
    }

    /// Count of distinct complete decompositions per class.
    pub fn terminal_counts(&self) -> Vec<u64> {
        let mut out = vec![0u64; self.m];
        for (id, n) in self.nodes.iter().enumerate() {
            if n.terminal && n.parent != NIL {
                let root = self.root_of(id as u32);
                let class = self
                    .roots
                    .iter()
                    .position(|&r| r == root)
                    .unwrap_or_default();
                out[class] += 1;
            }
        }
        out
    }
}

/// One witnessed decomposition, as persisted in the catalogue file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WitnessedPath {
    pub class: u8,
    pub lens: Vec<u8>,
    pub uses: u64,
}
