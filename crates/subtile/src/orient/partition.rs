//! Reversible union-find over orientation ids.
//!
//! The forest uses union by rank without path compression so that every
//! merge is a single reversible parent-pointer write. `mark`/`undo_to` give
//! the backtracking search O(1)-per-merge rollback; `clone` is a plain deep
//! copy, which is what work-unit spawning relies on.
//!
//! Slots: positive id `o` lives at slot `o`, negative `-o` at `total + o`.
//! Slot 0 is unused. Identifying `a ~ b` always also identifies `-a ~ -b`
//! so that class structure stays closed under negation.

use serde::{Deserialize, Serialize};

/// One reversible union: `child` was attached under `into`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
struct UnionRecord {
    child: u32,
    into: u32,
    rank_bumped: bool,
}

/// Partition of orientation ids (and their negations) into identified classes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientationPartition {
    total: u32,
    parent: Vec<u32>,
    rank: Vec<u8>,
    log: Vec<UnionRecord>,
    /// Log length at which the partition first became invalid, if ever.
    invalid_at: Option<usize>,
}

impl OrientationPartition {
    /// Discrete partition over ids 1..=total and their negations.
    pub fn fresh(total: u32) -> OrientationPartition {
        let slots = 2 * total as usize + 1;
        OrientationPartition {
            total,
            parent: (0..slots as u32).collect(),
            rank: vec![0; slots],
            log: Vec::new(),
            invalid_at: None,
        }
    }

    #[inline]
    fn slot(&self, o: i32) -> u32 {
        debug_assert!(o != 0 && o.unsigned_abs() <= self.total);
        if o > 0 {
            o as u32
        } else {
            self.total + (-o) as u32
        }
    }

    #[inline]
    fn id_of(&self, slot: u32) -> i32 {
        if slot <= self.total {
            slot as i32
        } else {
            -((slot - self.total) as i32)
        }
    }

    fn find_slot(&self, mut s: u32) -> u32 {
        while self.parent[s as usize] != s {
            s = self.parent[s as usize];
        }
        s
    }

    /// Representative id of the class containing `o`.
    pub fn find(&self, o: i32) -> i32 {
        self.id_of(self.find_slot(self.slot(o)))
    }

    /// True iff `a` and `b` are currently in the same class.
    #[inline]
    pub fn same(&self, a: i32, b: i32) -> bool {
        self.find_slot(self.slot(a)) == self.find_slot(self.slot(b))
    }

    fn union_slots(&mut self, a: u32, b: u32) {
        let ra = self.find_slot(a);
        let rb = self.find_slot(b);
        if ra == rb {
            return;
        }
        let (child, into) = if self.rank[ra as usize] < self.rank[rb as usize] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        let bump = self.rank[child as usize] == self.rank[into as usize];
        self.parent[child as usize] = into;
        if bump {
            self.rank[into as usize] += 1;
        }
        self.log.push(UnionRecord {
            child,
            into,
            rank_bumped: bump,
        });
    }

    /// Identify `a ~ b` (and `-a ~ -b`). Records invalidity if a class now
    /// contains some id together with its negation.
    pub fn identify(&mut self, a: i32, b: i32) {
        self.union_slots(self.slot(a), self.slot(b));
        self.union_slots(self.slot(-a), self.slot(-b));
        if self.invalid_at.is_none() && self.same(a, -a) {
            self.invalid_at = Some(self.log.len());
        }
    }

    /// False iff some class contains an id and its negation.
    #[inline]
    pub fn valid(&self) -> bool {
        self.invalid_at.is_none()
    }

    /// Exhaustive validity scan, independent of the incremental flag.
    pub fn valid_scan(&self) -> bool {
        (1..=self.total as i32).all(|o| !self.same(o, -o))
    }

    /// Undo marker for the current state.
    #[inline]
    pub fn mark(&self) -> usize {
        self.log.len()
    }

    /// Roll back all identifications made after `mark`.
    pub fn undo_to(&mut self, mark: usize) {
        while self.log.len() > mark {
            let rec = self.log[self.log.len() - 1];
            self.log.pop();
            self.parent[rec.child as usize] = rec.child;
            if rec.rank_bumped {
                self.rank[rec.into as usize] -= 1;
            }
        }
        if let Some(d) = self.invalid_at {
            if d > mark {
                self.invalid_at = None;
            }
        }
    }

    /// Merge every identification present in `other` into `self`.
    pub fn refine(&mut self, other: &OrientationPartition) {
        debug_assert_eq!(self.total, other.total);
        for s in 1..self.parent.len() as u32 {
            let r = other.find_slot(s);
            if r != s {
                self.identify(self.id_of(s), self.id_of(r));
            }
        }
    }

    /// All ids (positive and negative) in the class of `o`, ascending by slot.
    pub fn equivalence_class(&self, o: i32) -> Vec<i32> {
        let root = self.find_slot(self.slot(o));
        (1..self.parent.len() as u32)
            .filter(|&s| self.find_slot(s) == root)
            .map(|s| self.id_of(s))
            .collect()
    }

    /// Canonical snapshot: every nontrivial class as a sorted id list,
    /// classes ordered by their first member. Identical partitions produce
    /// identical snapshots regardless of merge order.
    pub fn classes(&self) -> Vec<Vec<i32>> {
        let slots = self.parent.len() as u32;
        let mut by_root: Vec<Vec<i32>> = vec![Vec::new(); slots as usize];
        for s in 1..slots {
            by_root[self.find_slot(s) as usize].push(self.id_of(s));
        }
        let mut out: Vec<Vec<i32>> = by_root
            .into_iter()
            .filter(|c| c.len() > 1)
            .map(|mut c| {
                c.sort_unstable();
                c
            })
            .collect();
        out.sort_by_key(|c| c[0]);
        out
    }

    pub fn universe(&self) -> u32 {
        self.total
    }
}
