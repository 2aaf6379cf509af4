use super::*;
use crate::geom::{GeomCfg, Symmetry};
use crate::orient::OrientPool;

fn sevenfold() -> (Symmetry, BreakdownTree, OrientPool) {
    let sym = Symmetry::new(7, GeomCfg::default());
    let mut pool = OrientPool::new(sym.m);
    // Inflation by d_3.
    let tree = BreakdownTree::build(&sym, &[0, 0, 1], &mut pool);
    (sym, tree, pool)
}

#[test]
fn sevenfold_capacities_match_product_rule() {
    let (_, tree, _) = sevenfold();
    // d_3·d_1 = d_3; d_3·d_2 = d_2 + d_3; d_3·d_3 = d_1 + d_2 + d_3 (folded).
    assert_eq!(tree.capacity(1), &[0, 0, 1]);
    assert_eq!(tree.capacity(2), &[0, 1, 1]);
    assert_eq!(tree.capacity(3), &[1, 1, 1]);
}

#[test]
fn sevenfold_enumeration_counts() {
    let (_, tree, _) = sevenfold();
    // Orderings of the capacity multisets: 1, 2, and 3! respectively.
    assert_eq!(tree.terminal_counts(), vec![1, 2, 6]);
}

#[test]
fn child_lookup_follows_capacity() {
    let (_, tree, _) = sevenfold();
    let root = tree.root(2);
    assert!(tree.child(root, 1).is_none());
    let c2 = tree.child(root, 2).unwrap();
    let c23 = tree.child(c2, 3).unwrap();
    assert!(tree.node(c23).terminal);
    assert!(tree.child(c2, 2).is_none());
    // Orientations are distinct allocations.
    assert_ne!(tree.node(c2).orient, tree.node(c23).orient);
}

#[test]
fn witness_marks_paths_and_exports() {
    let (_, mut tree, _) = sevenfold();
    assert!(tree.witness(2, &[2, 3]));
    assert!(tree.witness(2, &[2, 3]));
    assert!(!tree.witness(2, &[1, 2]));
    let exported = tree.export_witnessed();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].class, 2);
    assert_eq!(exported[0].lens, vec![2, 3]);
    assert_eq!(exported[0].uses, 2);
}

#[test]
fn deterministic_rebuild() {
    let (_, a, pool_a) = sevenfold();
    let (_, b, pool_b) = sevenfold();
    assert_eq!(a, b);
    assert_eq!(pool_a.total(), pool_b.total());
}

fn sevenfold_tracker() -> (Symmetry, BreakdownTree, BoundaryTracker) {
    let (sym, tree, _) = sevenfold();
    // A synthetic region: one side per class, all starting at scaled corners.
    // Use the class-3 side geometry for coverage tests.
    let corners = [
        sym.origin(),
        sym.ring().mul(sym.length(3), &sym.ring().zeta_pow(0)),
        sym.ring().mul(sym.length(2), &sym.ring().zeta_pow(3)),
    ];
    let lam = sym.length(3).clone();
    let c0 = sym.ring().mul(&corners[0], &lam);
    let c1 = sym.ring().mul(&corners[1], &lam);
    let c2 = sym.ring().mul(&corners[2], &lam);
    let tracker = BoundaryTracker::build(&sym, &tree, &[c0, c1, c2], &[0, 5, 9], &[3, 1, 2]);
    (sym, tree, tracker)
}

#[test]
fn coverage_advances_frontier_in_order() {
    let (sym, tree, mut tracker) = sevenfold_tracker();
    let start = tracker.sides[0].start.clone();
    let p1 = &start + sym.direction(1, 0);
    let p2 = &p1 + sym.direction(2, 0);

    // A piece that skips the frontier is rejected.
    let early = tracker.check(&sym, &tree, false, 0, &p1, &p2, 2);
    assert_eq!(early.unwrap_err(), CoverReject::NotAtFrontier);

    let slot = tracker.cover(&sym, &tree, false, 0, &start, &p1, 1).unwrap();
    assert_eq!(slot.side, 0);
    assert_eq!(tracker.incident(&p1), Incidence::End);

    // Same class twice exceeds capacity (class-3 side has one of each).
    let again = &p1 + sym.direction(1, 0);
    let dup = tracker.check(&sym, &tree, false, 0, &p1, &again, 1);
    assert_eq!(dup.unwrap_err(), CoverReject::NotInCatalogue);

    tracker.cover(&sym, &tree, false, 0, &p1, &p2, 2).unwrap();
    let p3 = &p2 + sym.direction(3, 0);
    tracker.cover(&sym, &tree, false, 0, &p2, &p3, 3).unwrap();
    assert!(tracker.sides[0].complete(&tree));
}

#[test]
fn blocked_points_are_reported() {
    let (sym, tree, mut tracker) = sevenfold_tracker();
    let start = tracker.sides[0].start.clone();
    // Cover with d_3 first: the intermediate admissible points d_1 and d_2
    // from the start become interior to the piece.
    let head = &start + sym.direction(3, 0);
    tracker.cover(&sym, &tree, false, 0, &start, &head, 3).unwrap();
    let inside = &start + sym.direction(1, 0);
    assert_eq!(tracker.incident(&inside), Incidence::Blocked);
    assert_eq!(tracker.incident(&head), Incidence::End);
}

#[test]
fn uncover_restores_state_bitwise() {
    let (sym, tree, mut tracker) = sevenfold_tracker();
    let snapshot = tracker.clone();
    let start = tracker.sides[0].start.clone();
    let p1 = &start + sym.direction(2, 0);
    tracker.cover(&sym, &tree, false, 0, &start, &p1, 2).unwrap();
    assert_ne!(tracker, snapshot);
    tracker.uncover(&tree, 0);
    assert_eq!(tracker, snapshot);
}

#[test]
fn restricted_mode_requires_witnessed_paths() {
    let (sym, mut tree, _) = sevenfold();
    let corners = [
        sym.origin(),
        sym.ring().mul(sym.length(3), sym.length(3)),
        sym.ring().mul(sym.length(2), &sym.ring().zeta_pow(3)),
    ];
    let mut tracker = BoundaryTracker::build(&sym, &tree, &corners, &[0, 5, 9], &[3, 1, 2]);
    let start = tracker.sides[0].start.clone();
    let p1 = &start + sym.direction(1, 0);
    let denied = tracker.check(&sym, &tree, true, 0, &start, &p1, 1);
    assert_eq!(denied.unwrap_err(), CoverReject::NotInCatalogue);

    tree.witness(3, &[1, 2, 3]);
    tracker.cover(&sym, &tree, true, 0, &start, &p1, 1).unwrap();
}

#[test]
fn classify_distinguishes_boundary_from_chords() {
    let (sym, _tree, tracker) = sevenfold_tracker();
    let start = tracker.sides[0].start.clone();
    let on_side = &start + sym.direction(1, 0);
    assert_eq!(tracker.classify(&start, &on_side), Some(0));
    // The far corner of side 0 also begins side 1.
    let corner1 = tracker.sides[1].start.clone();
    assert_eq!(tracker.classify(&start, &corner1), Some(0));
    // A point off every side line classifies as a chord.
    let interior = &start + sym.direction(1, 2);
    assert_eq!(tracker.classify(&start, &interior), None);
}
