use super::*;
use crate::geom::{GeomCfg, ProtoSet, Symmetry};
use crate::orient::OrientPool;

fn sym7() -> Symmetry {
    Symmetry::new(7, GeomCfg::default())
}

fn protos7(sym: &Symmetry) -> ProtoSet {
    let mut pool = OrientPool::new(sym.m);
    ProtoSet::build(sym, &[[1, 2, 4], [1, 3, 3], [2, 2, 3]], &mut pool).unwrap()
}

#[test]
fn placement_closes_for_all_choices() {
    let sym = sym7();
    let set = protos7(&sym);
    let tail = sym.origin();
    for proto in &set.tiles {
        for flip in [false, true] {
            for glue in 0..3 {
                for step in [0u16, 3, 11] {
                    // The debug closure assertion fires on any walk error.
                    let t = Triangle::place(&sym, proto, flip, false, glue, &tail, step);
                    assert_eq!(t.verts[glue], tail);
                    assert_eq!(t.steps[glue], step);
                    for i in 0..3 {
                        let e = t.side(i);
                        assert_eq!(e.tail, t.verts[i]);
                        assert_eq!(e.head, t.verts[(i + 1) % 3]);
                        assert_eq!(e.len, proto.side_len(flip, i));
                        assert_eq!(e.orient, proto.side_orient(flip, i));
                    }
                }
            }
        }
    }
}

#[test]
fn placed_tiles_are_counter_clockwise_both_chiralities() {
    let sym = sym7();
    let set = protos7(&sym);
    let tail = sym.origin();
    for proto in &set.tiles {
        for flip in [false, true] {
            let t = Triangle::place(&sym, proto, flip, false, 0, &tail, 0);
            assert_eq!(
                sym.orient_sign(&t.verts[0], &t.verts[1], &t.verts[2]),
                1,
                "proto {} flip {flip}",
                proto.id
            );
        }
    }
}

#[test]
fn flip_mirrors_side_data() {
    let sym = sym7();
    let set = protos7(&sym);
    let t = &set.tiles[0];
    for i in 0..3 {
        assert_eq!(t.side_len(true, i), t.lens[2 - i]);
        assert_eq!(t.side_orient(true, i), -t.orients[2 - i]);
    }
}

#[test]
fn reversed_edge_roundtrips() {
    let sym = sym7();
    let set = protos7(&sym);
    let t = Triangle::place(&sym, &set.tiles[2], false, false, 0, &sym.origin(), 5);
    for i in 0..3 {
        let e = t.side(i);
        let r = e.reversed(&sym);
        assert_eq!(r.tail, e.head);
        assert_eq!(r.head, e.tail);
        assert_eq!(r.orient, -e.orient);
        assert_eq!(r.reversed(&sym), e);
        // A reversed edge still satisfies head = tail + direction.
        assert_eq!(&r.tail + sym.direction(r.len, r.step), r.head);
    }
}

#[test]
fn segment_predicates() {
    let sym = Symmetry::new(4, GeomCfg::default());
    let o = sym.origin();
    let e = &o + sym.direction(1, 0);
    let n = &o + sym.direction(1, 2);
    let ne = &e + sym.direction(1, 2);
    let e2 = &e + sym.direction(1, 0);

    // Proper diagonal crossing.
    assert!(segments_cross(&sym, &o, &ne, &e, &n));
    // Shared endpoint only.
    assert!(!segments_cross(&sym, &o, &e, &e, &ne));
    // Collinear overlap beyond the shared point.
    assert!(segments_cross(&sym, &o, &e2, &e, &e2));
    // Identical span.
    assert!(segments_cross(&sym, &o, &e, &o, &e));
    // Disjoint parallels.
    assert!(!segments_cross(&sym, &o, &e, &n, &ne));
    // Endpoint strictly inside the other segment.
    assert!(segments_cross(&sym, &o, &e2, &e, &ne));

    assert!(point_on_open_segment(&sym, &e, &o, &e2));
    assert!(!point_on_open_segment(&sym, &o, &o, &e2));
    assert!(!point_on_open_segment(&sym, &ne, &o, &e2));

    assert!(point_in_triangle(&sym, &o, &o, &e, &n));
    assert!(point_in_triangle(&sym, &e, &o, &e, &n));
    assert!(!point_in_triangle(&sym, &ne, &o, &e, &n));
}
