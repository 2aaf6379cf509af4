use super::*;
use crate::config::ProblemParams;

fn params(n: usize, tiles: &[[u8; 3]], lambda: &[i64], target: usize) -> ProblemParams {
    ProblemParams {
        n,
        prototiles: tiles.to_vec(),
        lambda: lambda.to_vec(),
        target,
        counts: None,
        start_side: None,
        restrict: false,
        geom: GeomCfg::default(),
    }
}

#[test]
fn class_products_fold_back_into_the_basis() {
    let sym = Symmetry::new(7, GeomCfg::default());
    assert_eq!(sym.class_product(1, 1), vec![1, 0, 0]);
    assert_eq!(sym.class_product(2, 2), vec![1, 0, 1]);
    assert_eq!(sym.class_product(2, 3), vec![0, 1, 1]);
    assert_eq!(sym.class_product(3, 3), vec![1, 1, 1]);

    // Composite order: d_2·d_3 = 2·d_2 at n = 6.
    let sym6 = Symmetry::new(6, GeomCfg::default());
    assert_eq!(sym6.class_product(2, 3), vec![0, 2, 0]);
    assert_eq!(sym6.class_mul(&[0, 1, 0], 3), vec![0, 2, 0]);
}

#[test]
fn class_real_matches_sine_ratios() {
    let sym = Symmetry::new(7, GeomCfg::default());
    let s = (std::f64::consts::PI / 7.0).sin();
    for k in 1..=3u8 {
        let want = (k as f64 * std::f64::consts::PI / 7.0).sin() / s;
        let mut v = vec![0i64; 3];
        v[k as usize - 1] = 1;
        assert!((sym.class_real(&v) - want).abs() < 1e-12);
    }
}

#[test]
fn angle_classes_fold_at_the_straight_angle() {
    let sym = Symmetry::new(7, GeomCfg::default());
    assert_eq!(sym.angle_class(1), 1);
    assert_eq!(sym.angle_class(3), 3);
    assert_eq!(sym.angle_class(4), 3);
    assert_eq!(sym.angle_class(6), 1);
}

#[test]
fn interior_units_covers_straight_unit_and_reflex_turns() {
    let sym3 = Symmetry::new(3, GeomCfg::default());
    // Equilateral corner: leave after turning by the exterior angle n - 1.
    assert_eq!(sym3.interior_units(0, 2), 1);

    let sym = Symmetry::new(7, GeomCfg::default());
    assert_eq!(sym.interior_units(0, 0), 7);
    assert_eq!(sym.interior_units(0, 6), 1);
    assert_eq!(sym.interior_units(0, 7), 14);
    assert_eq!(sym.interior_units(2, 10), 13);
    assert_eq!(sym.interior_units(12, 4), 1);
}

#[test]
fn rotation_and_reflection_are_exact_ring_maps() {
    let sym = Symmetry::new(7, GeomCfg::default());
    let v = sym.direction(2, 3).clone();
    // A full turn is 2n steps; half a turn negates.
    assert_eq!(sym.rotate(&v, 14), v);
    assert_eq!(sym.rotate(&v, 7), -v.clone());
    assert_eq!(sym.rotate(&sym.rotate(&v, 5), -5), v);
    // The direction table is the rotation orbit of the step-0 direction.
    for a in 0..14u16 {
        assert_eq!(
            sym.direction(2, a),
            &sym.rotate(sym.direction(2, 0), a as i32)
        );
    }
    // Reflection is an involution and conjugates rotation.
    assert_eq!(sym.reflect(&sym.reflect(&v)), v);
    assert_eq!(
        sym.reflect(&sym.rotate(&v, 3)),
        sym.rotate(&sym.reflect(&v), -3)
    );
}

#[test]
fn sevenfold_counts_solve_uniquely() {
    let pb = Problem::build(&ProblemParams::sevenfold()).unwrap();
    assert_eq!(pb.counts, vec![3, 2, 2]);
    assert_eq!(pb.total_tiles(), 7);
}

#[test]
fn right_isoceles_bisection_needs_two_tiles() {
    let pb = Problem::build(&params(4, &[[1, 1, 2]], &[0, 1], 0)).unwrap();
    assert_eq!(pb.counts, vec![2]);
}

#[test]
fn dependent_areas_demand_explicit_counts() {
    // At n = 6 the two areas are rationally dependent (3·A = 2·B).
    let p = params(6, &[[1, 2, 3], [2, 2, 2]], &[0, 1, 0], 0);
    match Problem::build(&p) {
        Err(GeomError::CountsRequired { .. }) => {}
        other => panic!("expected CountsRequired, got {other:?}"),
    }

    let mut with_counts = p.clone();
    with_counts.counts = Some(vec![3, 0]);
    let pb = Problem::build(&with_counts).unwrap();
    assert_eq!(pb.counts, vec![3, 0]);

    // [1, 1] leaves the area short: 1·2·d_2 + 1·3·d_2 != 6·d_2.
    let mut short = p;
    short.counts = Some(vec![1, 1]);
    match Problem::build(&short) {
        Err(GeomError::InvalidParams { .. }) => {}
        other => panic!("expected InvalidParams, got {other:?}"),
    }
}

#[test]
fn unsatisfiable_area_equation_is_rejected() {
    // A single (1,1,3) tile cannot pay the d_1 component of the inflated area.
    let p = params(5, &[[1, 1, 3]], &[0, 1], 0);
    match Problem::build(&p) {
        Err(GeomError::InvalidParams { .. }) => {}
        other => panic!("expected InvalidParams, got {other:?}"),
    }
}

#[test]
fn required_counts_reports_the_unique_solution() {
    let sym = Symmetry::new(7, GeomCfg::default());
    let mut pool = crate::orient::OrientPool::new(sym.m);
    let set = ProtoSet::build(&sym, &[[1, 2, 4], [1, 3, 3], [2, 2, 3]], &mut pool).unwrap();
    match required_counts(&sym, &set.tiles, &[0, 0, 1], 2) {
        CountOutcome::Unique(c) => assert_eq!(c, vec![3, 2, 2]),
        other => panic!("expected a unique solution, got {other:?}"),
    }
}

#[test]
fn region_is_counter_clockwise_and_starts_on_the_shortest_side() {
    let pb = Problem::build(&ProblemParams::sevenfold()).unwrap();
    assert_eq!(
        pb.sym
            .orient_sign(&pb.corners[0], &pb.corners[1], &pb.corners[2]),
        1
    );
    assert_eq!(pb.side_classes, [3, 2, 2]);
    assert_eq!(pb.start_side, 1);
    // Corner 1 sits at distance d_3·d_3 = d_1 + d_2 + d_3 along step 0.
    assert_eq!(pb.corners[0], pb.sym.origin());
    assert_eq!(pb.corners[1], pb.sym.class_elem(&[1, 1, 1]));
    assert_eq!(pb.side_steps[0], 0);
}

#[test]
fn each_region_side_spans_its_corners() {
    let pb = Problem::build(&ProblemParams::sevenfold()).unwrap();
    let lam = pb.sym.class_elem(&pb.lambda);
    for s in 0..3 {
        let span = pb
            .sym
            .ring()
            .mul(pb.sym.direction(pb.side_classes[s], pb.side_steps[s]), &lam);
        assert_eq!(&pb.corners[s] + span, pb.corners[(s + 1) % 3]);
    }
}

#[test]
fn wedge_table_knows_the_unit_corners() {
    let pb = Problem::build(&ProblemParams::sevenfold()).unwrap();
    // Unit angles occur in (1,2,4) between classes {2,3} and in (1,3,3)
    // between {3,3}.
    assert!(pb.protos.unit_wedge_realizable(2, 3));
    assert!(pb.protos.unit_wedge_realizable(3, 2));
    assert!(pb.protos.unit_wedge_realizable(3, 3));
    assert!(!pb.protos.unit_wedge_realizable(1, 1));
    assert!(!pb.protos.unit_wedge_realizable(1, 2));
}

#[test]
fn matching_sides_respects_chirality() {
    let pb = Problem::build(&ProblemParams::sevenfold()).unwrap();
    let t = &pb.protos.tiles[2];
    assert_eq!(t.lens, [3, 2, 2]);
    assert_eq!(t.matching_sides(false, 2), vec![1, 2]);
    assert_eq!(t.matching_sides(false, 3), vec![0]);
    assert_eq!(t.matching_sides(true, 3), vec![2]);
}

#[test]
fn build_rejects_malformed_params() {
    assert!(Problem::build(&params(2, &[[1, 1, 2]], &[1], 0)).is_err());
    assert!(Problem::build(&params(7, &[[1, 2, 4]], &[0, 0], 0)).is_err());
    assert!(Problem::build(&params(7, &[[1, 2, 4]], &[0, 0, 0], 0)).is_err());
    assert!(Problem::build(&params(7, &[[1, 2, 4]], &[0, 0, -1], 0)).is_err());
    assert!(Problem::build(&params(7, &[[1, 2, 4]], &[0, 0, 1], 3)).is_err());
    assert!(Problem::build(&params(7, &[[1, 2, 5]], &[0, 0, 1], 0)).is_err());

    let mut p = ProblemParams::sevenfold();
    p.counts = Some(vec![1, 2]);
    assert!(Problem::build(&p).is_err());

    let mut p = ProblemParams::sevenfold();
    p.start_side = Some(3);
    assert!(Problem::build(&p).is_err());
}

#[test]
fn equal_params_build_identical_problems() {
    let a = Problem::build(&ProblemParams::sevenfold()).unwrap();
    let b = Problem::build(&ProblemParams::sevenfold()).unwrap();
    assert_eq!(a.counts, b.counts);
    assert_eq!(a.corners, b.corners);
    assert_eq!(a.universe(), b.universe());
    assert_eq!(a.tree, b.tree);
}
