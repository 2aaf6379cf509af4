//! Placed triangles.

use super::edge::BoundaryEdge;
use crate::geom::{Coeffs, Prototile, Symmetry};
use serde::{Deserialize, Serialize};

/// One tile placed in the plane.
///
/// Vertices run counter-clockwise; side i goes from vertex i to vertex i+1.
/// The placement choice that produced the tile (prototile, chirality,
/// matching slot, glued side) is stored with it so that backtracking can
/// reconstruct its step cursor from the popped triangle alone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub proto: u16,
    pub flip: bool,
    /// Which matching-edge slot of the step cursor chose the glued side.
    pub second: bool,
    /// Index of the side glued onto the frontier edge.
    pub glue: u8,
    pub verts: [Coeffs; 3],
    pub steps: [u16; 3],
    pub lens: [u8; 3],
    pub orients: [i32; 3],
}

impl Triangle {
    /// Place a tile so that its side `glue` runs from `tail` along `step`.
    ///
    /// Walking the remaining sides counter-clockwise turns by the exterior
    /// angle n − α at each vertex; the angle sum closes the triangle exactly,
    /// which the debug assertion checks on the ring coordinates.
    pub fn place(
        sym: &Symmetry,
        proto: &Prototile,
        flip: bool,
        second: bool,
        glue: usize,
        tail: &Coeffs,
        step: u16,
    ) -> Triangle {
        let n = sym.n as i32;
        let mut steps = [0u16; 3];
        steps[glue] = step;
        for k in 1..3 {
            let i = (glue + k) % 3;
            let prev = (glue + k + 2) % 3;
            steps[i] = sym.step_add(steps[prev], n - proto.angle_at(flip, i) as i32);
        }
        let lens = [
            proto.side_len(flip, 0),
            proto.side_len(flip, 1),
            proto.side_len(flip, 2),
        ];
        let orients = [
            proto.side_orient(flip, 0),
            proto.side_orient(flip, 1),
            proto.side_orient(flip, 2),
        ];
        let mut verts: [Coeffs; 3] = [tail.clone(), tail.clone(), tail.clone()];
        for k in 0..2 {
            let i = (glue + k) % 3;
            verts[(i + 1) % 3] = &verts[i] + sym.direction(lens[i], steps[i]);
        }
        debug_assert_eq!(
            &verts[(glue + 2) % 3] + sym.direction(lens[(glue + 2) % 3], steps[(glue + 2) % 3]),
            verts[glue],
            "triangle walk must close"
        );
        Triangle {
            proto: proto.id as u16,
            flip,
            second,
            glue: glue as u8,
            verts,
            steps,
            lens,
            orients,
        }
    }

    /// Side i as a directed edge (tile interior on its left).
    pub fn side(&self, i: usize) -> BoundaryEdge {
        BoundaryEdge {
            tail: self.verts[i].clone(),
            head: self.verts[(i + 1) % 3].clone(),
            len: self.lens[i],
            step: self.steps[i],
            orient: self.orients[i],
        }
    }
}
