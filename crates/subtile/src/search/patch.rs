use serde::{Deserialize, Serialize};

use crate::place::{BoundaryEdge, Triangle};

/// A frozen successful fill of the inflated region.
///
/// Together with the three side decompositions this is one candidate
/// substitution rule: the tile list says where each prototile copy goes,
/// the orientation classes say which edge decorations the fill forces
/// equal, and the side paths say how the inflated edges break down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedPatch {
    pub tiles: Vec<Triangle>,
    /// Open edges at completion; empty unless the tile counts were
    /// inconsistent with the region area.
    pub open: Vec<BoundaryEdge>,
    /// Interior edges, each shared by two tiles.
    pub closed: Vec<BoundaryEdge>,
    /// Decomposition path (length class, slot orientation) per region side.
    pub side_paths: [Vec<(u8, i32)>; 3],
    /// Orientation classes forced by the fill, canonical order.
    pub classes: Vec<Vec<i32>>,
}

impl CompletedPatch {
    /// Number of placed tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tiles per prototile id, for cross-checking against required counts.
    pub fn counts(&self, protos: usize) -> Vec<u32> {
        let mut c = vec![0u32; protos];
        for t in &self.tiles {
            c[t.proto as usize] += 1;
        }
        c
    }
}
