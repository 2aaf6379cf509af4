use serde::{Deserialize, Serialize};

use crate::place::Triangle;

/// Placement choice at one search depth.
///
/// The cursor walks prototile × chirality × matching-edge slot in a fixed
/// cyclic order. Walking starts at `start()`; `advance` reports when the
/// cursor wraps around, which means every choice at this depth has been
/// tried. On backtrack the cursor is rebuilt from the popped triangle, so
/// the walk resumes exactly after the choice that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub proto: usize,
    pub flip: bool,
    pub second: bool,
}

impl Cursor {
    #[inline]
    pub fn start() -> Cursor {
        Cursor {
            proto: 0,
            flip: false,
            second: false,
        }
    }

    /// Step to the next choice; true when the walk wrapped past the last one.
    pub fn advance(&mut self, protos: usize) -> bool {
        if !self.second {
            self.second = true;
            return false;
        }
        self.second = false;
        if !self.flip {
            self.flip = true;
            return false;
        }
        self.flip = false;
        self.proto += 1;
        if self.proto < protos {
            return false;
        }
        self.proto = 0;
        true
    }
}

impl From<&Triangle> for Cursor {
    fn from(t: &Triangle) -> Cursor {
        Cursor {
            proto: t.proto as usize,
            flip: t.flip,
            second: t.second,
        }
    }
}
