//! # Line rasterisation
//!
//! Bresenham's algorithm, producing every cell along the discrete line between two nodes:
//!
//! ```text
//! From (0,0) to (2,5):
//!
//!     2 │        ● ●
//!     1 │    ● ●
//!     0 ● ●
//!       └────────────
//!        0 1 2 3 4 5
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use super::Node;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Iterator over the cells of a discrete line, starting at `from` and ending at `to`.
#[derive(Debug, Clone)]
pub struct LineIter {
    origin: (i64, i64),

    /// Step applied to the origin for each unit of the major axis, as (north, east)
    major_step: (i64, i64),

    /// Step applied to the origin for each unit of the minor axis, as (north, east)
    minor_step: (i64, i64),

    /// Length of the major and minor axes
    major_len: i64,
    minor_len: i64,

    /// Current position along the major and minor axes
    major: i64,
    minor: i64,

    /// Decision variable
    error: i64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LineIter {
    pub fn new(from: Node, to: Node) -> Self {
        let d_north = to.north as i64 - from.north as i64;
        let d_east = to.east as i64 - from.east as i64;

        let north_sign = if d_north > 0 { 1 } else { -1 };
        let east_sign = if d_east > 0 { 1 } else { -1 };

        let (major_len, minor_len, major_step, minor_step) = if d_north.abs() > d_east.abs() {
            (d_north.abs(), d_east.abs(), (north_sign, 0), (0, east_sign))
        } else {
            (d_east.abs(), d_north.abs(), (0, east_sign), (north_sign, 0))
        };

        Self {
            origin: (from.north as i64, from.east as i64),
            major_step,
            minor_step,
            major_len,
            minor_len,
            major: 0,
            minor: 0,
            error: 2 * minor_len - major_len,
        }
    }
}

impl Iterator for LineIter {
    type Item = Node;

    fn next(&mut self) -> Option<Self::Item> {
        if self.major > self.major_len {
            return None;
        }

        // Every produced cell lies within the box spanned by the two (non-negative) endpoints
        let north = self.origin.0 + self.major * self.major_step.0 + self.minor * self.minor_step.0;
        let east = self.origin.1 + self.major * self.major_step.1 + self.minor * self.minor_step.1;

        if self.error >= 0 {
            self.minor += 1;
            self.error -= 2 * self.major_len;
        }
        self.error += 2 * self.minor_len;
        self.major += 1;

        Some(Node::new(north as usize, east as usize))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.major_len - self.major + 1).max(0) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LineIter {}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
