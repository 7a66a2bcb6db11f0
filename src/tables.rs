//! Lookup tables for Marching Squares.
//!
//! Corner and edge numbering (see [`Grid::cell_corner_indices`](crate::grid::Grid::cell_corner_indices)):
//!
//! ```text
//!        e2
//!    3--------2
//!    |        |
//! e3 |        | e1
//!    |        |
//!    0--------1
//!        e0
//! ```
//!
//! The case index has bit `k` set when corner `k` is on the positive side of the level.

/// The two corners joined by each edge.
///
/// Each pair runs from the lower lattice vertex to the higher one, so two cells sharing an
/// edge interpolate it in the same direction and produce bit-identical crossings.
pub const EDGE_CORNERS: [[usize; 2]; 4] = [[0, 1], [1, 2], [3, 2], [0, 3]];

/// Bitmask of edges whose endpoints have different classifications, per case.
pub const EDGE_TABLE: [u8; 16] = [
    0b0000, 0b1001, 0b0011, 0b1010, 0b0110, 0b1111, 0b0101, 0b1100, //
    0b1100, 0b0101, 0b1111, 0b0110, 0b1010, 0b0011, 0b1001, 0b0000,
];

/// Edge pairs to join for each unambiguous case, terminated by `-1`.
///
/// The saddle cases `5` and `10` are empty here; they depend on the cell centre and are resolved
/// with [`CORNER_CUT`].
pub const SEGMENT_TABLE: [[i8; 2]; 16] = [
    [-1, -1],
    [3, 0],
    [0, 1],
    [3, 1],
    [1, 2],
    [-1, -1],
    [0, 2],
    [2, 3],
    [2, 3],
    [0, 2],
    [-1, -1],
    [1, 2],
    [3, 1],
    [0, 1],
    [3, 0],
    [-1, -1],
];

/// Cases where opposite corners share a class and adjacent corners differ.
pub const SADDLE_CASES: [usize; 2] = [5, 10];

/// The segment cutting corner `k` off from the rest of the cell: its two incident edges.
pub const CORNER_CUT: [[usize; 2]; 4] = [[3, 0], [0, 1], [1, 2], [2, 3]];
